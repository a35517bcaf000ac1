/// A raw packed-4:2:2 (YUYV) frame borrowed from the capture stream.
///
/// The slice points into a driver-owned mmap buffer and is only valid until
/// the next `next_frame()` call on the same capture instance; the borrow
/// checker enforces that window. Consumers must finish converting before
/// requesting another frame.
pub struct RawFrame<'a> {
    /// YUYV bytes, exactly `width * height * 2` of them.
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Monotonic capture sequence number.
    pub sequence: u64,
}

impl RawFrame<'_> {
    /// Byte length of a YUYV frame with the given dimensions.
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 2
    }
}
