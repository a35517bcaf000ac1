//! YUYV pixel conversion for the display and encode paths

use crate::capture::RawFrame;

/// Output layouts a converter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// Packed 4-byte RGBA, opaque alpha. `width * height * 4` bytes.
    Rgba,
    /// Full luma plane followed by interleaved half-resolution UV.
    /// `width * height * 3 / 2` bytes.
    Nv12,
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("dimensions {width}x{height} are not both even")]
    OddDimensions { width: u32, height: u32 },
    #[error("frame is {got_width}x{got_height}, converter expects {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
    #[error("frame has {got} bytes, expected {expected}")]
    BadInputLen { expected: usize, got: usize },
}

/// Converts YUYV frames into a fixed target layout.
///
/// The output buffer is sized once at construction and reused for every
/// call; the slice returned by [`convert`](Self::convert) is overwritten by
/// the next call on the same instance.
pub struct YuyvConverter {
    width: u32,
    height: u32,
    layout: OutputLayout,
    out: Vec<u8>,
}

impl YuyvConverter {
    /// Create a converter for the given frame size. Both dimensions must be
    /// even, since YUYV carries one chroma pair per two pixels.
    pub fn new(width: u32, height: u32, layout: OutputLayout) -> Result<Self, ConvertError> {
        if width % 2 != 0 || height % 2 != 0 {
            return Err(ConvertError::OddDimensions { width, height });
        }

        let len = match layout {
            OutputLayout::Rgba => width as usize * height as usize * 4,
            OutputLayout::Nv12 => width as usize * height as usize * 3 / 2,
        };

        Ok(Self {
            width,
            height,
            layout,
            out: vec![0; len],
        })
    }

    /// Byte length of the output for this converter's layout.
    pub fn output_len(&self) -> usize {
        self.out.len()
    }

    /// Convert one frame, returning the filled output buffer.
    pub fn convert(&mut self, frame: &RawFrame<'_>) -> Result<&[u8], ConvertError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(ConvertError::DimensionMismatch {
                width: self.width,
                height: self.height,
                got_width: frame.width,
                got_height: frame.height,
            });
        }

        let expected = RawFrame::expected_len(self.width, self.height);
        if frame.data.len() != expected {
            return Err(ConvertError::BadInputLen {
                expected,
                got: frame.data.len(),
            });
        }

        match self.layout {
            OutputLayout::Rgba => self.convert_rgba(frame.data),
            OutputLayout::Nv12 => self.convert_nv12(frame.data),
        }

        Ok(&self.out)
    }

    fn convert_rgba(&mut self, data: &[u8]) {
        let w = self.width as usize;
        let h = self.height as usize;

        for row in 0..h {
            for pair in 0..w / 2 {
                let src = row * w * 2 + pair * 4;
                let y1 = data[src];
                let u = data[src + 1];
                let y2 = data[src + 2];
                let v = data[src + 3];

                let dst = (row * w + pair * 2) * 4;
                yuv_to_rgba(&mut self.out[dst..dst + 4], y1, u, v);
                yuv_to_rgba(&mut self.out[dst + 4..dst + 8], y2, u, v);
            }
        }
    }

    fn convert_nv12(&mut self, data: &[u8]) {
        let w = self.width as usize;
        let h = self.height as usize;

        let (luma, chroma) = self.out.split_at_mut(w * h);

        for row in 0..h {
            for col in 0..w {
                luma[row * w + col] = data[(row * w + col) * 2];
            }
        }

        // Chroma is decimated: odd rows are dropped outright, not averaged
        // into their even neighbor.
        let mut ci = 0;
        for row in (0..h).step_by(2) {
            for pair in 0..w / 2 {
                let src = row * w * 2 + pair * 4;
                chroma[ci] = data[src + 1];
                chroma[ci + 1] = data[src + 3];
                ci += 2;
            }
        }
    }
}

/// Limited-range BT.601 YUV to RGB, with a fixed opaque alpha.
fn yuv_to_rgba(out: &mut [u8], y: u8, u: u8, v: u8) {
    let y = f32::from(y) - 16.0;
    let u = f32::from(u) - 128.0;
    let v = f32::from(v) - 128.0;

    let r = 1.164 * y + 1.596 * v;
    let g = 1.164 * y - 0.392 * u - 0.813 * v;
    let b = 1.164 * y + 2.017 * u;

    out[0] = r.clamp(0.0, 255.0) as u8;
    out[1] = g.clamp(0.0, 255.0) as u8;
    out[2] = b.clamp(0.0, 255.0) as u8;
    out[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw<'a>(data: &'a [u8], width: u32, height: u32) -> RawFrame<'a> {
        RawFrame {
            data,
            width,
            height,
            sequence: 0,
        }
    }

    fn solid_yuyv(width: u32, height: u32, y: u8, u: u8, v: u8) -> Vec<u8> {
        let pairs = (width as usize / 2) * height as usize;
        let mut out = Vec::with_capacity(pairs * 4);
        for _ in 0..pairs {
            out.extend_from_slice(&[y, u, y, v]);
        }
        out
    }

    #[test]
    fn output_sizes_match_layouts() {
        for (w, h) in [(2, 2), (640, 480), (1280, 720)] {
            let rgba = YuyvConverter::new(w, h, OutputLayout::Rgba).unwrap();
            assert_eq!(rgba.output_len(), w as usize * h as usize * 4);

            let nv12 = YuyvConverter::new(w, h, OutputLayout::Nv12).unwrap();
            assert_eq!(nv12.output_len(), w as usize * h as usize * 3 / 2);
        }
    }

    #[test]
    fn rejects_odd_dimensions() {
        assert!(matches!(
            YuyvConverter::new(3, 2, OutputLayout::Rgba),
            Err(ConvertError::OddDimensions { .. })
        ));
        assert!(matches!(
            YuyvConverter::new(4, 5, OutputLayout::Nv12),
            Err(ConvertError::OddDimensions { .. })
        ));
    }

    #[test]
    fn rejects_mismatched_frames() {
        let mut conv = YuyvConverter::new(4, 2, OutputLayout::Rgba).unwrap();

        let wrong_dims = solid_yuyv(6, 2, 128, 128, 128);
        assert!(matches!(
            conv.convert(&raw(&wrong_dims, 6, 2)),
            Err(ConvertError::DimensionMismatch { .. })
        ));

        let short = vec![0u8; 4 * 2 * 2 - 2];
        assert!(matches!(
            conv.convert(&raw(&short, 4, 2)),
            Err(ConvertError::BadInputLen { .. })
        ));
    }

    #[test]
    fn white_converts_to_white() {
        let mut conv = YuyvConverter::new(4, 2, OutputLayout::Rgba).unwrap();
        let data = solid_yuyv(4, 2, 235, 128, 128);
        let out = conv.convert(&raw(&data, 4, 2)).unwrap();

        for px in out.chunks(4) {
            // 1.164 * 219 = 254.9, truncated; allow one count of rounding
            assert!(px[0] >= 254 && px[1] >= 254 && px[2] >= 254);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn black_converts_to_black() {
        let mut conv = YuyvConverter::new(4, 2, OutputLayout::Rgba).unwrap();
        let data = solid_yuyv(4, 2, 16, 128, 128);
        let out = conv.convert(&raw(&data, 4, 2)).unwrap();

        for px in out.chunks(4) {
            assert_eq!(&px[..3], &[0, 0, 0]);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn luma_plane_is_a_direct_copy() {
        let (w, h) = (8u32, 6u32);
        let mut data = solid_yuyv(w, h, 0, 90, 200);
        // Give every luma sample a distinct value.
        for (i, quad) in data.chunks_mut(4).enumerate() {
            quad[0] = (2 * i) as u8;
            quad[2] = (2 * i + 1) as u8;
        }

        let mut conv = YuyvConverter::new(w, h, OutputLayout::Nv12).unwrap();
        let out = conv.convert(&raw(&data, w, h)).unwrap();

        let luma = &out[..(w * h) as usize];
        for (i, &y) in luma.iter().enumerate() {
            assert_eq!(y, data[i * 2], "luma sample {} differs", i);
        }
    }

    #[test]
    fn chroma_keeps_even_rows_only() {
        let (w, h) = (4u32, 4u32);
        let mut data = vec![0u8; RawFrame::expected_len(w, h)];
        for row in 0..h as usize {
            let (u, v) = if row % 2 == 0 { (10, 20) } else { (200, 220) };
            for pair in 0..(w as usize / 2) {
                let base = row * w as usize * 2 + pair * 4;
                data[base + 1] = u;
                data[base + 3] = v;
            }
        }

        let mut conv = YuyvConverter::new(w, h, OutputLayout::Nv12).unwrap();
        let out = conv.convert(&raw(&data, w, h)).unwrap();

        let chroma = &out[(w * h) as usize..];
        assert_eq!(chroma.len(), (w * h / 2) as usize);
        for uv in chroma.chunks(2) {
            assert_eq!(uv, &[10, 20], "odd-row chroma leaked into output");
        }
    }
}
