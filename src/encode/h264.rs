//! H.264 encoding using `openh264`

use bytes::Bytes;
use once_cell::sync::OnceCell;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate, RateControlMode};
use openh264::formats::YUVSlices;
use openh264::nal_units;
use openh264::OpenH264API;
use tracing::debug;

use super::EncodeError;

static CODEC_INIT: OnceCell<()> = OnceCell::new();

/// Process-wide codec initialization. Idempotent; must run before any
/// [`EncodingSession`](super::EncodingSession) is constructed.
pub fn init() {
    CODEC_INIT.get_or_init(|| {
        debug!("codec runtime initialized");
    });
}

pub(crate) fn initialized() -> bool {
    CODEC_INIT.get().is_some()
}

/// One compressed packet, ready for the container.
pub struct Packet {
    /// Annex-B bytes (start codes included).
    pub data: Bytes,
    /// Presentation timestamp in [`CLOCK_RATE`](super::CLOCK_RATE) ticks.
    pub pts_ticks: u64,
    /// Whether the packet contains an IDR frame.
    pub keyframe: bool,
}

/// Result of feeding one frame to the encoder.
pub enum EncodeOutcome {
    Packet(Packet),
    /// The encoder accepted the frame but produced no output yet. A normal
    /// condition, never a failure.
    NeedsMoreInput,
}

/// Wrapper around the OpenH264 encoder holding the internal plane storage
/// NV12 input is deinterleaved into.
pub(crate) struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    i420: Vec<u8>,
}

impl H264Encoder {
    pub fn new(width: u32, height: u32, fps: u32, bitrate_bps: u32) -> Result<Self, EncodeError> {
        let config = EncoderConfig::new()
            .bitrate(BitRate::from_bps(bitrate_bps))
            .max_frame_rate(FrameRate::from_hz(fps as f32))
            .rate_control_mode(RateControlMode::Bitrate);

        let api = OpenH264API::from_source();
        let encoder = Encoder::with_api_config(api, config)
            .map_err(|e| EncodeError::Codec(e.to_string()))?;

        Ok(Self {
            encoder,
            width,
            height,
            i420: vec![0; width as usize * height as usize * 3 / 2],
        })
    }

    /// Encode one NV12 frame, stamping any produced packet with `pts_ticks`.
    pub fn encode(&mut self, nv12: &[u8], pts_ticks: u64) -> Result<EncodeOutcome, EncodeError> {
        let w = self.width as usize;
        let h = self.height as usize;
        let luma_len = w * h;

        let expected = luma_len * 3 / 2;
        if nv12.len() != expected {
            return Err(EncodeError::BadFrameSize {
                expected,
                got: nv12.len(),
            });
        }

        // OpenH264 wants separate U and V planes.
        let (y_dst, uv_dst) = self.i420.split_at_mut(luma_len);
        let (u_dst, v_dst) = uv_dst.split_at_mut(luma_len / 4);
        y_dst.copy_from_slice(&nv12[..luma_len]);
        let uv = &nv12[luma_len..];
        for i in 0..luma_len / 4 {
            u_dst[i] = uv[2 * i];
            v_dst[i] = uv[2 * i + 1];
        }

        let (y, uv) = self.i420.split_at(luma_len);
        let (u, v) = uv.split_at(luma_len / 4);
        let slices = YUVSlices::new((y, u, v), (w, h), (w, w / 2, w / 2));

        let bitstream = self
            .encoder
            .encode(&slices)
            .map_err(|e| EncodeError::Codec(e.to_string()))?;

        let data = bitstream.to_vec();
        if data.is_empty() {
            return Ok(EncodeOutcome::NeedsMoreInput);
        }

        let keyframe = contains_idr(&data);
        Ok(EncodeOutcome::Packet(Packet {
            data: Bytes::from(data),
            pts_ticks,
            keyframe,
        }))
    }

    /// Collect one buffered packet after end-of-stream, if any remain.
    ///
    /// OpenH264 emits a packet per input frame and holds nothing back, so
    /// this always reports an empty queue; the session's drain loop stays
    /// codec-agnostic.
    pub fn drain(&mut self) -> Result<Option<Packet>, EncodeError> {
        Ok(None)
    }
}

/// Whether an Annex-B buffer carries an IDR slice (NAL type 5).
fn contains_idr(annex_b: &[u8]) -> bool {
    nal_units(annex_b).any(|nal| nal_type(nal) == Some(5))
}

/// NAL unit type of an Annex-B unit, start code included.
fn nal_type(nal: &[u8]) -> Option<u8> {
    let start = nal.iter().position(|&b| b == 0x01)? + 1;
    nal.get(start).map(|header| header & 0x1f)
}
