//! Recording-session lifecycle over the encoder and MP4 muxer

use std::fs::File;
use std::path::{Path, PathBuf};

use muxide::api::{Muxer, MuxerBuilder, VideoCodec};
use tracing::{debug, info, warn};

use super::h264::{self, EncodeOutcome, H264Encoder};
use super::EncodeError;

/// Timestamp clock rate in Hz. Presentation timestamps advance by exactly
/// `CLOCK_RATE / fps` ticks per frame, so pacing is constant regardless of
/// capture jitter.
pub const CLOCK_RATE: u32 = 90_000;

/// Presentation timestamp for frame `index` at the given frame rate.
pub fn pts_ticks(index: u64, fps: u32) -> u64 {
    index * u64::from(CLOCK_RATE / fps)
}

/// Result of a successful `write_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A compressed packet was appended to the container.
    Written,
    /// The codec kept the frame for later; nothing was appended.
    Buffered,
}

enum State {
    Idle,
    Recording(Active),
}

/// Resources that only exist while recording. Dropping this releases them,
/// so every path out of `Recording` cleans up.
struct Active {
    encoder: H264Encoder,
    muxer: Muxer<File>,
    frame_index: u64,
}

/// An Idle/Recording session writing H.264 into an MP4 file.
///
/// `start` and `finish` may be called repeatedly over the session's life;
/// each `start` produces a fresh output file and restarts the timestamp
/// sequence at zero.
pub struct EncodingSession {
    output: PathBuf,
    width: u32,
    height: u32,
    fps: u32,
    bitrate_bps: u32,
    state: State,
}

impl EncodingSession {
    /// Configure a session. Requires [`h264::init`] to have run.
    pub fn new(
        output: impl AsRef<Path>,
        width: u32,
        height: u32,
        fps: u32,
        bitrate_bps: u32,
    ) -> Result<Self, EncodeError> {
        if !h264::initialized() {
            return Err(EncodeError::NotInitialized);
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(EncodeError::OddDimensions { width, height });
        }
        if fps == 0 || fps > CLOCK_RATE {
            return Err(EncodeError::BadFrameRate(fps));
        }

        Ok(Self {
            output: output.as_ref().to_path_buf(),
            width,
            height,
            fps,
            bitrate_bps,
            state: State::Idle,
        })
    }

    /// Open the codec and container and begin accepting frames.
    ///
    /// On failure the session stays `Idle` and can be started again.
    pub fn start(&mut self) -> Result<(), EncodeError> {
        if self.running() {
            return Err(EncodeError::AlreadyRecording);
        }

        let encoder = H264Encoder::new(self.width, self.height, self.fps, self.bitrate_bps)?;

        let file = File::create(&self.output)?;
        let muxer = MuxerBuilder::new(file)
            .video(VideoCodec::H264, self.width, self.height, self.fps as f64)
            .build()
            .map_err(|e| EncodeError::Container(e.to_string()))?;

        self.state = State::Recording(Active {
            encoder,
            muxer,
            frame_index: 0,
        });

        info!(
            "Recording started: {} ({}x{} @ {} fps)",
            self.output.display(),
            self.width,
            self.height,
            self.fps
        );
        Ok(())
    }

    /// Submit one NV12 frame. Only valid while recording.
    pub fn write_frame(&mut self, planar: &[u8]) -> Result<WriteOutcome, EncodeError> {
        let active = match &mut self.state {
            State::Idle => return Err(EncodeError::NotRecording),
            State::Recording(active) => active,
        };

        let pts = pts_ticks(active.frame_index, self.fps);
        active.frame_index += 1;

        match active.encoder.encode(planar, pts)? {
            EncodeOutcome::Packet(pkt) => {
                active
                    .muxer
                    .write_video(
                        pkt.pts_ticks as f64 / f64::from(CLOCK_RATE),
                        &pkt.data,
                        pkt.keyframe,
                    )
                    .map_err(|e| EncodeError::Container(e.to_string()))?;
                Ok(WriteOutcome::Written)
            }
            EncodeOutcome::NeedsMoreInput => Ok(WriteOutcome::Buffered),
        }
    }

    /// Drain the codec, finalize the file, and return to `Idle`.
    ///
    /// Returns `Ok(false)` when the session was already idle.
    pub fn finish(&mut self) -> Result<bool, EncodeError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => {
                debug!("finish() on an idle session");
                Ok(false)
            }
            State::Recording(mut active) => {
                while let Some(pkt) = active.encoder.drain()? {
                    active
                        .muxer
                        .write_video(
                            pkt.pts_ticks as f64 / f64::from(CLOCK_RATE),
                            &pkt.data,
                            pkt.keyframe,
                        )
                        .map_err(|e| EncodeError::Container(e.to_string()))?;
                }

                active
                    .muxer
                    .finish_with_stats()
                    .map_err(|e| EncodeError::Container(e.to_string()))?;

                info!(
                    "Recording finished: {} ({} frames)",
                    self.output.display(),
                    active.frame_index
                );
                Ok(true)
            }
        }
    }

    /// Whether the session is currently recording.
    pub fn running(&self) -> bool {
        matches!(self.state, State::Recording(_))
    }
}

impl Drop for EncodingSession {
    fn drop(&mut self) {
        if self.running() {
            if let Err(e) = self.finish() {
                warn!("Failed to finalize recording on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_output(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("iris-session-{}-{}.mp4", name, std::process::id()))
    }

    fn gray_nv12(width: u32, height: u32) -> Vec<u8> {
        vec![128; width as usize * height as usize * 3 / 2]
    }

    #[test]
    fn pts_sequence_is_arithmetic() {
        let step = u64::from(CLOCK_RATE / 15);
        assert_eq!(step, 6000);

        let mut prev = None;
        for k in 0..120 {
            let pts = pts_ticks(k, 15);
            assert_eq!(pts, k * step);
            if let Some(prev) = prev {
                assert_eq!(pts - prev, step);
            }
            prev = Some(pts);
        }
    }

    #[test]
    fn new_requires_sane_geometry() {
        h264::init();
        assert!(matches!(
            EncodingSession::new(temp_output("odd"), 63, 64, 15, 200_000),
            Err(EncodeError::OddDimensions { .. })
        ));
        assert!(matches!(
            EncodingSession::new(temp_output("fps"), 64, 64, 0, 200_000),
            Err(EncodeError::BadFrameRate(0))
        ));
    }

    #[test]
    fn write_frame_while_idle_is_a_usage_error() {
        h264::init();
        let out = temp_output("idle-write");
        let mut session = EncodingSession::new(&out, 64, 64, 15, 200_000).unwrap();

        let frame = gray_nv12(64, 64);
        assert!(matches!(
            session.write_frame(&frame),
            Err(EncodeError::NotRecording)
        ));
        assert!(!session.running());

        // The usage error must not poison the session.
        session.start().unwrap();
        assert!(session.running());
        session.write_frame(&frame).unwrap();
        assert!(session.finish().unwrap());

        let _ = std::fs::remove_file(&out);
    }

    #[test]
    fn finish_twice_is_a_noop() {
        h264::init();
        let out = temp_output("double-finish");
        let mut session = EncodingSession::new(&out, 64, 64, 15, 200_000).unwrap();

        session.start().unwrap();
        session.write_frame(&gray_nv12(64, 64)).unwrap();

        assert!(session.finish().unwrap());
        assert!(!session.running());
        assert!(!session.finish().unwrap());

        let _ = std::fs::remove_file(&out);
    }

    #[test]
    fn rejects_undersized_frames() {
        h264::init();
        let out = temp_output("short-frame");
        let mut session = EncodingSession::new(&out, 64, 64, 15, 200_000).unwrap();
        session.start().unwrap();

        let short = vec![0u8; 64 * 64];
        assert!(matches!(
            session.write_frame(&short),
            Err(EncodeError::BadFrameSize { .. })
        ));

        session.finish().unwrap();
        let _ = std::fs::remove_file(&out);
    }

    #[test]
    fn records_frames_to_a_playable_file() {
        h264::init();
        let out = temp_output("e2e");
        let mut session = EncodingSession::new(&out, 64, 64, 15, 200_000).unwrap();

        session.start().unwrap();
        let frame = gray_nv12(64, 64);
        for _ in 0..5 {
            session.write_frame(&frame).unwrap();
        }
        assert!(session.finish().unwrap());

        let len = std::fs::metadata(&out).unwrap().len();
        assert!(len > 0, "finished file is empty");

        let _ = std::fs::remove_file(&out);
    }
}
