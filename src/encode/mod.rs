pub mod h264;
pub mod session;

pub use h264::{init, EncodeOutcome, Packet};
pub use session::{EncodingSession, WriteOutcome, CLOCK_RATE};

/// Errors from the encoding path.
///
/// `NotRecording` and `AlreadyRecording` are usage errors the caller can
/// recover from; everything else is fatal for the current session.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("codec runtime not initialized; call encode::init() first")]
    NotInitialized,
    #[error("session is not recording")]
    NotRecording,
    #[error("session is already recording")]
    AlreadyRecording,
    #[error("dimensions {width}x{height} are not both even")]
    OddDimensions { width: u32, height: u32 },
    #[error("invalid frame rate: {0}")]
    BadFrameRate(u32),
    #[error("frame has {got} bytes, expected {expected}")]
    BadFrameSize { expected: usize, got: usize },
    #[error("codec error: {0}")]
    Codec(String),
    #[error("container error: {0}")]
    Container(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
