pub mod frame;
pub mod v4l2;

pub use frame::RawFrame;
pub use v4l2::V4l2Capture;
