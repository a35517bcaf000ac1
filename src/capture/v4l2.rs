//! V4L2 capture with memory-mapped streaming

use color_eyre::{eyre::eyre, Result};
use tracing::info;
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::{CaptureStream, Stream};
use v4l::prelude::MmapStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::frame::RawFrame;
use crate::CaptureConfig;

/// YUYV capture from a V4L2 device.
///
/// The device negotiates the effective width/height/fps at open time; read
/// them back through the accessors before sizing any downstream buffer.
pub struct V4l2Capture {
    device: Device,
    stream: Option<MmapStream<'static>>,
    width: u32,
    height: u32,
    fps: u32,
    buffer_count: u32,
    sequence: u64,
}

impl V4l2Capture {
    /// Open the device and negotiate a YUYV format.
    pub fn new(path: &str, config: &CaptureConfig) -> Result<Self> {
        info!("Initializing V4L2 capture: {}", path);

        let device = Device::with_path(path)?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(eyre!("Device doesn't support video capture"));
        }

        let mut fmt = device.format()?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(b"YUYV");
        let fmt = device.set_format(&fmt)?;

        if fmt.fourcc != FourCC::new(b"YUYV") {
            return Err(eyre!(
                "Device refused YUYV, negotiated {} instead",
                fmt.fourcc
            ));
        }

        let params = device.set_params(&Parameters::with_fps(config.fps))?;
        let interval = params.interval;
        let fps = if interval.numerator > 0 {
            interval.denominator / interval.numerator
        } else {
            config.fps
        };

        info!(
            "Negotiated format: {}x{} @ {} fps",
            fmt.width, fmt.height, fps
        );

        Ok(Self {
            device,
            stream: None,
            width: fmt.width,
            height: fmt.height,
            fps,
            buffer_count: config.buffer_count,
            sequence: 0,
        })
    }

    /// Effective (negotiated) frame width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Effective (negotiated) frame height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Effective (negotiated) frame rate.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Start streaming with memory-mapped buffers
    pub fn start_stream(&mut self) -> Result<()> {
        let mut stream =
            MmapStream::with_buffers(&self.device, Type::VideoCapture, self.buffer_count)?;
        stream.start()?;

        self.stream = Some(stream);
        info!("Capture stream started with {} buffers", self.buffer_count);
        Ok(())
    }

    /// Stop streaming and release the mmap buffers.
    pub fn stop_stream(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.stop()?;
            info!("Capture stream stopped");
        }
        Ok(())
    }

    /// Block until the next frame is available.
    ///
    /// The returned frame borrows the driver buffer; it is invalidated by the
    /// next call on this instance.
    pub fn next_frame(&mut self) -> Result<RawFrame<'_>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| eyre!("Stream not started"))?;

        let (buf, _meta) = stream.next()?;

        let expected = RawFrame::expected_len(self.width, self.height);
        if buf.len() < expected {
            return Err(eyre!(
                "Short frame from driver: {} bytes, expected {}",
                buf.len(),
                expected
            ));
        }

        self.sequence += 1;

        Ok(RawFrame {
            data: &buf[..expected],
            width: self.width,
            height: self.height,
            sequence: self.sequence,
        })
    }
}
