//! Iris: webcam preview with toggleable H.264/MP4 recording

use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use tracing::info;

use iris::capture::V4l2Capture;
use iris::convert::{OutputLayout, YuyvConverter};
use iris::display::Sdl2Display;
use iris::encode::{self, EncodingSession};
use iris::{pipeline, Config};

fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iris=info".into()),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let device = match std::env::args().nth(1) {
        Some(device) => device,
        None => {
            eprintln!("usage: iris DEVICE (something like /dev/video0)");
            std::process::exit(1);
        }
    };

    info!("Iris launching, capture device: {}", device);

    let config = Config::default();
    iris::CONFIG.store(Arc::new(config.clone()));

    encode::init();

    let mut capture = V4l2Capture::new(&device, &config.capture)?;
    let (width, height, fps) = (capture.width(), capture.height(), capture.fps());

    // Every downstream buffer is sized from the negotiated format, not the
    // requested one.
    let mut rgba_conv = YuyvConverter::new(width, height, OutputLayout::Rgba)?;
    let mut nv12_conv = YuyvConverter::new(width, height, OutputLayout::Nv12)?;
    let mut session = EncodingSession::new(
        &config.record.output,
        width,
        height,
        fps,
        config.record.bitrate_bps,
    )?;

    let sdl_context = sdl2::init().map_err(|e| eyre!(e))?;
    let mut display = Sdl2Display::new(&sdl_context, width, height)?;

    capture.start_stream()?;

    pipeline::run(
        &sdl_context,
        &mut capture,
        &mut display,
        &mut rgba_conv,
        &mut nv12_conv,
        &mut session,
    )?;

    capture.stop_stream()?;
    info!("Iris shutting down");
    Ok(())
}
