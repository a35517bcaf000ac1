//! The per-frame capture/convert/present/record loop

use std::time::Instant;

use color_eyre::{eyre::eyre, Result};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use tracing::{info, warn};

use crate::capture::V4l2Capture;
use crate::convert::YuyvConverter;
use crate::display::Sdl2Display;
use crate::encode::{EncodeError, EncodingSession};

/// Run the steady-state loop until the window is closed.
///
/// Single-threaded by design: capture, conversion, display, and encoding all
/// happen in sequence on the caller's thread, once per captured frame. The
/// raw frame borrow from the capture stream never outlives one iteration.
pub fn run(
    sdl_context: &sdl2::Sdl,
    capture: &mut V4l2Capture,
    display: &mut Sdl2Display,
    rgba_conv: &mut YuyvConverter,
    nv12_conv: &mut YuyvConverter,
    session: &mut EncodingSession,
) -> Result<()> {
    let mut event_pump = sdl_context.event_pump().map_err(|e| eyre!(e))?;

    display.set_status(session.running())?;

    'running: loop {
        let frame = capture.next_frame()?;

        let convert_start = Instant::now();
        let rgba = rgba_conv.convert(&frame)?;
        let nv12 = if session.running() {
            Some(nv12_conv.convert(&frame)?)
        } else {
            None
        };
        metrics::histogram!("convert_time_us")
            .record(convert_start.elapsed().as_micros() as f64);

        display.render_frame(rgba)?;

        if let Some(nv12) = nv12 {
            let encode_start = Instant::now();
            match session.write_frame(nv12) {
                Ok(_) => {}
                // Raced with a stop between the state check and the write;
                // recoverable, drop the frame.
                Err(EncodeError::NotRecording) => {
                    warn!("Dropped a frame submitted to a stopped session")
                }
                Err(e) => return Err(e.into()),
            }
            metrics::histogram!("encode_time_us")
                .record(encode_start.elapsed().as_micros() as f64);
        }

        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => {
                    info!("Quit event received");
                    break 'running;
                }
                Event::KeyDown {
                    keycode: Some(Keycode::Space),
                    repeat: false,
                    ..
                } => {
                    if session.running() {
                        session.finish()?;
                    } else {
                        session.start()?;
                    }
                    display.set_status(session.running())?;
                }
                _ => {}
            }
        }
    }

    // A half-written file is useless; close it out before returning.
    if session.running() {
        session.finish()?;
    }

    Ok(())
}
