//! SDL2 Window Display Module
//! Creates an SDL2 window and presents converted RGBA frames.

use color_eyre::{eyre::eyre, Result};
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};

/// SDL2 window presenting packed RGBA frames at a fixed resolution.
/// The window title doubles as the recording status line.
pub struct Sdl2Display {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    width: u32,
    height: u32,
}

impl Sdl2Display {
    pub fn new(sdl_context: &sdl2::Sdl, width: u32, height: u32) -> Result<Self> {
        let video_subsystem = sdl_context.video().map_err(|e| eyre!(e))?;

        let window = video_subsystem
            .window("Iris", width, height)
            .position_centered()
            .build()?;

        let canvas = window.into_canvas().present_vsync().build()?;
        let texture_creator = canvas.texture_creator();

        Ok(Self {
            canvas,
            texture_creator,
            width,
            height,
        })
    }

    /// Present one RGBA frame of exactly `width * height * 4` bytes.
    pub fn render_frame(&mut self, rgba: &[u8]) -> Result<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if rgba.len() != expected {
            return Err(eyre!(
                "RGBA buffer is {} bytes, expected {}",
                rgba.len(),
                expected
            ));
        }

        let mut texture = self
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::RGBA32, self.width, self.height)
            .map_err(|e| eyre!(e))?;

        texture
            .update(None, rgba, (self.width * 4) as usize)
            .map_err(|e| eyre!(e))?;

        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(|e| eyre!(e))?;

        self.canvas.present();
        Ok(())
    }

    /// Update the user-visible status line.
    pub fn set_status(&mut self, recording: bool) -> Result<()> {
        let title = if recording {
            "Iris - RECORDING"
        } else {
            "Iris"
        };
        self.canvas
            .window_mut()
            .set_title(title)
            .map_err(|e| eyre!(e))?;
        Ok(())
    }
}
