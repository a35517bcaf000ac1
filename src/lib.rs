pub mod capture;
pub mod convert;
pub mod display;
pub mod encode;
pub mod pipeline;

use std::path::PathBuf;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    pub record: RecordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Requested width; the driver may negotiate a different one.
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub buffer_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    pub output: PathBuf,
    pub bitrate_bps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                width: 640,
                height: 480,
                fps: 15,
                buffer_count: 4,
            },
            record: RecordConfig {
                output: PathBuf::from("out.mp4"),
                bitrate_bps: 400_000,
            },
        }
    }
}
