//! Still-image player example
//!
//! Opens a window and feeds a slideshow of images through the render engine as
//! if they were video frames. Images of different sizes exercise the source
//! resize path; the keyboard switches Anime4K presets on the live engine.
//!
//! Effects without a registered stage are stood in for by bilinear kernels, so
//! the chain shape (including intermediate downscales) matches the preset even
//! though the CNN kernels themselves are not part of this crate.
//!
//! # Usage
//! ```bash
//! cargo run --example player -- a.png b.jpg --preset aa --performance high --target 1080p
//! ```

mod app;
mod still_frames;

use crate::app::PlayerApp;
use anime4k_render::TargetResolution;
use anime4k_render::presets::{EnhancementPreset, PerformancePreset};
use clap::Parser;
use std::path::PathBuf;
use winit::event_loop::{ControlFlow, EventLoop};

/// Command-line arguments for the player
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Images shown in turn as video frames
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Anime4K mode (off, a, b, c, aa, bb, ca)
    #[arg(long, default_value = "a")]
    preset: EnhancementPreset,

    /// Model size (light, medium, high, ultra, extreme)
    #[arg(long, default_value = "medium")]
    performance: PerformancePreset,

    /// Output resolution, either a multiple of the image size ("x2") or a height ("1080p")
    #[arg(long, default_value = "x2")]
    target: TargetResolution,

    /// Number of displayed frames before switching to the next image
    #[arg(long, default_value_t = 180)]
    frames_per_image: u32,

    /// Start paused
    #[arg(long, short)]
    paused: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!("Starting player...");

    let source = still_frames::StillFrameSource::load(&args.images, args.frames_per_image, args.paused)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PlayerApp::new(source, args.preset, args.performance, args.target);
    event_loop.run_app(&mut app)?;
    Ok(())
}
