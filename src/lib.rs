//! # clip-cutter
//!
//! Frame-accurate video cutting with keyframed crop, rotation and scale.
//!
//! The library couples two engines: a video layer that decodes with exact
//! seeking and encodes packed RGB frames through FFmpeg, and a clipping layer
//! that interpolates user-authored keys over the timeline, keeps every crop
//! inside the source, and renders the crop into a fixed-size output frame.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clip_cutter::{
//!     clipping::{Clipping, ClippingConversion, ConversionOptions, NoProgress},
//!     video::{Decoder, Encoder, EncoderSettings, FrameSource},
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let clipping = Clipping::from_file("project.json")?;
//! let mut decoder = Decoder::open(clipping.video_path())?;
//!
//! let settings = EncoderSettings::new(
//!     "mp4-x264",
//!     "output.mp4",
//!     clipping.w(),
//!     clipping.h(),
//!     decoder.fps(),
//!     0,
//! );
//! let mut encoder = Encoder::create(settings)?;
//!
//! let conversion = ClippingConversion::new(&clipping, ConversionOptions::default());
//! conversion.convert(&mut decoder, &mut encoder, &mut NoProgress)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`geometry`] - Points and quadrilaterals
//! - [`video`] - Decoder, encoder and the frame source/sink seams
//! - [`clipping`] - Keys, interpolation, bounds, rendering and conversion
//! - [`player`] - Background playback worker
//! - [`config`] - Configuration management

pub mod clipping;
pub mod config;
pub mod error;
pub mod geometry;
pub mod player;
pub mod timefmt;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    clipping::{Clipping, ClippingKey, ClippingRender},
    config::Config,
    error::{CutterError, Result},
    geometry::{Point, Quad},
    player::Player,
    video::{FrameSink, FrameSource},
};
