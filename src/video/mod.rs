//! # Video Streaming Module
//!
//! Decoding with frame-accurate seeking, encoding of packed RGB frames, and
//! the [`FrameSource`]/[`FrameSink`] seams the clipping pipeline runs on.

pub mod codecs;
pub mod traits;
pub mod types;

#[cfg(feature = "ffmpeg")]
pub mod decoder;
#[cfg(feature = "ffmpeg")]
pub mod encoder;

pub use codecs::{default_bitrate, format_names, VideoCodec};
pub use traits::{FrameSink, FrameSource};
pub use types::{rgb_buffer_size, Frame, PixelMode, StreamInfo};

#[cfg(feature = "ffmpeg")]
pub use decoder::Decoder;
#[cfg(feature = "ffmpeg")]
pub use encoder::{Encoder, EncoderSettings};
