//! # Clipping Engine
//!
//! Keyframed crop regions over a video: authored keys, their interpolation
//! and bounds clamp, the renderer that cuts a key's crop out of a decoded
//! frame, and the bounded-memory pipeline that streams a whole clipping into
//! an encoder.

pub mod buffers;
pub mod conversion;
pub mod data;
pub mod iterator;
pub mod key;
pub mod magic;
pub mod render;
pub mod transform;

pub use buffers::FrameStack;
pub use conversion::{ClippingConversion, ConversionOptions, NoProgress, ProgressHandler};
pub use data::{Clipping, Reference};
pub use iterator::ClippingIterator;
pub use key::ClippingKey;
pub use magic::{magic_tool, MagicFlags, Segment};
pub use render::ClippingRender;
pub use transform::{adjust_bounds, clipping_box, compute_interpolation, limit_scale};
