//! # Geometry Primitives
//!
//! Sub-pixel 2D points and ordered quadrilaterals used to describe crop
//! regions in source-frame coordinates.

pub mod point;
pub mod quad;

pub use point::Point;
pub use quad::Quad;
