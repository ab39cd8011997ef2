//! Two-point alignment: derive scale, position and rotation changes for a
//! key from a reference segment and the same segment marked on another frame.

use crate::geometry::Point;

use super::key::ClippingKey;
use super::transform::{adjust_bounds, clipping_box, normalize_angle};

/// Smallest crop side, in source pixels, the solver will commit to
pub const MIN_CROP_SIDE: f64 = 15.0;

/// A segment between two marked points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Segment {
    pub p1: Point,
    pub p2: Point,
}

impl Segment {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            p1: Point::new(x1, y1),
            p2: Point::new(x2, y2),
        }
    }

    pub fn length(&self) -> f64 {
        self.p1.distance_to(self.p2)
    }

    /// Direction from `p1` to `p2`, in `[0, 360)`
    pub fn angle(&self) -> f64 {
        (self.p2 - self.p1).angle_0_360()
    }
}

/// Which components of the alignment get applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MagicFlags {
    pub rotate: bool,
    pub scale: bool,
    pub position_x: bool,
    pub position_y: bool,
}

impl MagicFlags {
    pub fn all() -> Self {
        Self {
            rotate: true,
            scale: true,
            position_x: true,
            position_y: true,
        }
    }

    pub fn any(&self) -> bool {
        self.rotate || self.scale || self.position_x || self.position_y
    }
}

/// Align `key` so that `source` (marked on the reference frame) maps onto
/// `current` (marked on the frame being edited).
///
/// `target` is the output size and `bounds` the source frame size. The
/// candidate is clamped with [`adjust_bounds`]; its scale is kept only while
/// the crop stays more than [`MIN_CROP_SIDE`] pixels on both sides, and its
/// position only while it stays inside the clamp margins. Rotation is always
/// kept.
pub fn magic_tool(
    key: ClippingKey,
    target: (u32, u32),
    bounds: (u32, u32),
    source: Segment,
    current: Segment,
    flags: MagicFlags,
) -> ClippingKey {
    if !flags.any() {
        return key;
    }

    let mut candidate = key;
    let mut ratio = 1.0;

    if flags.scale {
        let source_length = source.length();
        if source_length != 0.0 {
            ratio = current.length() / source_length;
        }
        candidate.scale *= ratio;
    }

    if flags.position_x {
        candidate.px += (current.p1.x - source.p1.x) * ratio;
    }

    if flags.position_y {
        candidate.py += (current.p1.y - source.p1.y) * ratio;
    }

    if flags.rotate {
        let diff = current.angle() - source.angle();
        if diff != 0.0 {
            candidate.set_angle(normalize_angle(candidate.angle() + diff));
        }
    }

    let (target_w, target_h) = target;
    let (max_w, max_h) = (f64::from(bounds.0), f64::from(bounds.1));

    let candidate = adjust_bounds(candidate, target_w, target_h, bounds.0, bounds.1);
    let area = clipping_box(&candidate, target_w, target_h).occupied_area();
    let size = area.size();

    let mut result = key;

    if size.x > MIN_CROP_SIDE && size.y > MIN_CROP_SIDE {
        result.scale = candidate.scale;
    }

    if candidate.px >= 1.0
        && candidate.py >= 1.0
        && candidate.px + 1.0 < max_w
        && candidate.py + 1.0 < max_h
    {
        result.px = candidate.px;
        result.py = candidate.py;
    }

    result.set_angle(candidate.angle());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: (u32, u32) = (160, 90);
    const BOUNDS: (u32, u32) = (1280, 720);

    fn key() -> ClippingKey {
        ClippingKey::new(10, 640.0, 360.0, 1.0, 0.0)
    }

    #[test]
    fn test_no_flags_is_identity() {
        let source = Segment::new(0.0, 0.0, 10.0, 0.0);
        let current = Segment::new(50.0, 50.0, 50.0, 90.0);

        assert_eq!(
            magic_tool(key(), TARGET, BOUNDS, source, current, MagicFlags::default()),
            key()
        );
    }

    #[test]
    fn test_scale_follows_segment_length() {
        let source = Segment::new(100.0, 100.0, 110.0, 100.0);
        let current = Segment::new(100.0, 100.0, 120.0, 100.0);
        let flags = MagicFlags {
            scale: true,
            ..MagicFlags::default()
        };

        let result = magic_tool(key(), TARGET, BOUNDS, source, current, flags);
        assert!((result.scale - 2.0).abs() < 1e-9);
        assert_eq!((result.px, result.py), (640.0, 360.0));
    }

    #[test]
    fn test_position_scaled_by_ratio() {
        let source = Segment::new(100.0, 100.0, 110.0, 100.0);
        let current = Segment::new(110.0, 95.0, 130.0, 95.0);

        let result = magic_tool(key(), TARGET, BOUNDS, source, current, MagicFlags::all());
        assert_eq!(result.px, 660.0);
        assert_eq!(result.py, 350.0);
    }

    #[test]
    fn test_rotation_delta() {
        let source = Segment::new(0.0, 0.0, 10.0, 0.0);
        let current = Segment::new(0.0, 0.0, 0.0, 10.0);
        let flags = MagicFlags {
            rotate: true,
            ..MagicFlags::default()
        };

        let result = magic_tool(key(), TARGET, BOUNDS, source, current, flags);
        assert!((result.angle() - 90.0).abs() < 0.001);
    }

    #[test]
    fn test_collapsing_scale_is_rejected() {
        let source = Segment::new(0.0, 0.0, 100.0, 0.0);
        let current = Segment::new(0.0, 0.0, 1.0, 0.0);
        let flags = MagicFlags {
            scale: true,
            ..MagicFlags::default()
        };

        let result = magic_tool(key(), TARGET, BOUNDS, source, current, flags);
        assert_eq!(result.scale, 1.0);
    }

    #[test]
    fn test_crop_side_must_exceed_minimum() {
        let source = Segment::new(0.0, 0.0, 10.0, 0.0);
        let flags = MagicFlags {
            scale: true,
            ..MagicFlags::default()
        };

        // Halving a 30x30 crop leaves exactly 15 pixels per side
        let exact = Segment::new(0.0, 0.0, 5.0, 0.0);
        let result = magic_tool(key(), (30, 30), BOUNDS, source, exact, flags);
        assert_eq!(result.scale, 1.0);

        let wider = Segment::new(0.0, 0.0, 6.0, 0.0);
        let result = magic_tool(key(), (30, 30), BOUNDS, source, wider, flags);
        assert!((result.scale - 0.6).abs() < 1e-9);
    }
}
