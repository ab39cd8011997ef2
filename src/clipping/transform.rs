//! Key-to-box geometry: interpolation between authored keys and the bounds
//! clamp that keeps every crop inside the source frame.

use crate::geometry::Quad;

use super::key::ClippingKey;

/// Upper bound on scale-down passes in [`limit_scale`]. The first pass does
/// nearly all the work; later ones absorb integer truncation leftovers.
const LIMIT_SCALE_PASSES: usize = 8;

/// Fold an angle into `[0, 360]`
pub fn normalize_angle(mut degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    while degrees < 0.0 {
        degrees += 360.0;
    }
    while degrees > 360.0 {
        degrees -= 360.0;
    }
    degrees
}

/// The source-frame quadrilateral a key maps onto a `target_w x target_h`
/// output.
///
/// The output rectangle is centered on the origin, rotated, scaled and then
/// moved to `(px, py)`, so rotation and scale both act around the crop center.
pub fn clipping_box(key: &ClippingKey, target_w: u32, target_h: u32) -> Quad {
    let (w, h) = (f64::from(target_w), f64::from(target_h));

    Quad::from_rect(0.0, 0.0, w, h)
        .translate(-w / 2.0, -h / 2.0)
        .rotate(key.angle())
        .scale(key.scale)
        .translate(key.px, key.py)
        .trunc_precision()
}

/// Key at `frame` derived from a list sorted by frame.
///
/// Frames before the first key or after the last one repeat the nearest key.
/// An exact match is returned as authored; anything else is tagged
/// `computed`. Returns `None` for an empty list.
pub fn compute_interpolation(frame: u32, keys: &[ClippingKey]) -> Option<ClippingKey> {
    let first = keys.first()?;
    let (mut left, mut right) = (first, first);
    let mut found = false;

    for key in keys {
        if key.frame <= frame {
            left = key;
            right = key;
            found = true;
        }
        if key.frame >= frame {
            right = key;
            if !found {
                left = key;
            }
            break;
        }
    }

    if left.frame == frame {
        return Some(*left);
    }
    if right.frame == frame {
        return Some(*right);
    }

    let mut current = *left;
    current.frame = frame;
    current.computed = true;

    if left.frame < right.frame {
        let t = f64::from(frame - left.frame) / f64::from(right.frame - left.frame);

        current.px = left.px + (right.px - left.px) * t;
        current.py = left.py + (right.py - left.py) * t;
        current.scale = left.scale + (right.scale - left.scale) * t;
        current.set_angle(normalize_angle(
            left.angle() + angle_travel(left.angle(), right.angle()) * t,
        ));
    }

    Some(current)
}

/// Signed rotation from `from` to `to` along the short way around
fn angle_travel(from: f64, to: f64) -> f64 {
    let mut delta = to - from;
    let clockwise = if delta < 0.0 {
        delta + 360.0 <= 180.0
    } else {
        delta <= 180.0
    };

    if !clockwise {
        delta = -delta;
    }
    if delta < 0.0 {
        delta += 360.0;
    }

    if clockwise {
        delta
    } else {
        -delta
    }
}

/// Shrink `key.scale` until its box's occupied area fits in
/// `[0, width] x [0, height]`.
///
/// Per axis the overshoot is compared against the distance from the box
/// center to the violated edge, and the more restrictive factor wins. The
/// position is never touched and the scale never grows.
pub fn limit_scale(
    width: f64,
    height: f64,
    target_w: u32,
    target_h: u32,
    key: ClippingKey,
) -> ClippingKey {
    let mut key = key;

    for _ in 0..LIMIT_SCALE_PASSES {
        let area = clipping_box(&key, target_w, target_h).occupied_area();
        let center = area.center();
        let lt = area.left_top_violation();
        let rb = area.right_bottom_violation(width, height);

        let x_pass = lt.x.max(rb.x);
        let y_pass = lt.y.max(rb.y);
        if x_pass == 0.0 && y_pass == 0.0 {
            break;
        }

        let dist_x = if lt.x > rb.x {
            center.x + lt.x
        } else {
            width - center.x + rb.x
        }
        .trunc();
        let dist_y = if lt.y > rb.y {
            center.y + lt.y
        } else {
            height - center.y + rb.y
        }
        .trunc();

        let scale_x = if dist_x != 0.0 { 1.0 - x_pass / dist_x } else { 1.0 };
        let scale_y = if dist_y != 0.0 { 1.0 - y_pass / dist_y } else { 1.0 };
        let factor = scale_x.min(scale_y);

        if !(factor > 0.0 && factor < 1.0) {
            break;
        }
        key.scale *= factor;
    }

    key
}

/// Constrain a key to a `max_x x max_y` source frame.
///
/// The angle lands in `[0, 360)`, the center keeps at least one pixel away
/// from each edge and the scale is reduced until the crop fits.
pub fn adjust_bounds(
    key: ClippingKey,
    target_w: u32,
    target_h: u32,
    max_x: u32,
    max_y: u32,
) -> ClippingKey {
    let mut key = key;
    let (max_x, max_y) = (f64::from(max_x), f64::from(max_y));

    let angle = normalize_angle(key.angle());
    key.set_angle(if angle >= 360.0 { angle - 360.0 } else { angle });

    if key.px < 1.0 {
        key.px = 1.0;
    }
    if key.py < 1.0 {
        key.py = 1.0;
    }
    if key.px + 1.0 >= max_x {
        key.px = max_x - 2.0;
    }
    if key.py + 1.0 >= max_y {
        key.py = max_y - 2.0;
    }

    limit_scale(max_x - 1.0, max_y - 1.0, target_w, target_h, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn sample_keys() -> Vec<ClippingKey> {
        vec![
            ClippingKey::new(120, 40.0, 60.0, 1.0, 360.0),
            ClippingKey::new(1200, 80.0, 120.0, 0.5, 180.0),
        ]
    }

    fn random_key(rng: &mut SmallRng) -> ClippingKey {
        ClippingKey::new(
            rng.gen_range(0..2000),
            rng.gen_range(-200.0..1500.0),
            rng.gen_range(-200.0..900.0),
            rng.gen_range(0.05..12.0),
            rng.gen_range(-720.0..720.0),
        )
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(-30.0), 330.0);
        assert_eq!(normalize_angle(400.0), 40.0);
        assert_eq!(normalize_angle(360.0), 360.0);
        assert_eq!(normalize_angle(f64::NAN), 0.0);
    }

    #[test]
    fn test_interpolation_between_keys() {
        let key = compute_interpolation(500, &sample_keys()).unwrap();

        assert_eq!(key.frame, 500);
        assert!(key.computed);
        assert!((key.angle() - 63.333).abs() < 0.01);
        assert!((key.scale - 0.82407).abs() < 0.0001);
        assert!((key.px - 54.07).abs() < 0.01);
        assert!((key.py - 81.11).abs() < 0.01);
    }

    #[test]
    fn test_interpolation_outside_and_on_keys() {
        let keys = sample_keys();

        let before = compute_interpolation(119, &keys).unwrap();
        assert!(before.computed);
        assert_eq!(before.frame, 119);
        assert_eq!((before.px, before.py, before.scale), (40.0, 60.0, 1.0));
        assert_eq!(before.angle(), 360.0);

        let on_first = compute_interpolation(120, &keys).unwrap();
        assert!(!on_first.computed);
        assert_eq!(on_first, keys[0]);

        let on_last = compute_interpolation(1200, &keys).unwrap();
        assert_eq!(on_last, keys[1]);

        let after = compute_interpolation(1201, &keys).unwrap();
        assert!(after.computed);
        assert_eq!(after.frame, 1201);
        assert_eq!((after.px, after.py, after.scale), (80.0, 120.0, 0.5));
        assert_eq!(after.angle(), 180.0);

        assert!(compute_interpolation(10, &[]).is_none());
    }

    #[test]
    fn test_interpolation_takes_short_way_around() {
        let keys = vec![
            ClippingKey::new(0, 0.0, 0.0, 1.0, 350.0),
            ClippingKey::new(10, 0.0, 0.0, 1.0, 10.0),
        ];

        let quarter = compute_interpolation(2, &keys).unwrap();
        assert!((quarter.angle() - 354.0).abs() < 0.001);

        let past_zero = compute_interpolation(8, &keys).unwrap();
        assert!((past_zero.angle() - 6.0).abs() < 0.001);

        let reversed = vec![
            ClippingKey::new(0, 0.0, 0.0, 1.0, 10.0),
            ClippingKey::new(10, 0.0, 0.0, 1.0, 350.0),
        ];
        let half = compute_interpolation(5, &reversed).unwrap();
        assert!(half.angle() < 0.001 || half.angle() > 359.999);
    }

    #[test]
    fn test_clipping_box_center_round_trip() {
        let key = ClippingKey::new(1, 640.0, 360.0, 1.0, 0.0);
        let quad = clipping_box(&key, 80, 82);

        assert_eq!(quad.center().x, 640.0);
        assert_eq!(quad.center().y, 360.0);
        assert_eq!(quad[0].x, 600.0);
        assert_eq!(quad[0].y, 319.0);
        assert_eq!(quad[2].x, 680.0);
        assert_eq!(quad[2].y, 401.0);
    }

    #[test]
    fn test_adjust_bounds_normalizes_full_turn() {
        let key = ClippingKey::new(120, 40.0, 60.0, 1.0, 360.0);
        let adjusted = adjust_bounds(key, 80, 82, 1280, 720);

        assert_eq!(adjusted.angle(), 0.0);
        assert_eq!(adjusted.px, 40.0);
        assert_eq!(adjusted.py, 60.0);
        assert_eq!(adjusted.scale, 1.0);
    }

    #[test]
    fn test_rotation_shrinks_oversized_crop() {
        let key = ClippingKey::new(1, 640.0, 360.0, 1.0, 90.0);
        let adjusted = adjust_bounds(key, 1280, 720, 1280, 720);

        assert!(adjusted.scale < 1.0);
        assert!((adjusted.scale - 0.56).abs() < 0.01);
        assert_eq!((adjusted.px, adjusted.py), (640.0, 360.0));

        let key = ClippingKey::new(1, 640.0, 360.0, 1.0, 45.0);
        let adjusted = adjust_bounds(key, 1280, 720, 1280, 720);
        assert!((adjusted.scale - 0.51).abs() < 0.01, "{}", adjusted.scale);

        // 320x180 at 4x covers the whole frame before rotating
        let key = ClippingKey::new(1, 640.0, 360.0, 4.0, 45.0);
        let adjusted = adjust_bounds(key, 320, 180, 1280, 720);
        assert!((adjusted.scale / 4.0 - 0.51).abs() < 0.01, "{}", adjusted.scale);
        assert_eq!((adjusted.px, adjusted.py), (640.0, 360.0));

        let area = clipping_box(&adjusted, 320, 180).occupied_area();
        assert!(area[0].x >= 0.0 && area[0].y >= 0.0);
        assert!(area[2].x <= 1279.0 && area[2].y <= 719.0);
    }

    #[test]
    fn test_adjust_bounds_clamps_position() {
        let key = ClippingKey::new(1, -50.0, 5000.0, 0.1, 0.0);
        let adjusted = adjust_bounds(key, 80, 82, 1280, 720);

        assert_eq!(adjusted.px, 1.0);
        assert_eq!(adjusted.py, 718.0);
    }

    #[test]
    fn test_adjust_bounds_is_idempotent() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);

        for _ in 0..500 {
            let key = random_key(&mut rng);
            let once = adjust_bounds(key, 80, 82, 1280, 720);
            let twice = adjust_bounds(once, 80, 82, 1280, 720);
            assert_eq!(once, twice, "not idempotent for {:?}", key);
        }
    }

    #[test]
    fn test_limit_scale_stays_inside() {
        let mut rng = SmallRng::seed_from_u64(42);

        for _ in 0..500 {
            let key = adjust_bounds(random_key(&mut rng), 0, 0, 1280, 720);
            let mut key = key;
            key.scale = rng.gen_range(0.1..10.0);
            let limited = limit_scale(1279.0, 719.0, 160, 90, key);

            assert!(limited.scale <= key.scale);

            let area = clipping_box(&limited, 160, 90).occupied_area();
            assert!(area[0].x >= 0.0 && area[0].y >= 0.0, "{:?}", limited);
            assert!(area[2].x <= 1279.0 && area[2].y <= 719.0, "{:?}", limited);
        }
    }
}
