use std::ops::{Add, Sub};

/// A 2D point with floating point precision.
///
/// Coordinates stay fractional through intermediate math and are truncated
/// with [`Point::trunc_precision`] before being used as pixel indices.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate around the origin by `degrees`
    pub fn rotate(self, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Direction of the vector from the origin to this point, in `[0, 360)`.
    ///
    /// Grows in the same rotational direction as [`Point::rotate`], so
    /// `p.rotate(a).angle_0_360() - p.angle_0_360()` is `a` modulo 360.
    pub fn angle_0_360(&self) -> f64 {
        let angle = self.y.atan2(self.x).to_degrees();
        if angle < 0.0 {
            angle + 360.0
        } else {
            angle
        }
    }

    /// Express this point relative to another origin
    pub fn to_axis(self, x: f64, y: f64) -> Self {
        Self {
            x: self.x - x,
            y: self.y - y,
        }
    }

    /// Drop the fractional part of both coordinates (toward zero)
    pub fn trunc_precision(self) -> Self {
        Self {
            x: self.x.trunc(),
            y: self.y.trunc(),
        }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_45() {
        let p = Point::new(0.0, -10.0).rotate(45.0).trunc_precision();
        assert_eq!(p, Point::new(7.0, -7.0));

        let p = Point::new(-10.0, -10.0).rotate(45.0).trunc_precision();
        assert_eq!(p, Point::new(0.0, -14.0));
    }

    #[test]
    fn test_distance() {
        let d = Point::new(4.0, 4.0).distance_to(Point::default());
        assert!((d - 5.656).abs() < 0.01);
    }

    #[test]
    fn test_angle_0_360() {
        assert!((Point::new(10.0, 0.0).angle_0_360() - 0.0).abs() < 1e-9);
        assert!((Point::new(0.0, 10.0).angle_0_360() - 90.0).abs() < 1e-9);
        assert!((Point::new(-10.0, 0.0).angle_0_360() - 180.0).abs() < 1e-9);
        assert!((Point::new(0.0, -10.0).angle_0_360() - 270.0).abs() < 1e-9);
        assert!((Point::new(7.0, 7.0).angle_0_360() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_follows_rotation() {
        let p = Point::new(3.0, 4.0);
        let delta = p.rotate(30.0).angle_0_360() - p.angle_0_360();
        assert!((delta - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_to_axis_and_trunc() {
        let p = Point::new(10.5, -3.7).to_axis(2.0, 2.0).trunc_precision();
        assert_eq!(p, Point::new(8.0, -5.0));
    }
}
