use super::Point;

/// Ordered quadrilateral of four points.
///
/// Axis-aligned construction yields `[top-left, top-right, bottom-right,
/// bottom-left]`. After rotation the order is preserved but the sides are no
/// longer axis-aligned; [`Quad::occupied_area`] recovers the bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quad {
    points: [Point; 4],
}

impl Quad {
    pub fn new(p0: Point, p1: Point, p2: Point, p3: Point) -> Self {
        Self {
            points: [p0, p1, p2, p3],
        }
    }

    /// Axis-aligned rectangle from two opposite corners
    pub fn from_rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        )
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.points
    }

    pub fn translate(self, dx: f64, dy: f64) -> Self {
        self.map(|p| Point::new(p.x + dx, p.y + dy))
    }

    /// Multiply every coordinate by `factor` (scales about the origin)
    pub fn scale(self, factor: f64) -> Self {
        self.map(|p| Point::new(p.x * factor, p.y * factor))
    }

    /// Rotate every point about the origin
    pub fn rotate(self, degrees: f64) -> Self {
        self.map(|p| p.rotate(degrees))
    }

    pub fn trunc_precision(self) -> Self {
        self.map(Point::trunc_precision)
    }

    pub fn center(&self) -> Point {
        let sum = self
            .points
            .iter()
            .fold(Point::default(), |acc, p| acc + *p);
        Point::new(sum.x / 4.0, sum.y / 4.0)
    }

    /// Width and height measured along the first and second edges
    pub fn size(&self) -> Point {
        Point::new(
            self.points[1].x - self.points[0].x,
            self.points[2].y - self.points[0].y,
        )
    }

    /// Axis-aligned bounding rectangle
    pub fn occupied_area(&self) -> Quad {
        let mut min = self.points[0];
        let mut max = self.points[0];

        for p in &self.points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }

        Quad::from_rect(min.x, min.y, max.x, max.y)
    }

    /// How far the top-left corner lies beyond the left/top edges.
    /// Meaningful on an [`Quad::occupied_area`] result.
    pub fn left_top_violation(&self) -> Point {
        let p0 = self.points[0];
        Point::new(
            if p0.x < 0.0 { (-p0.x).trunc() } else { 0.0 },
            if p0.y < 0.0 { (-p0.y).trunc() } else { 0.0 },
        )
    }

    /// How far the right and bottom edges overshoot a `w` x `h` area.
    /// Meaningful on an [`Quad::occupied_area`] result.
    pub fn right_bottom_violation(&self, w: f64, h: f64) -> Point {
        let right = self.points[1].x;
        let bottom = self.points[2].y;
        Point::new(
            if right > w { (right - w).trunc() } else { 0.0 },
            if bottom > h { (bottom - h).trunc() } else { 0.0 },
        )
    }

    /// Whether `point` lies inside the quadrilateral or on one of its edges
    pub fn contours_point(&self, point: Point) -> bool {
        let mut sign = 0.0_f64;

        for i in 0..4 {
            let a = self.points[i];
            let b = self.points[(i + 1) % 4];
            let cross = (b.x - a.x) * (point.y - a.y) - (b.y - a.y) * (point.x - a.x);

            if cross == 0.0 {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }

        true
    }

    fn map<F: Fn(Point) -> Point>(self, f: F) -> Self {
        Self {
            points: self.points.map(f),
        }
    }
}

impl std::ops::Index<usize> for Quad {
    type Output = Point;

    fn index(&self, index: usize) -> &Point {
        &self.points[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Quad {
        Quad::new(
            Point::new(0.0, -10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(-10.0, 0.0),
        )
    }

    #[test]
    fn test_translate_and_scale() {
        let q = Quad::from_rect(0.0, 0.0, 10.0, 20.0).translate(-5.0, -10.0).scale(2.0);
        assert_eq!(q[0], Point::new(-10.0, -20.0));
        assert_eq!(q[2], Point::new(10.0, 20.0));
        assert_eq!(q.size(), Point::new(20.0, 40.0));
    }

    #[test]
    fn test_rotate_square() {
        let q = Quad::from_rect(-10.0, -10.0, 10.0, 10.0).rotate(45.0).trunc_precision();
        assert_eq!(q[0], Point::new(0.0, -14.0));
        assert_eq!(q[1], Point::new(14.0, 0.0));
        assert_eq!(q[2], Point::new(0.0, 14.0));
        assert_eq!(q[3], Point::new(-14.0, 0.0));
    }

    #[test]
    fn test_center() {
        let q = Quad::from_rect(10.0, 20.0, 30.0, 60.0);
        assert_eq!(q.center(), Point::new(20.0, 40.0));
        assert_eq!(diamond().center(), Point::new(0.0, 0.0));
    }

    #[test]
    fn test_occupied_area() {
        let area = diamond().occupied_area();
        assert_eq!(area, Quad::from_rect(-10.0, -10.0, 10.0, 10.0));
    }

    #[test]
    fn test_violations() {
        let area = Quad::from_rect(-5.5, -2.0, 110.0, 70.0);
        assert_eq!(area.left_top_violation(), Point::new(5.0, 2.0));
        assert_eq!(area.right_bottom_violation(100.0, 80.0), Point::new(10.0, 0.0));

        let inside = Quad::from_rect(1.0, 1.0, 50.0, 50.0);
        assert_eq!(inside.left_top_violation(), Point::default());
        assert_eq!(inside.right_bottom_violation(100.0, 100.0), Point::default());
    }

    #[test]
    fn test_contours_point() {
        let d = diamond();
        assert!(d.contours_point(Point::new(4.0, 0.0)));
        assert!(d.contours_point(Point::new(-4.0, 0.0)));
        assert!(d.contours_point(Point::new(0.0, 4.0)));
        assert!(d.contours_point(Point::new(0.0, -4.0)));
        assert!(d.contours_point(Point::new(5.0, -5.0)));
        assert!(!d.contours_point(Point::new(6.0, -6.0)));
        assert!(!d.contours_point(Point::new(-6.0, 6.0)));
    }
}
