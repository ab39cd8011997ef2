use serde::{Deserialize, Serialize};

/// One authored control point of a clipping.
///
/// `px`/`py` locate the crop center in source pixels, `scale` multiplies the
/// output size (1.0 samples exactly `w x h` source pixels) and the angle is in
/// degrees. Keys produced by interpolation carry `computed = true`.
///
/// The angle is kept at thousandth-of-a-degree precision, which is also how it
/// travels on the wire: `{"angle": 360000}` means 360 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "KeyWire", into = "KeyWire")]
pub struct ClippingKey {
    pub frame: u32,
    pub px: f64,
    pub py: f64,
    pub scale: f64,
    angle: f64,
    pub computed: bool,
}

impl Default for ClippingKey {
    fn default() -> Self {
        Self {
            frame: 0,
            px: 0.0,
            py: 0.0,
            scale: 1.0,
            angle: 0.0,
            computed: false,
        }
    }
}

impl ClippingKey {
    pub fn new(frame: u32, px: f64, py: f64, scale: f64, angle: f64) -> Self {
        let mut key = Self {
            frame,
            px,
            py,
            scale,
            ..Self::default()
        };
        key.set_angle(angle);
        key
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Store `degrees` folded into `[0, 360]` and rounded to thousandths
    pub fn set_angle(&mut self, degrees: f64) {
        self.angle = thousandths_to_degrees(degrees_to_thousandths(degrees));
    }

    /// Angle in the fixed point wire encoding
    pub fn angle_thousandths(&self) -> i64 {
        degrees_to_thousandths(self.angle)
    }

    pub fn with_frame(mut self, frame: u32) -> Self {
        self.frame = frame;
        self
    }
}

fn degrees_to_thousandths(degrees: f64) -> i64 {
    if !degrees.is_finite() {
        return 0;
    }
    let mut value = degrees;
    while value > 360.0 {
        value -= 360.0;
    }
    while value < 0.0 {
        value += 360.0;
    }
    (value * 1000.0 + 0.5).floor() as i64
}

fn thousandths_to_degrees(value: i64) -> f64 {
    value as f64 / 1000.0
}

#[derive(Serialize, Deserialize)]
struct KeyWire {
    frame: u32,
    px: f64,
    py: f64,
    scale: f64,
    angle: i64,
}

impl From<KeyWire> for ClippingKey {
    fn from(wire: KeyWire) -> Self {
        Self::new(
            wire.frame,
            wire.px,
            wire.py,
            wire.scale,
            thousandths_to_degrees(wire.angle),
        )
    }
}

impl From<ClippingKey> for KeyWire {
    fn from(key: ClippingKey) -> Self {
        Self {
            frame: key.frame,
            px: key.px,
            py: key.py,
            scale: key.scale,
            angle: key.angle_thousandths(),
        }
    }
}
