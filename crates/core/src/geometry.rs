//! Bounding boxes and the small amount of arithmetic done on them.
//!
//! Coordinates are PDF points with the origin at the top-left corner of the
//! page and y growing downward.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Axis-aligned box `[x0, y0, x1, y1]`.
///
/// A value of this type always satisfies `x0 <= x1`, `y0 <= y1` with finite
/// coordinates when built through [`BBox::new`] or deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    /// Build a box, rejecting non-finite or inverted extents.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Option<Self> {
        let finite = [x0, y0, x1, y1].iter().all(|v| v.is_finite());
        if !finite || x0 > x1 || y0 > y1 {
            return None;
        }
        Some(Self { x0, y0, x1, y1 })
    }

    /// Parse caller-supplied JSON. Anything other than an array of exactly
    /// four finite numbers forming a non-inverted box yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let arr = value.as_array()?;
        if arr.len() != 4 {
            return None;
        }
        let mut coords = [0.0f64; 4];
        for (slot, item) in coords.iter_mut().zip(arr) {
            *slot = item.as_f64()?;
        }
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    pub fn width(&self) -> f64 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y1 - self.y0).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Clip the box to `[0, width] x [0, height]`. `None` when nothing is left.
    pub fn clip_to(&self, width: f64, height: f64) -> Option<BBox> {
        let clipped = BBox::new(
            self.x0.clamp(0.0, width),
            self.y0.clamp(0.0, height),
            self.x1.clamp(0.0, width),
            self.y1.clamp(0.0, height),
        )?;
        (clipped.area() > 0.0).then_some(clipped)
    }

    /// Coordinates rounded to one decimal, as integers, for de-duplication.
    pub fn rounded_key(&self) -> [i64; 4] {
        [self.x0, self.y0, self.x1, self.y1].map(|v| (v * 10.0).round() as i64)
    }
}

impl TryFrom<[f64; 4]> for BBox {
    type Error = String;

    fn try_from(v: [f64; 4]) -> Result<Self, Self::Error> {
        BBox::new(v[0], v[1], v[2], v[3]).ok_or_else(|| format!("malformed bbox {:?}", v))
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// Area of a raw coordinate quadruple; malformed input has zero area.
pub fn area(coords: &[f64]) -> f64 {
    if coords.len() != 4 || coords.iter().any(|v| !v.is_finite()) {
        return 0.0;
    }
    (coords[2] - coords[0]).max(0.0) * (coords[3] - coords[1]).max(0.0)
}

/// Smallest box enclosing every input box.
pub fn union<'a, I>(boxes: I) -> Option<BBox>
where
    I: IntoIterator<Item = &'a BBox>,
{
    boxes.into_iter().fold(None, |acc: Option<BBox>, b| {
        Some(match acc {
            None => *b,
            Some(u) => BBox {
                x0: u.x0.min(b.x0),
                y0: u.y0.min(b.y0),
                x1: u.x1.max(b.x1),
                y1: u.y1.max(b.y1),
            },
        })
    })
}

/// Clip a ratio into `[0, 1]`. NaN maps to 0.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
