//! Force-directed layout of notes on a 2-D canvas.
//!
//! Similar notes attract, every pair repels, and each note is pulled toward
//! its category's anchor on a circle around the canvas center.
//!
//! # Architecture
//!
//! - `anchors`: deterministic per-category anchor points
//! - `forces`: one tick of force accumulation and integration
//! - `engine`: the simulation object (seed, tick, cancel, edges)
//! - `driver`: async host loop publishing one position map per tick

mod anchors;
pub mod driver;
mod edges;
mod engine;
mod forces;

use std::collections::HashMap;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::notes::NoteId;

pub use anchors::{anchor_radius, category_anchor};
pub use driver::{LayoutDriver, RunOutcome, TickUpdate};
pub use edges::{similarity_edges, Edge};
pub use engine::{LayoutEngine, SimulationHandle};
pub use forces::ForceBreakdown;

/// Positions keyed by note, as handed to the rendering surface.
pub type PositionMap = HashMap<NoteId, Point>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self - other).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Drawing area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// Clamp `point` into the canvas shrunk by `padding` on every side.
    ///
    /// An axis too small to fit the padding collapses to its midpoint.
    pub fn clamp(&self, point: Point, padding: f64) -> Point {
        Point::new(
            clamp_axis(point.x, self.width, padding),
            clamp_axis(point.y, self.height, padding),
        )
    }
}

fn clamp_axis(value: f64, size: f64, padding: f64) -> f64 {
    let (lo, hi) = (padding, size - padding);
    // also catches NaN bounds
    if !(lo <= hi) {
        return if size.is_finite() { size / 2.0 } else { 0.0 };
    }
    if value.is_nan() {
        return (lo + hi) / 2.0;
    }
    value.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_ops() {
        let a = Point::new(3.0, 4.0);
        let b = Point::new(1.0, 1.0);

        assert_eq!(a.length(), 5.0);
        assert_eq!(a + b, Point::new(4.0, 5.0));
        assert_eq!(a - b, Point::new(2.0, 3.0));
        assert_eq!(b * 2.5, Point::new(2.5, 2.5));
        assert_eq!(Point::ZERO.distance(a), 5.0);
    }

    #[test]
    fn test_clamp_inside_padding() {
        let canvas = Canvas::new(400.0, 300.0);

        assert_eq!(
            canvas.clamp(Point::new(-10.0, 500.0), 40.0),
            Point::new(40.0, 260.0)
        );
        assert_eq!(
            canvas.clamp(Point::new(100.0, 100.0), 40.0),
            Point::new(100.0, 100.0)
        );
    }

    #[test]
    fn test_clamp_degenerate_canvas() {
        let tiny = Canvas::new(50.0, 0.0);
        let p = tiny.clamp(Point::new(10.0, 10.0), 40.0);
        assert_eq!(p, Point::new(25.0, 0.0));

        let negative = Canvas::new(-100.0, 100.0);
        assert!(negative.clamp(Point::new(1.0, 1.0), 40.0).is_finite());

        let nan = Canvas::new(200.0, 200.0).clamp(Point::new(f64::NAN, 50.0), 40.0);
        assert_eq!(nan, Point::new(100.0, 50.0));
    }
}
