use std::f64::consts::{FRAC_PI_2, TAU};

use super::{Canvas, Point};
use crate::notes::Category;

/// Radius of the anchor circle for `canvas`.
pub fn anchor_radius(canvas: &Canvas, radius_ratio: f64) -> f64 {
    radius_ratio * canvas.width.min(canvas.height) / 2.0
}

/// Anchor point of `category`.
///
/// Categories sit evenly around a circle centered on the canvas in their
/// declared order, the first one straight above the center.
pub fn category_anchor(category: Category, canvas: &Canvas, radius_ratio: f64) -> Point {
    let count = Category::ALL.len() as f64;
    let angle = -FRAC_PI_2 + TAU * category.ordinal() as f64 / count;
    let radius = anchor_radius(canvas, radius_ratio);

    canvas.center() + Point::new(angle.cos(), angle.sin()) * radius
}
