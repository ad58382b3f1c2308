//! One tick of the force simulation.
//!
//! Every tick is computed from positions alone; nothing carries over between
//! ticks except the positions themselves.

use serde::Serialize;

use super::{Canvas, Point};
use crate::config::LayoutConfig;
use crate::similarity::SimilarityMatrix;

/// Below this distance two nodes are treated as coincident.
const COINCIDENT_DISTANCE: f64 = 1e-9;

/// Golden angle, spreads the fallback directions of coincident pairs.
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Force contributions acting on one node during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ForceBreakdown {
    pub repulsion: Point,
    pub attraction: Point,
    pub gravity: Point,
}

impl ForceBreakdown {
    pub fn total(&self) -> Point {
        self.repulsion + self.attraction + self.gravity
    }
}

/// Everything one tick reads.
pub(crate) struct TickInput<'a> {
    pub positions: &'a [Point],
    /// Category anchor of each node
    pub anchors: &'a [Point],
    pub similarities: &'a SimilarityMatrix,
    pub config: &'a LayoutConfig,
    pub attraction_threshold: f32,
}

/// Unit vector from `j` toward `i`, and their distance.
fn separation(i: usize, j: usize, pi: Point, pj: Point) -> (Point, f64) {
    let delta = pi - pj;
    let distance = delta.length();

    if distance < COINCIDENT_DISTANCE || !distance.is_finite() {
        let angle = (i * 31 + j * 17) as f64 * GOLDEN_ANGLE;
        return (Point::new(angle.cos(), angle.sin()), 0.0);
    }

    (delta * (1.0 / distance), distance)
}

/// Accumulate repulsion, attraction and gravity for every node.
pub(crate) fn compute_forces(input: &TickInput<'_>) -> Vec<ForceBreakdown> {
    let config = input.config;
    let n = input.positions.len();
    let mut forces = vec![ForceBreakdown::default(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            let (direction, distance) =
                separation(i, j, input.positions[i], input.positions[j]);

            if distance <= config.max_repulsion_distance {
                let clamped = distance.max(config.min_distance);
                let push = direction * (config.repulsion / (clamped * clamped));
                forces[i].repulsion += push;
                forces[j].repulsion -= push;
            }

            if let Some(similarity) = input.similarities.get(i, j) {
                if similarity > input.attraction_threshold {
                    let similarity = similarity as f64;
                    let target = config.spring_length * (1.0 - similarity);
                    // positive when stretched, pulls the pair together
                    let pull = direction
                        * (config.spring_strength * (distance - target) * similarity);
                    forces[i].attraction -= pull;
                    forces[j].attraction += pull;
                }
            }
        }
    }

    for (force, (position, anchor)) in forces
        .iter_mut()
        .zip(input.positions.iter().zip(input.anchors.iter()))
    {
        force.gravity = (*anchor - *position) * config.gravity;
    }

    forces
}

/// Apply one tick of forces: cap each displacement at `max_step`, then
/// clamp into the padded canvas.
pub(crate) fn integrate(
    positions: &[Point],
    forces: &[ForceBreakdown],
    canvas: &Canvas,
    config: &LayoutConfig,
) -> Vec<Point> {
    positions
        .iter()
        .zip(forces.iter())
        .map(|(position, force)| {
            let mut step = force.total();
            if !step.is_finite() {
                step = Point::ZERO;
            }

            let length = step.length();
            if length > config.max_step {
                step = step * (config.max_step / length);
            }

            canvas.clamp(*position + step, config.padding)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        positions: &'a [Point],
        anchors: &'a [Point],
        similarities: &'a SimilarityMatrix,
        config: &'a LayoutConfig,
    ) -> TickInput<'a> {
        TickInput {
            positions,
            anchors,
            similarities,
            config,
            attraction_threshold: 0.5,
        }
    }

    #[test]
    fn test_repulsion_is_inverse_square_and_symmetric() {
        let config = LayoutConfig {
            gravity: 0.0,
            ..Default::default()
        };
        let positions = [Point::new(100.0, 100.0), Point::new(120.0, 100.0)];
        let anchors = positions;
        let matrix = SimilarityMatrix::compute(&[None, None]);

        let forces = compute_forces(&input(&positions, &anchors, &matrix, &config));

        let expected = config.repulsion / 400.0;
        assert!((forces[0].repulsion.x + expected).abs() < 1e-9);
        assert!((forces[1].repulsion.x - expected).abs() < 1e-9);
        assert_eq!(forces[0].attraction, Point::ZERO);
        assert_eq!(forces[0].gravity, Point::ZERO);
    }

    #[test]
    fn test_repulsion_cutoff() {
        let config = LayoutConfig::default();
        let far = config.max_repulsion_distance + 1.0;
        let positions = [Point::new(0.0, 0.0), Point::new(far, 0.0)];
        let matrix = SimilarityMatrix::compute(&[None, None]);

        let forces = compute_forces(&input(&positions, &positions, &matrix, &config));
        assert_eq!(forces[0].repulsion, Point::ZERO);
        assert_eq!(forces[1].repulsion, Point::ZERO);
    }

    #[test]
    fn test_coincident_nodes_still_separate() {
        let config = LayoutConfig::default();
        let positions = [Point::new(50.0, 50.0), Point::new(50.0, 50.0)];
        let matrix = SimilarityMatrix::compute(&[None, None]);

        let forces = compute_forces(&input(&positions, &positions, &matrix, &config));

        let push = forces[0].repulsion;
        assert!(push.is_finite());
        let expected = config.repulsion / (config.min_distance * config.min_distance);
        assert!((push.length() - expected).abs() < 1e-6);
        assert_eq!(forces[1].repulsion, push * -1.0);
    }

    #[test]
    fn test_attraction_pulls_similar_pair_together() {
        let config = LayoutConfig {
            repulsion: 0.0,
            gravity: 0.0,
            ..Default::default()
        };
        let a = vec![1.0, 0.0];
        let b = vec![0.8, 0.6];
        let matrix = SimilarityMatrix::compute(&[Some(a.as_slice()), Some(b.as_slice())]);
        let positions = [Point::new(0.0, 0.0), Point::new(200.0, 0.0)];

        let forces = compute_forces(&input(&positions, &positions, &matrix, &config));

        // similarity 0.8: target 30px, stretch 170px
        let expected = config.spring_strength * 170.0 * 0.8;
        assert!((forces[0].attraction.x - expected).abs() < 1e-4);
        assert!((forces[1].attraction.x + expected).abs() < 1e-4);
    }

    #[test]
    fn test_attraction_threshold_is_strict() {
        let config = LayoutConfig::default();
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 1.0];
        let matrix = SimilarityMatrix::compute(&[Some(a.as_slice()), Some(b.as_slice())]);
        let positions = [Point::new(0.0, 0.0), Point::new(200.0, 0.0)];
        let mut tick = input(&positions, &positions, &matrix, &config);
        tick.attraction_threshold = matrix.get(0, 1).unwrap();

        let forces = compute_forces(&tick);
        assert_eq!(forces[0].attraction, Point::ZERO);
    }

    #[test]
    fn test_gravity_toward_anchor() {
        let config = LayoutConfig::default();
        let positions = [Point::new(100.0, 100.0)];
        let anchors = [Point::new(200.0, 50.0)];
        let matrix = SimilarityMatrix::compute(&[None]);

        let forces = compute_forces(&input(&positions, &anchors, &matrix, &config));

        assert!((forces[0].gravity.x - 100.0 * config.gravity).abs() < 1e-9);
        assert!((forces[0].gravity.y + 50.0 * config.gravity).abs() < 1e-9);
    }

    #[test]
    fn test_integrate_caps_step_and_clamps() {
        let config = LayoutConfig::default();
        let canvas = Canvas::new(400.0, 400.0);
        let positions = [Point::new(200.0, 200.0), Point::new(45.0, 200.0)];
        let forces = [
            ForceBreakdown {
                repulsion: Point::new(1000.0, 0.0),
                ..Default::default()
            },
            ForceBreakdown {
                gravity: Point::new(-10.0, 0.0),
                ..Default::default()
            },
        ];

        let next = integrate(&positions, &forces, &canvas, &config);

        assert!((next[0].x - (200.0 + config.max_step)).abs() < 1e-9);
        assert_eq!(next[1].x, config.padding);
    }

    #[test]
    fn test_integrate_ignores_non_finite_force() {
        let config = LayoutConfig::default();
        let canvas = Canvas::new(400.0, 400.0);
        let positions = [Point::new(200.0, 200.0)];
        let forces = [ForceBreakdown {
            repulsion: Point::new(f64::INFINITY, f64::NAN),
            ..Default::default()
        }];

        let next = integrate(&positions, &forces, &canvas, &config);
        assert_eq!(next[0], positions[0]);
    }
}
