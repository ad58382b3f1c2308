use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::anchors::category_anchor;
use super::edges::{similarity_edges, Edge};
use super::forces::{compute_forces, integrate, ForceBreakdown, TickInput};
use super::{Canvas, Point, PositionMap};
use crate::config::{LayoutConfig, SimilarityThresholds};
use crate::notes::{Note, NoteId};
use crate::similarity::SimilarityMatrix;

/// Cancels the simulation it was taken from, from any thread.
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    generation: Arc<AtomicU64>,
}

impl SimulationHandle {
    /// Invalidate the current run. Its next tick is discarded.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// State of one seeded run.
struct Run {
    generation: u64,
    canvas: Canvas,
    ids: Vec<NoteId>,
    anchors: Vec<Point>,
    positions: Vec<Point>,
    similarities: SimilarityMatrix,
    ticks_done: usize,
}

/// Force-directed layout simulation.
///
/// The host drives it: [`LayoutEngine::restart`] seeds a run for a note set,
/// then every [`LayoutEngine::tick`] advances it by one step until
/// `tick_count` steps are done. Positions outlive runs, so a restart after
/// the note set changes leaves already placed notes where they were.
///
/// Retained positions grow with every distinct note laid out; hosts that
/// delete notes call [`LayoutEngine::forget`] or
/// [`LayoutEngine::retain_only`] to evict them.
pub struct LayoutEngine {
    config: LayoutConfig,
    thresholds: SimilarityThresholds,
    retained: HashMap<NoteId, Point>,
    generation: Arc<AtomicU64>,
    rng: StdRng,
    run: Option<Run>,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig, thresholds: SimilarityThresholds) -> Self {
        Self::with_rng(config, thresholds, StdRng::from_os_rng())
    }

    /// Engine with a fixed jitter seed, for reproducible layouts.
    pub fn with_seed(config: LayoutConfig, thresholds: SimilarityThresholds, seed: u64) -> Self {
        Self::with_rng(config, thresholds, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: LayoutConfig, thresholds: SimilarityThresholds, rng: StdRng) -> Self {
        Self {
            config,
            thresholds,
            retained: HashMap::new(),
            generation: Arc::new(AtomicU64::new(0)),
            rng,
            run: None,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            generation: self.generation.clone(),
        }
    }

    /// Current generation; bumped by every restart and cancel.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Seed a new run, superseding any run in progress.
    ///
    /// Notes with a retained position keep it (clamped into `canvas`); new
    /// notes start at their category anchor plus jitter. An empty note set
    /// leaves the engine idle. Returns the new run's generation.
    pub fn restart(&mut self, notes: &[Note], canvas: Canvas) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if notes.is_empty() {
            log::debug!("layout generation {generation}: no notes, idle");
            self.run = None;
            return generation;
        }

        let padding = self.config.padding;
        let jitter = self.config.seed_jitter;
        let mut reused = 0usize;

        let anchors: Vec<Point> = notes
            .iter()
            .map(|note| category_anchor(note.category, &canvas, self.config.anchor_radius_ratio))
            .collect();

        let positions: Vec<Point> = notes
            .iter()
            .zip(anchors.iter())
            .map(|(note, anchor)| match self.retained.get(&note.id) {
                Some(position) => {
                    reused += 1;
                    canvas.clamp(*position, padding)
                }
                None => {
                    let offset = if jitter > 0.0 {
                        Point::new(
                            self.rng.random_range(-jitter..=jitter),
                            self.rng.random_range(-jitter..=jitter),
                        )
                    } else {
                        Point::ZERO
                    };
                    canvas.clamp(*anchor + offset, padding)
                }
            })
            .collect();

        let embeddings: Vec<Option<&[f32]>> =
            notes.iter().map(|note| note.embedding.as_deref()).collect();
        let similarities = SimilarityMatrix::compute(&embeddings);

        let ids: Vec<NoteId> = notes.iter().map(|note| note.id.clone()).collect();
        for (id, position) in ids.iter().zip(positions.iter()) {
            self.retained.insert(id.clone(), *position);
        }

        log::debug!(
            "layout generation {generation}: {} notes ({} reused positions) on {}x{}",
            ids.len(),
            reused,
            canvas.width,
            canvas.height
        );

        self.run = Some(Run {
            generation,
            canvas,
            ids,
            anchors,
            positions,
            similarities,
            ticks_done: 0,
        });

        generation
    }

    /// Invalidate the current run; positions of completed ticks are kept.
    pub fn cancel(&self) {
        self.handle().cancel();
    }

    /// Advance the current run by one tick.
    ///
    /// Returns `None` when idle, finished, or cancelled.
    pub fn tick(&mut self) -> Option<PositionMap> {
        self.tick_breakdown().map(|(positions, _)| positions)
    }

    /// Tick only if `generation` is still the current one.
    pub fn tick_for(&mut self, generation: u64) -> Option<PositionMap> {
        if generation != self.generation() {
            return None;
        }
        self.tick()
    }

    /// Like [`LayoutEngine::tick`], also returning the forces applied to each
    /// note, in note order.
    pub fn tick_breakdown(&mut self) -> Option<(PositionMap, Vec<ForceBreakdown>)> {
        let current = self.generation();
        let run_generation = self.run.as_ref()?.generation;
        if run_generation != current {
            log::debug!("layout generation {run_generation} superseded by {current}, discarding");
            self.run = None;
            return None;
        }

        let run = self.run.as_mut()?;
        if run.ticks_done >= self.config.tick_count {
            return None;
        }

        let forces = compute_forces(&TickInput {
            positions: &run.positions,
            anchors: &run.anchors,
            similarities: &run.similarities,
            config: &self.config,
            attraction_threshold: self.thresholds.attraction,
        });
        let next = integrate(&run.positions, &forces, &run.canvas, &self.config);

        // commit only whole ticks
        run.positions = next;
        run.ticks_done += 1;
        for (id, position) in run.ids.iter().zip(run.positions.iter()) {
            self.retained.insert(id.clone(), *position);
        }

        if run.ticks_done == self.config.tick_count {
            log::debug!(
                "layout generation {} settled after {} ticks",
                run.generation,
                run.ticks_done
            );
        }

        Some((Self::position_map(run), forces))
    }

    fn position_map(run: &Run) -> PositionMap {
        run.ids
            .iter()
            .cloned()
            .zip(run.positions.iter().copied())
            .collect()
    }

    /// Positions of the current run's notes. Empty when idle.
    pub fn positions(&self) -> PositionMap {
        self.run.as_ref().map(Self::position_map).unwrap_or_default()
    }

    /// Last known position of every note laid out and not forgotten since.
    pub fn retained(&self) -> &HashMap<NoteId, Point> {
        &self.retained
    }

    /// Drop the retained position of a deleted note. A note still in the
    /// current run keeps moving and is retained again on the next tick.
    pub fn forget(&mut self, id: &NoteId) -> Option<Point> {
        self.retained.remove(id)
    }

    /// Drop retained positions of every note not in `notes`.
    pub fn retain_only(&mut self, notes: &[Note]) {
        let keep: HashSet<&NoteId> = notes.iter().map(|note| &note.id).collect();
        let before = self.retained.len();
        self.retained.retain(|id, _| keep.contains(id));
        log::debug!("forgot {} retained positions", before - self.retained.len());
    }

    /// Ticks completed in the current run.
    pub fn ticks_done(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.ticks_done)
    }

    /// Whether a run exists, is current, and has ticks left.
    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| {
            run.generation == self.generation() && run.ticks_done < self.config.tick_count
        })
    }

    /// Pairs of current notes similar enough to draw a connection.
    pub fn edges(&self) -> Vec<Edge> {
        self.run
            .as_ref()
            .map(|run| similarity_edges(&run.ids, &run.similarities, self.thresholds.display))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::Category;

    fn note(id: &str, category: Category) -> Note {
        let mut note = Note::new(category);
        note.id = id.into();
        note
    }

    fn engine(tick_count: usize) -> LayoutEngine {
        let config = LayoutConfig {
            tick_count,
            ..Default::default()
        };
        LayoutEngine::with_seed(config, SimilarityThresholds::real(), 7)
    }

    const CANVAS: Canvas = Canvas::new(400.0, 400.0);

    #[test]
    fn test_empty_note_set_is_idle() {
        let mut engine = engine(10);

        engine.restart(&[], CANVAS);

        assert!(engine.positions().is_empty());
        assert!(engine.tick().is_none());
        assert!(!engine.is_running());
        assert_eq!(engine.ticks_done(), 0);
    }

    #[test]
    fn test_seed_near_category_anchor() {
        let mut engine = engine(10);
        let notes = vec![note("m", Category::Meeting), note("t", Category::Travel)];

        engine.restart(&notes, CANVAS);
        let positions = engine.positions();

        for n in &notes {
            let anchor = category_anchor(n.category, &CANVAS, 0.7);
            let p = positions[&n.id];
            assert!((p.x - anchor.x).abs() <= 20.0 + 1e-9);
            assert!((p.y - anchor.y).abs() <= 20.0 + 1e-9);
        }
    }

    #[test]
    fn test_runs_exactly_tick_count_ticks() {
        let mut engine = engine(5);
        engine.restart(&[note("a", Category::Idea), note("b", Category::Idea)], CANVAS);

        let mut ticks = 0;
        while engine.tick().is_some() {
            ticks += 1;
        }

        assert_eq!(ticks, 5);
        assert_eq!(engine.ticks_done(), 5);
        assert!(!engine.is_running());
        // final state holds
        assert_eq!(engine.positions().len(), 2);
    }

    #[test]
    fn test_restart_keeps_settled_positions() {
        let mut engine = engine(20);
        let first = vec![note("a", Category::Task), note("b", Category::Diary)];
        engine.restart(&first, CANVAS);
        while engine.tick().is_some() {}
        let settled = engine.positions();

        let mut second = first.clone();
        second.push(note("c", Category::Email));
        engine.restart(&second, CANVAS);
        let reseeded = engine.positions();

        assert_eq!(reseeded[&NoteId::from("a")], settled[&NoteId::from("a")]);
        assert_eq!(reseeded[&NoteId::from("b")], settled[&NoteId::from("b")]);
        assert!(reseeded.contains_key(&NoteId::from("c")));
        assert!(engine.is_running());
    }

    #[test]
    fn test_removed_notes_leave_the_emitted_map() {
        let mut engine = engine(3);
        engine.restart(&[note("a", Category::Task), note("b", Category::Task)], CANVAS);
        engine.tick();

        engine.restart(&[note("a", Category::Task)], CANVAS);

        let positions = engine.positions();
        assert_eq!(positions.len(), 1);
        assert!(engine.retained().contains_key(&NoteId::from("b")));
    }

    #[test]
    fn test_cancel_discards_run_but_keeps_positions() {
        let mut engine = engine(50);
        engine.restart(&[note("a", Category::Idea), note("b", Category::Idea)], CANVAS);
        engine.tick();
        let after_one = engine.tick().unwrap();

        engine.handle().cancel();

        assert!(engine.tick().is_none());
        assert!(!engine.is_running());
        assert_eq!(engine.retained()[&NoteId::from("a")], after_one[&NoteId::from("a")]);

        // a later restart picks the positions up again
        engine.restart(&[note("a", Category::Idea)], CANVAS);
        assert_eq!(engine.positions()[&NoteId::from("a")], after_one[&NoteId::from("a")]);
    }

    #[test]
    fn test_forget_evicts_deleted_notes() {
        let mut engine = engine(3);
        let notes = vec![
            note("a", Category::Task),
            note("b", Category::Task),
            note("c", Category::Idea),
        ];
        engine.restart(&notes, CANVAS);
        while engine.tick().is_some() {}
        let settled_a = engine.positions()[&NoteId::from("a")];
        let settled_b = engine.retained()[&NoteId::from("b")];

        assert_eq!(engine.forget(&NoteId::from("a")), Some(settled_a));
        assert!(engine.forget(&NoteId::from("missing")).is_none());
        engine.retain_only(&notes[1..2]);

        assert_eq!(engine.retained().len(), 1);
        assert_eq!(engine.retained()[&NoteId::from("b")], settled_b);
    }

    #[test]
    fn test_tick_for_stale_generation() {
        let mut engine = engine(10);
        let old = engine.restart(&[note("a", Category::Idea)], CANVAS);
        let new = engine.restart(&[note("a", Category::Idea)], CANVAS);

        assert!(engine.tick_for(old).is_none());
        assert!(engine.tick_for(new).is_some());
        assert_eq!(engine.ticks_done(), 1);
    }

    #[test]
    fn test_same_seed_same_layout() {
        let notes = vec![
            note("a", Category::Idea),
            note("b", Category::Task),
            note("c", Category::Idea),
        ];
        let run = |seed| {
            let mut engine =
                LayoutEngine::with_seed(LayoutConfig::default(), SimilarityThresholds::real(), seed);
            engine.restart(&notes, CANVAS);
            while engine.tick().is_some() {}
            engine.positions()
        };

        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_retained_positions_clamped_into_smaller_canvas() {
        let mut engine = engine(10);
        let notes = vec![note("a", Category::Travel)];
        engine.restart(&notes, Canvas::new(1000.0, 1000.0));
        while engine.tick().is_some() {}

        let small = Canvas::new(200.0, 200.0);
        engine.restart(&notes, small);
        let p = engine.positions()[&NoteId::from("a")];

        assert!(p.x >= 40.0 && p.x <= 160.0);
        assert!(p.y >= 40.0 && p.y <= 160.0);
    }

    #[test]
    fn test_edges_use_display_threshold() {
        let mut engine = engine(1);
        let notes = vec![
            note("a", Category::Idea).with_embedding(vec![1.0, 0.0]),
            note("b", Category::Idea).with_embedding(vec![0.9, 0.1]),
            note("c", Category::Idea).with_embedding(vec![0.6, 0.8]),
            note("d", Category::Idea),
        ];
        engine.restart(&notes, CANVAS);

        let edges = engine.edges();

        // a-b ~0.99, a-c 0.6 and b-c ~0.68 attract but are not drawn
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, NoteId::from("a"));
        assert_eq!(edges[0].to, NoteId::from("b"));
    }
}
