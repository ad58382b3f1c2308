//! Async host loop for the layout engine.
//!
//! The driver owns the engine behind a mutex, ticks it on a tokio interval
//! and publishes every position map on a watch channel. Watch receivers only
//! ever see the latest map; hosts that need every tick use
//! [`LayoutDriver::stream`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{Canvas, LayoutEngine, PositionMap, SimulationHandle};
use crate::notes::Note;

/// How a driven run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub generation: u64,
    /// Ticks applied by this run
    pub ticks: usize,
    /// `false` when the run was superseded or cancelled
    pub completed: bool,
}

/// One published position map. Tick `0` is the seed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickUpdate {
    pub generation: u64,
    pub tick: usize,
    pub positions: PositionMap,
}

/// Fan-out of published maps.
struct Publisher {
    latest: watch::Sender<PositionMap>,
    streams: Mutex<Vec<mpsc::UnboundedSender<TickUpdate>>>,
}

impl Publisher {
    /// Callers hold the engine lock, which orders every publish with the
    /// restart that superseded it.
    fn publish(&self, update: TickUpdate) {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        streams.retain(|stream| stream.send(update.clone()).is_ok());
        self.latest.send_replace(update.positions);
    }
}

pub struct LayoutDriver {
    engine: Arc<Mutex<LayoutEngine>>,
    publisher: Arc<Publisher>,
    handle: SimulationHandle,
    tick_interval: Duration,
}

fn lock(engine: &Mutex<LayoutEngine>) -> MutexGuard<'_, LayoutEngine> {
    // a panicked tick leaves whole-tick state behind, still usable
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LayoutDriver {
    pub fn new(engine: LayoutEngine) -> Self {
        let tick_interval = Duration::from_millis(engine.config().tick_interval_ms);
        let handle = engine.handle();
        let (latest, _) = watch::channel(PositionMap::new());

        Self {
            engine: Arc::new(Mutex::new(engine)),
            publisher: Arc::new(Publisher {
                latest,
                streams: Mutex::new(Vec::new()),
            }),
            handle,
            tick_interval,
        }
    }

    /// Receiver of the latest position map.
    pub fn subscribe(&self) -> watch::Receiver<PositionMap> {
        self.publisher.latest.subscribe()
    }

    /// Every map published from now on, in order and without coalescing.
    pub fn stream(&self) -> mpsc::UnboundedReceiver<TickUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.publisher
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Handle that cancels whichever run is current.
    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }

    pub fn engine(&self) -> Arc<Mutex<LayoutEngine>> {
        self.engine.clone()
    }

    /// Restart the engine with `notes` and tick it in the background.
    ///
    /// The seed positions are published before this returns. Any run still
    /// in flight stops at its next tick boundary and publishes nothing after
    /// the new seed. Must be called from within a tokio runtime.
    pub fn start(&self, notes: &[Note], canvas: Canvas) -> (u64, JoinHandle<RunOutcome>) {
        let generation = {
            let mut engine = lock(&self.engine);
            let generation = engine.restart(notes, canvas);
            self.publisher.publish(TickUpdate {
                generation,
                tick: 0,
                positions: engine.positions(),
            });
            generation
        };

        let engine = self.engine.clone();
        let publisher = self.publisher.clone();
        // tokio intervals cannot be zero
        let period = self.tick_interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = 0usize;

            loop {
                interval.tick().await;

                // lock is released before the next await
                let stopped = {
                    let mut engine = lock(&engine);
                    match engine.tick_for(generation) {
                        Some(positions) => {
                            ticks += 1;
                            publisher.publish(TickUpdate {
                                generation,
                                tick: engine.ticks_done(),
                                positions,
                            });
                            None
                        }
                        None => Some(engine.generation() == generation),
                    }
                };

                if let Some(completed) = stopped {
                    log::debug!(
                        "layout run {generation} stopped after {ticks} ticks (completed: {completed})"
                    );
                    return RunOutcome {
                        generation,
                        ticks,
                        completed,
                    };
                }
            }
        });

        (generation, task)
    }

    /// Stop the current run at its next tick boundary.
    pub fn cancel(&self) {
        self.handle.cancel();
    }
}
