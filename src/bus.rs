//! Pipeline message bus and the recovery state machine draining it.
//!
//! Worker threads post [`BusEvent`]s; the hosting thread drains them on a
//! fixed 10 ms tick. Recovery is "stop cleanly", never "retry": an error or
//! end-of-stream forces the graph back to Ready (not Null), keeping it
//! reusable for the next play request.

use crate::controller::PlayIndicator;
use crate::graph::{GraphState, PipelineGraph};
use crate::notify::{EventSender, PlayerEvent};
use metrics::counter;
use std::time::Duration;
use tracing::{debug, error, info};

/// Metric name: recoveries performed by the bus monitor.
pub(crate) const RECOVERIES_TOTAL: &str = "playgraph_recoveries_total";

/// A message posted on the pipeline bus.
///
/// Transient: consumed immediately by the monitor within one tick.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A runtime failure somewhere in the graph (decode, negotiation, ...).
    Error {
        /// Human-readable failure description.
        message: String,
    },
    /// All sources exhausted.
    EndOfStream,
    /// Anything else; ignored by the monitor.
    Other {
        /// Message kind, for logging.
        name: String,
    },
}

/// Producer handle for posting onto the bus from worker contexts.
pub type BusSender = kanal::Sender<BusEvent>;

/// The pipeline's message channel.
///
/// Unbounded so that worker threads never block on a slow hosting thread.
pub struct Bus {
    tx: kanal::Sender<BusEvent>,
    rx: kanal::Receiver<BusEvent>,
}

impl Bus {
    /// Create an empty bus.
    pub fn new() -> Self {
        let (tx, rx) = kanal::unbounded();
        Self { tx, rx }
    }

    /// Post an event onto the bus.
    pub fn post(&self, event: BusEvent) {
        // Receiver lives as long as the bus; a send can only fail after
        // teardown, where dropping the event is correct.
        let _ = self.tx.send(event);
    }

    /// A cloneable producer handle for worker threads.
    pub fn sender(&self) -> BusSender {
        self.tx.clone()
    }

    /// Pop the next pending event without blocking.
    pub fn try_pop(&self) -> Option<BusEvent> {
        self.rx.try_recv().ok().flatten()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one monitor tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickOutcome {
    /// Events drained this tick.
    pub drained: usize,
    /// Whether an Error or EndOfStream stopped playback this tick.
    pub stopped: bool,
}

/// Drains the bus and drives error/end-of-stream recovery.
///
/// Single-threaded, cooperative: `tick` is called from the hosting thread at
/// a fixed interval and never blocks.
pub struct BusMonitor {
    notify: EventSender,
}

impl BusMonitor {
    /// Polling interval for the bus drain tick.
    pub const TICK: Duration = Duration::from_millis(10);

    /// Create a monitor reporting upward through the given sender.
    pub fn new(notify: EventSender) -> Self {
        Self { notify }
    }

    /// Drain all pending events and apply recovery transitions.
    ///
    /// After any Error or EndOfStream the graph is never left in Playing
    /// and the play/pause indicator reads "not playing".
    pub fn tick(&self, graph: &mut PipelineGraph, indicator: &mut PlayIndicator) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        while let Some(event) = graph.bus_try_pop() {
            outcome.drained += 1;
            match event {
                BusEvent::Error { message } => {
                    error!(message = %message, "bus error, stopping playback");
                    counter!(RECOVERIES_TOTAL, "cause" => "error").increment(1);
                    graph.set_state(GraphState::Ready);
                    indicator.set_playing(false);
                    self.notify.send(PlayerEvent::Error { message });
                    outcome.stopped = true;
                }
                BusEvent::EndOfStream => {
                    info!("end of stream");
                    counter!(RECOVERIES_TOTAL, "cause" => "eos").increment(1);
                    graph.set_state(GraphState::Ready);
                    indicator.set_playing(false);
                    self.notify.send(PlayerEvent::EndOfStream);
                    outcome.stopped = true;
                }
                BusEvent::Other { name } => {
                    debug!(name = %name, "ignoring bus event");
                }
            }
        }
        outcome
    }
}
