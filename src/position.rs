//! Playback-position reporting and seeking.
//!
//! Position is polled on a coarse 200 ms tick rather than pushed per frame;
//! progress consumers (a slider, a log line) do not need frame accuracy.
//! Seeks flush the pipeline to the nearest upstream keyframe, so the actual
//! resume point may land slightly before the requested target.

use crate::graph::{GraphState, PipelineGraph};
use crate::metrics::MetricsSampler;
use crate::notify::{EventSender, PlayerEvent};
use std::time::Duration;
use tracing::debug;

/// Emits progress events and executes seek requests.
pub struct PositionController {
    notify: EventSender,
}

impl PositionController {
    /// Polling interval for the progress tick.
    pub const TICK: Duration = Duration::from_millis(200);

    /// Create a controller reporting upward through the given sender.
    pub fn new(notify: EventSender) -> Self {
        Self { notify }
    }

    /// Report the current position.
    ///
    /// Nothing is emitted while the graph is not running or before the
    /// duration is known (the query would be meaningless mid-preroll).
    pub fn tick(&self, graph: &PipelineGraph) -> Option<PlayerEvent> {
        if !matches!(graph.state(), GraphState::Paused | GraphState::Playing) {
            return None;
        }
        let duration = graph.duration()?;
        let position = graph.position().min(duration);

        let duration_ms = duration.as_millis() as u64;
        let position_ms = position.as_millis() as u64;
        let fraction = if duration_ms == 0 {
            0.0
        } else {
            position_ms as f64 / duration_ms as f64
        };

        let event = PlayerEvent::Progress {
            position_ms,
            duration_ms,
            fraction,
        };
        self.notify.send(event.clone());
        Some(event)
    }

    /// Seek to the given position.
    ///
    /// Flushing, keyframe-aligned; the interval window is reset so the
    /// timestamp jump does not pollute the frame-interval statistics.
    pub fn seek(&self, graph: &mut PipelineGraph, sampler: &MetricsSampler, target: Duration) {
        debug!(target_ms = target.as_millis() as u64, "seek requested");
        graph.seek(target);
        sampler.on_seek();
        // Report the new position immediately instead of waiting a tick
        self.tick(graph);
    }
}
