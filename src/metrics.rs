//! Playback metrics: time-to-first-frame and frame-interval percentiles.
//!
//! A [`FrameProbe`] hangs off the video sink's consumer endpoint and sees
//! every rendered buffer's presentation timestamp. The probe runs on the
//! sink's execution context, so it only mutates its own shared state and
//! never touches the graph.
//!
//! Interval tracking is a bounded window of positive presentation-timestamp
//! deltas. Percentiles use the nearest-rank definition over an independent
//! copy of the window, so a query never reorders the samples it summarizes.

use crate::notify::{EventSender, PlayerEvent};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// Percentiles are recomputed and reported every this many recorded deltas.
pub const PERCENTILE_BATCH: usize = 60;
/// Maximum deltas retained in the interval window.
pub const WINDOW_MAX: usize = 1200;
/// Oldest deltas dropped when the window overflows.
pub const WINDOW_TRIM: usize = 200;

/// Metric name: milliseconds from entering Playing to the first rendered frame.
pub(crate) const TIME_TO_FIRST_FRAME_MS: &str = "playgraph_time_to_first_frame_ms";
/// Metric name: per-frame presentation-timestamp delta.
pub(crate) const FRAME_INTERVAL_MS: &str = "playgraph_frame_interval_ms";
/// Metric name: rendered video frames observed by the probe.
pub(crate) const FRAMES_TOTAL: &str = "playgraph_frames_total";

/// Register metric descriptions with the installed recorder.
///
/// Call once at startup; calling again is harmless but redundant.
pub fn describe_metrics() {
    describe_histogram!(
        TIME_TO_FIRST_FRAME_MS,
        Unit::Milliseconds,
        "Delay between entering Playing and the first rendered video frame"
    );
    describe_histogram!(
        FRAME_INTERVAL_MS,
        Unit::Milliseconds,
        "Presentation-timestamp delta between consecutive rendered frames"
    );
    describe_counter!(
        FRAMES_TOTAL,
        Unit::Count,
        "Rendered video frames observed by the sink probe"
    );
    describe_counter!(
        crate::bus::RECOVERIES_TOTAL,
        Unit::Count,
        "Error/end-of-stream recoveries performed by the bus monitor"
    );
    describe_counter!(
        crate::router::STREAMS_ROUTED,
        Unit::Count,
        "Streams linked into a decode branch"
    );
    describe_counter!(
        crate::router::STREAMS_IGNORED,
        Unit::Count,
        "Discovered streams left dangling"
    );
    describe_counter!(
        crate::router::STREAM_FALLBACKS,
        Unit::Count,
        "Best-effort direct-link fallbacks"
    );
}

/// Probe-side state, shared between the probe and the sampler.
#[derive(Debug, Default)]
struct SamplerState {
    /// When the graph last entered Playing, until the first frame lands.
    playing_since: Option<Instant>,
    ttff_recorded: bool,
    last_pts_ms: Option<u64>,
    deltas: VecDeque<u64>,
    since_report: usize,
    frames: u64,
}

impl SamplerState {
    /// Nearest-rank percentile over an independent copy of the window.
    fn percentile(&self, p: usize) -> u64 {
        debug_assert!(!self.deltas.is_empty());
        let mut copy: Vec<u64> = self.deltas.iter().copied().collect();
        let rank = (copy.len() * p).div_ceil(100);
        let idx = rank.saturating_sub(1);
        let (_, value, _) = copy.select_nth_unstable(idx);
        *value
    }
}

/// Buffer probe attached to the video sink's consumer endpoint.
///
/// Cloneable and cheap to call from the sink's execution context.
#[derive(Clone)]
pub struct FrameProbe {
    state: Arc<Mutex<SamplerState>>,
    notify: EventSender,
}

impl FrameProbe {
    /// Record one rendered buffer.
    ///
    /// `pts_ms` is the buffer's presentation timestamp; buffers without one
    /// still count toward time-to-first-frame but record no interval.
    pub fn observe(&self, pts_ms: Option<u64>) {
        let mut state = self.state.lock().expect("sampler lock");
        state.frames += 1;
        counter!(FRAMES_TOTAL).increment(1);

        if !state.ttff_recorded {
            if let Some(since) = state.playing_since.take() {
                let millis = since.elapsed().as_millis() as u64;
                state.ttff_recorded = true;
                histogram!(TIME_TO_FIRST_FRAME_MS).record(millis as f64);
                info!(millis, "first frame rendered");
                self.notify.send(PlayerEvent::TimeToFirstFrame { millis });
            }
        }

        let Some(pts) = pts_ms else { return };
        if let Some(last) = state.last_pts_ms {
            // Only forward motion counts; seeks reset the baseline instead.
            if pts > last {
                self.record_delta(&mut state, pts - last);
            }
        }
        state.last_pts_ms = Some(pts);
    }

    fn record_delta(&self, state: &mut SamplerState, delta: u64) {
        state.deltas.push_back(delta);
        histogram!(FRAME_INTERVAL_MS).record(delta as f64);

        if state.deltas.len() > WINDOW_MAX {
            state.deltas.drain(..WINDOW_TRIM);
            debug!(retained = state.deltas.len(), "interval window trimmed");
        }

        state.since_report += 1;
        if state.since_report >= PERCENTILE_BATCH {
            state.since_report = 0;
            let p50 = state.percentile(50);
            let p95 = state.percentile(95);
            debug!(p50, p95, samples = state.deltas.len(), "frame intervals");
            self.notify.send(PlayerEvent::FrameIntervals {
                p50,
                p95,
                samples: state.deltas.len(),
            });
        }
    }
}

impl std::fmt::Debug for FrameProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProbe").finish_non_exhaustive()
    }
}

/// Owns the interval window and the time-to-first-frame clock.
///
/// The sampler lives on the hosting thread; its probe is handed to the
/// video sink once and shares state through a mutex.
pub struct MetricsSampler {
    state: Arc<Mutex<SamplerState>>,
    notify: EventSender,
}

impl MetricsSampler {
    /// Create a sampler reporting upward through the given sender.
    pub fn new(notify: EventSender) -> Self {
        Self {
            state: Arc::new(Mutex::new(SamplerState::default())),
            notify,
        }
    }

    /// A probe sharing this sampler's state.
    pub fn probe(&self) -> FrameProbe {
        FrameProbe {
            state: self.state.clone(),
            notify: self.notify.clone(),
        }
    }

    /// Arm measurement for a fresh playback segment.
    ///
    /// Called on every transition into Playing. The whole sampler state is
    /// reset: time-to-first-frame is measured once per transition, and the
    /// interval window starts empty.
    pub fn on_playing(&self) {
        debug!("sampler reset (entering playing)");
        self.reset();
    }

    /// Reset after a flushing seek.
    ///
    /// Same full reset as a Playing transition: the timestamp jump must not
    /// leave a stale baseline, and the frame rendered after the seek marks
    /// a new first-frame latency.
    pub fn on_seek(&self) {
        debug!("sampler reset (seek)");
        self.reset();
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("sampler lock");
        *state = SamplerState {
            playing_since: Some(Instant::now()),
            ..SamplerState::default()
        };
    }

    /// Deltas currently retained in the window.
    pub fn window_len(&self) -> usize {
        self.state.lock().expect("sampler lock").deltas.len()
    }

    /// Frames observed since the last reset.
    pub fn frames(&self) -> u64 {
        self.state.lock().expect("sampler lock").frames
    }

    /// Whether time-to-first-frame has been recorded.
    pub fn ttff_recorded(&self) -> bool {
        self.state.lock().expect("sampler lock").ttff_recorded
    }

    /// Current (p50, p95) interval percentiles, if any deltas are recorded.
    pub fn percentiles(&self) -> Option<(u64, u64)> {
        let state = self.state.lock().expect("sampler lock");
        if state.deltas.is_empty() {
            return None;
        }
        Some((state.percentile(50), state.percentile(95)))
    }
}

impl std::fmt::Debug for MetricsSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsSampler")
            .field("window_len", &self.window_len())
            .finish_non_exhaustive()
    }
}
