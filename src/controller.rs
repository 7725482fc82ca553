//! The playback controller: one facade over graph, routing, overlay,
//! quality, metrics, and recovery.
//!
//! The controller is single-threaded by design. All mutation happens on the
//! hosting thread; the two periodic duties (bus drain, progress report) are
//! cooperative ticks, either driven manually or by [`Controller::run`].
//! Only the overlay binder and the sink probe cross threads, and both are
//! restricted to their own shared state.

use crate::bus::{BusMonitor, TickOutcome};
use crate::error::{Error, Result};
use crate::graph::{DefaultNodeFactory, GraphState, NodeFactory, PipelineGraph};
use crate::metrics::{describe_metrics, MetricsSampler};
use crate::notify::{EventReceiver, EventSender, PlayerEvent};
use crate::overlay::{OverlayBinder, OverlaySurface};
use crate::position::PositionController;
use crate::quality::{QualityController, QualityProfile};
use crate::router::{PadRouter, RouteState};
use crate::format::Caps;
use std::path::Path;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::info;

static INIT: Once = Once::new();

/// One-time process setup: metric descriptions.
///
/// Safe to call from every constructor; only the first call does work.
pub fn init() {
    INIT.call_once(describe_metrics);
}

/// The play/pause toggle state, as shown to the user.
///
/// Kept separate from [`GraphState`]: recovery must be able to flip the
/// button back to "play" without consulting the graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayIndicator {
    playing: bool,
}

impl PlayIndicator {
    /// Whether the indicator reads "playing".
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Update the indicator.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }
}

/// Owns the pipeline and coordinates every playback concern.
pub struct Controller {
    graph: PipelineGraph,
    router: PadRouter,
    quality: QualityController,
    sampler: MetricsSampler,
    binder: OverlayBinder,
    monitor: BusMonitor,
    position: PositionController,
    indicator: PlayIndicator,
    notify: EventSender,
}

impl Controller {
    /// Build a controller for the given media file and render surface.
    ///
    /// The graph is constructed through `factory` and left in Null; nothing
    /// flows until [`play`](Self::play).
    pub fn construct(
        location: impl AsRef<Path>,
        surface: Arc<dyn OverlaySurface>,
        factory: &dyn NodeFactory,
    ) -> Result<Self> {
        init();

        let notify = EventSender::default();
        let mut graph = PipelineGraph::build(factory)?;
        graph.set_source(location.as_ref());

        let attachment = graph
            .video_overlay()
            .ok_or_else(|| Error::UnknownNode("video-sink".to_string()))?;
        let binder = OverlayBinder::new(surface, attachment);

        let sampler = MetricsSampler::new(notify.clone());
        graph.attach_probe(sampler.probe());

        info!(location = %location.as_ref().display(), "controller constructed");
        Ok(Self {
            graph,
            router: PadRouter::new(),
            quality: QualityController::new(),
            sampler,
            binder,
            monitor: BusMonitor::new(notify.clone()),
            position: PositionController::new(notify.clone()),
            indicator: PlayIndicator::default(),
            notify,
        })
    }

    /// Build a controller with the platform-default node factory.
    pub fn with_default_factory(
        location: impl AsRef<Path>,
        surface: Arc<dyn OverlaySurface>,
    ) -> Result<Self> {
        Self::construct(location, surface, &DefaultNodeFactory::new())
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Start (or resume) playback.
    pub fn play(&mut self) {
        let from = self.graph.set_state(GraphState::Playing);
        self.indicator.set_playing(true);
        if from != GraphState::Playing {
            self.sampler.on_playing();
            self.notify.send(PlayerEvent::StateChanged {
                from,
                to: GraphState::Playing,
            });
        }
    }

    /// Pause playback, keeping the graph prerolled.
    pub fn pause(&mut self) {
        let from = self.graph.set_state(GraphState::Paused);
        self.indicator.set_playing(false);
        if from != GraphState::Paused {
            self.notify.send(PlayerEvent::StateChanged {
                from,
                to: GraphState::Paused,
            });
        }
    }

    /// Flip between play and pause. Returns whether playback is now active.
    pub fn toggle(&mut self) -> bool {
        if self.indicator.is_playing() {
            self.pause();
        } else {
            self.play();
        }
        self.indicator.is_playing()
    }

    /// Stop playback, returning the graph to Ready.
    pub fn stop(&mut self) {
        let from = self.graph.set_state(GraphState::Ready);
        self.indicator.set_playing(false);
        if from != GraphState::Ready {
            self.notify.send(PlayerEvent::StateChanged {
                from,
                to: GraphState::Ready,
            });
        }
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, target: Duration) {
        self.position.seek(&mut self.graph, &self.sampler, target);
    }

    /// Current playback position.
    pub fn position(&self) -> Duration {
        self.graph.position()
    }

    /// Total duration, once known.
    pub fn duration(&self) -> Option<Duration> {
        self.graph.duration()
    }

    /// Whether the play indicator reads "playing".
    pub fn is_playing(&self) -> bool {
        self.indicator.is_playing()
    }

    /// The graph's current state.
    pub fn state(&self) -> GraphState {
        self.graph.state()
    }

    // ------------------------------------------------------------------
    // Quality
    // ------------------------------------------------------------------

    /// Apply a resolution cap, or clear it with `None`.
    ///
    /// The swap runs through a pause/resume cycle; when playback was active
    /// the resume counts as a fresh Playing entry for the metrics sampler.
    pub fn set_quality(&mut self, profile: Option<QualityProfile>) {
        let was_playing = self.graph.state() == GraphState::Playing;
        let changed = match profile {
            Some(profile) => self.quality.apply(&mut self.graph, profile),
            None => self.quality.clear(&mut self.graph),
        };
        if changed && was_playing {
            self.sampler.on_playing();
        }
    }

    /// The active quality profile, if any.
    pub fn quality(&self) -> Option<QualityProfile> {
        self.quality.active()
    }

    // ------------------------------------------------------------------
    // Stream discovery and overlay
    // ------------------------------------------------------------------

    /// Route a newly discovered demultiplexer stream.
    pub fn pad_added(&mut self, pad_name: &str, caps: &Caps) -> RouteState {
        self.router.pad_added(&mut self.graph, pad_name, caps)
    }

    /// The routing state machine, for inspection.
    pub fn router(&self) -> &PadRouter {
        &self.router
    }

    /// A binder clone for the sink's prepare-window and the host's resize
    /// notifications.
    pub fn overlay_binder(&self) -> OverlayBinder {
        self.binder.clone()
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Subscribe to player notifications.
    pub fn subscribe(&self) -> EventReceiver {
        self.notify.subscribe()
    }

    /// The metrics sampler, for inspection.
    pub fn sampler(&self) -> &MetricsSampler {
        &self.sampler
    }

    /// The underlying graph, for inspection.
    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Mutable access to the underlying graph.
    ///
    /// Exists for embedders that simulate pipeline activity (posting bus
    /// events, delivering frames); normal playback control goes through the
    /// controller surface.
    pub fn graph_mut(&mut self) -> &mut PipelineGraph {
        &mut self.graph
    }

    // ------------------------------------------------------------------
    // Periodic duties
    // ------------------------------------------------------------------

    /// Drain the bus once and apply any recovery.
    pub fn bus_tick(&mut self) -> TickOutcome {
        self.monitor.tick(&mut self.graph, &mut self.indicator)
    }

    /// Report progress once.
    pub fn position_tick(&mut self) -> Option<PlayerEvent> {
        self.position.tick(&self.graph)
    }

    /// Drive both periodic duties until playback stops.
    ///
    /// Returns after the first bus-driven stop (end of stream or recovered
    /// error). The controller stays usable; call [`play`](Self::play) to go
    /// again.
    pub async fn run(&mut self) -> TickOutcome {
        let mut bus_interval = tokio::time::interval(BusMonitor::TICK);
        let mut position_interval = tokio::time::interval(PositionController::TICK);
        loop {
            tokio::select! {
                _ = bus_interval.tick() => {
                    let outcome = self.bus_tick();
                    if outcome.stopped {
                        return outcome;
                    }
                }
                _ = position_interval.tick() => {
                    self.position_tick();
                }
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        // The graph's own Drop tears down, but going through Ready first
        // keeps the state-change notification symmetric with stop().
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusEvent;
    use crate::overlay::{OverlaySurface, Rect};

    struct FixedSurface;

    impl OverlaySurface for FixedSurface {
        fn handle(&self) -> Option<usize> {
            Some(0x4000)
        }

        fn rectangle(&self) -> Rect {
            Rect::with_size(640, 360)
        }
    }

    fn controller() -> Controller {
        Controller::with_default_factory("/media/movie.mp4", Arc::new(FixedSurface)).unwrap()
    }

    #[test]
    fn test_construct_leaves_graph_null() {
        let c = controller();
        assert_eq!(c.state(), GraphState::Null);
        assert!(!c.is_playing());
        assert_eq!(
            c.graph().source_location(),
            Some(Path::new("/media/movie.mp4"))
        );
        // The sampler's probe is already on the sink
        assert!(c.graph().node("video-sink").unwrap().has_probe());
    }

    #[test]
    fn test_play_pause_toggle() {
        let mut c = controller();

        assert!(c.toggle());
        assert_eq!(c.state(), GraphState::Playing);

        assert!(!c.toggle());
        assert_eq!(c.state(), GraphState::Paused);

        assert!(c.toggle());
        assert_eq!(c.state(), GraphState::Playing);
    }

    #[test]
    fn test_state_change_notifications() {
        let mut c = controller();
        let mut receiver = c.subscribe();

        c.play();
        c.play();
        c.pause();

        assert!(matches!(
            receiver.try_recv(),
            Some(PlayerEvent::StateChanged {
                from: GraphState::Null,
                to: GraphState::Playing,
            })
        ));
        // The redundant play() produced nothing
        assert!(matches!(
            receiver.try_recv(),
            Some(PlayerEvent::StateChanged {
                to: GraphState::Paused,
                ..
            })
        ));
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn test_bus_error_recovery_resets_indicator() {
        let mut c = controller();
        c.play();
        assert!(c.is_playing());

        c.graph_mut().post(BusEvent::Error {
            message: "decoder choked".to_string(),
        });
        let outcome = c.bus_tick();

        assert!(outcome.stopped);
        assert_eq!(c.state(), GraphState::Ready);
        assert!(!c.is_playing());

        // Still usable: play again from Ready
        c.play();
        assert_eq!(c.state(), GraphState::Playing);
    }

    #[test]
    fn test_quality_through_controller() {
        let mut c = controller();
        c.play();

        c.set_quality(Some(QualityProfile::HD));
        assert_eq!(c.quality(), Some(QualityProfile::HD));
        assert!(!c
            .graph()
            .filter_restriction()
            .unwrap()
            .is_pass_through());

        c.set_quality(None);
        assert!(c.quality().is_none());
        assert!(c.graph().filter_restriction().unwrap().is_pass_through());
        assert_eq!(c.state(), GraphState::Playing);
    }

    #[test]
    fn test_pad_routing_through_controller() {
        let mut c = controller();
        assert_eq!(
            c.pad_added("video_0", &Caps::video(1920, 1080)),
            RouteState::Linked
        );
        assert_eq!(c.pad_added("audio_0", &Caps::audio()), RouteState::Linked);
        assert_eq!(c.router().discovered(), 2);
    }

    #[test]
    fn test_overlay_binder_binds_fixed_surface() {
        let c = controller();
        let binder = c.overlay_binder();
        assert!(binder.handle_prepare_window());

        let attachment = c.graph().video_overlay().unwrap();
        let attachment = attachment.lock().unwrap();
        assert_eq!(attachment.handle(), Some(0x4000));
        assert_eq!(attachment.rect(), Rect::with_size(640, 360));
    }

    #[test]
    fn test_seek_updates_position_and_resets_window() {
        let mut c = controller();
        c.play();
        c.graph_mut().set_duration(Duration::from_secs(300));

        // Simulate a few rendered frames
        for pts in [0u64, 33, 66] {
            c.graph().deliver_video_frame(Some(pts));
        }
        assert_eq!(c.sampler().window_len(), 2);

        c.seek(Duration::from_secs(120));
        assert_eq!(c.position(), Duration::from_secs(120));
        assert_eq!(c.sampler().window_len(), 0);
    }

    #[test]
    fn test_ttff_measured_from_play() {
        let mut c = controller();
        let mut receiver = c.subscribe();
        c.play();

        c.graph().deliver_video_frame(Some(0));
        c.graph().deliver_video_frame(Some(33));

        assert!(c.sampler().ttff_recorded());
        let mut saw_ttff = false;
        while let Some(event) = receiver.try_recv() {
            if matches!(event, PlayerEvent::TimeToFirstFrame { .. }) {
                assert!(!saw_ttff);
                saw_ttff = true;
            }
        }
        assert!(saw_ttff);
    }

    #[tokio::test]
    async fn test_run_stops_on_eos() {
        let mut c = controller();
        c.play();
        c.graph_mut().post(BusEvent::EndOfStream);

        let outcome = c.run().await;
        assert!(outcome.stopped);
        assert_eq!(c.state(), GraphState::Ready);
        assert!(!c.is_playing());
    }
}
