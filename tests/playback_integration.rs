//! End-to-end tests driving the playback controller the way an embedding
//! application would: discover streams, play, observe frames, seek, recover.

use playgraph::bus::BusEvent;
use playgraph::format::Caps;
use playgraph::graph::{DefaultNodeFactory, GraphState};
use playgraph::notify::PlayerEvent;
use playgraph::overlay::{OverlaySurface, Rect};
use playgraph::quality::QualityProfile;
use playgraph::router::RouteState;
use playgraph::Controller;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A host window whose native handle appears some time after construction.
struct LazyWindow {
    handle: AtomicUsize,
    rect: Mutex<Rect>,
}

impl LazyWindow {
    fn unrealized() -> Arc<Self> {
        Arc::new(Self {
            handle: AtomicUsize::new(0),
            rect: Mutex::new(Rect::with_size(1280, 720)),
        })
    }

    fn realized(handle: usize) -> Arc<Self> {
        let window = Self::unrealized();
        window.handle.store(handle, Ordering::SeqCst);
        window
    }

    fn resize(&self, width: u32, height: u32) {
        *self.rect.lock().unwrap() = Rect::with_size(width, height);
    }
}

impl OverlaySurface for LazyWindow {
    fn handle(&self) -> Option<usize> {
        match self.handle.load(Ordering::SeqCst) {
            0 => None,
            h => Some(h),
        }
    }

    fn rectangle(&self) -> Rect {
        *self.rect.lock().unwrap()
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn player() -> Controller {
    init_tracing();
    Controller::with_default_factory("/media/movie.mp4", LazyWindow::realized(0x7000)).unwrap()
}

/// Feed `count` frames with a fixed inter-frame spacing, starting at `start`.
fn render_frames(player: &Controller, start: u64, spacing: u64, count: usize) -> u64 {
    let mut pts = start;
    for _ in 0..count {
        player.graph().deliver_video_frame(Some(pts));
        pts += spacing;
    }
    pts
}

#[test]
fn test_full_playback_session() {
    let mut player = player();
    let mut events = player.subscribe();

    // Container parsed: one video, one audio, one subtitle stream
    assert_eq!(
        player.pad_added("video_0", &Caps::video(1920, 1080)),
        RouteState::Linked
    );
    assert_eq!(player.pad_added("audio_0", &Caps::audio()), RouteState::Linked);
    assert_eq!(
        player.pad_added("sub_0", &Caps::new("text/x-srt")),
        RouteState::Ignored
    );

    player.play();
    player.graph_mut().set_duration(Duration::from_secs(600));
    assert_eq!(player.state(), GraphState::Playing);

    render_frames(&player, 0, 33, 3);
    assert!(player.sampler().ttff_recorded());

    player.graph_mut().post(BusEvent::EndOfStream);
    let outcome = player.bus_tick();
    assert!(outcome.stopped);
    assert_eq!(player.state(), GraphState::Ready);
    assert!(!player.is_playing());

    let mut saw_state_change = false;
    let mut saw_ttff = false;
    let mut saw_eos = false;
    while let Some(event) = events.try_recv() {
        match event {
            PlayerEvent::StateChanged { .. } => saw_state_change = true,
            PlayerEvent::TimeToFirstFrame { .. } => saw_ttff = true,
            PlayerEvent::EndOfStream => saw_eos = true,
            _ => {}
        }
    }
    assert!(saw_state_change && saw_ttff && saw_eos);
}

#[test]
fn test_routing_is_idempotent_across_rediscovery() {
    let mut player = player();

    player.pad_added("video_0", &Caps::video(1920, 1080));
    player.pad_added("audio_0", &Caps::audio());
    let edges = player.graph().edge_count();

    // The demultiplexer reports the same pads again (e.g. after a flush)
    player.pad_added("video_0", &Caps::video(1920, 1080));
    player.pad_added("audio_0", &Caps::audio());

    assert_eq!(player.graph().edge_count(), edges);
    assert_eq!(player.router().discovered(), 2);
}

#[test]
fn test_encrypted_content_uses_decrypt_node() {
    let mut player = player();

    assert_eq!(
        player.pad_added("video_0", &Caps::encrypted("video/x-h264")),
        RouteState::Linked
    );
    assert_eq!(
        player.pad_added("audio_0", &Caps::encrypted("audio/mpeg")),
        RouteState::Linked
    );
}

#[test]
fn test_encrypted_content_without_decrypt_degrades() {
    let mut player = Controller::construct(
        "/media/protected.mp4",
        LazyWindow::realized(0x7000),
        &DefaultNodeFactory::without_decrypt(),
    )
    .unwrap();

    let state = player.pad_added("video_0", &Caps::encrypted("video/x-h264"));
    assert_eq!(state, RouteState::FailedFallback);

    // The direct link exists; the eventual decode failure arrives by bus
    player.play();
    player.graph_mut().post(BusEvent::Error {
        message: "no decryption key".to_string(),
    });
    let outcome = player.bus_tick();
    assert!(outcome.stopped);
    assert_eq!(player.state(), GraphState::Ready);
}

#[test]
fn test_frame_interval_percentiles_reported() {
    let mut player = player();
    let mut events = player.subscribe();
    player.play();

    // 61 frames at a steady 33 ms: one full percentile batch
    render_frames(&player, 0, 33, 61);

    let mut intervals = None;
    while let Some(event) = events.try_recv() {
        if let PlayerEvent::FrameIntervals { p50, p95, samples } = event {
            intervals = Some((p50, p95, samples));
        }
    }
    let (p50, p95, samples) = intervals.expect("one percentile report");
    assert_eq!(p50, 33);
    assert_eq!(p95, 33);
    assert_eq!(samples, 60);
}

#[test]
fn test_seek_resets_interval_statistics() {
    let mut player = player();
    player.play();
    player.graph_mut().set_duration(Duration::from_secs(600));

    let pts = render_frames(&player, 0, 33, 10);
    assert_eq!(player.sampler().window_len(), 9);

    player.seek(Duration::from_secs(300));
    assert_eq!(player.position(), Duration::from_secs(300));
    assert_eq!(player.sampler().window_len(), 0);

    // The post-seek timestamp jump produces no interval sample
    player.graph().deliver_video_frame(Some(pts + 300_000));
    assert_eq!(player.sampler().window_len(), 0);
}

#[test]
fn test_quality_profile_round_trip() {
    let mut player = player();
    player.pad_added("video_0", &Caps::video(1920, 1080));
    player.play();

    let before = player.graph().filter_restriction().unwrap();
    assert!(before.is_pass_through());

    player.set_quality(Some(QualityProfile::HD));
    let clamped = player.graph().filter_restriction().unwrap();
    assert!(clamped.accepts(1280, 720));
    assert!(!clamped.accepts(1920, 1080));
    assert_eq!(player.state(), GraphState::Playing);

    player.set_quality(None);
    assert_eq!(player.graph().filter_restriction().unwrap(), before);
    assert_eq!(player.graph().scaler_renegotiations(), 2);
    assert_eq!(player.state(), GraphState::Playing);
}

#[test]
fn test_overlay_binds_late_realized_window() {
    let window = LazyWindow::unrealized();
    let player =
        Controller::with_default_factory("/media/movie.mp4", window.clone()).unwrap();
    let binder = player.overlay_binder();

    // Sink signals prepare-window before the host window realized
    assert!(!binder.handle_prepare_window());
    assert!(!player.graph().video_overlay().unwrap().lock().unwrap().is_bound());

    window.handle.store(0x9000, Ordering::SeqCst);
    assert!(binder.handle_prepare_window());

    window.resize(1920, 1080);
    binder.handle_resize();

    let attachment = player.graph().video_overlay().unwrap();
    let attachment = attachment.lock().unwrap();
    assert_eq!(attachment.handle(), Some(0x9000));
    assert_eq!(attachment.rect(), Rect::with_size(1920, 1080));
}

#[test]
fn test_progress_reporting() {
    let mut player = player();
    let mut events = player.subscribe();

    // Nothing to report before the graph runs
    assert!(player.position_tick().is_none());

    player.play();
    player.graph_mut().set_duration(Duration::from_secs(200));
    player.graph_mut().advance_position(Duration::from_secs(50));

    match player.position_tick() {
        Some(PlayerEvent::Progress {
            position_ms,
            duration_ms,
            fraction,
        }) => {
            assert_eq!(position_ms, 50_000);
            assert_eq!(duration_ms, 200_000);
            assert!((fraction - 0.25).abs() < 1e-9);
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(matches!(
        events.try_recv(),
        Some(PlayerEvent::Progress { .. })
    ));
}

#[tokio::test]
async fn test_run_loop_recovers_and_stays_reusable() {
    let mut player = player();
    player.pad_added("video_0", &Caps::video(1280, 720));
    player.play();

    let sender = player.graph().bus_sender();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = sender.send(BusEvent::Error {
            message: "mid-stream decode failure".to_string(),
        });
    });

    let outcome = player.run().await;
    assert!(outcome.stopped);
    assert_eq!(player.state(), GraphState::Ready);
    assert!(!player.is_playing());

    // Same controller plays again without rebuilding
    player.play();
    assert_eq!(player.state(), GraphState::Playing);
}

#[tokio::test]
async fn test_wait_ended_observes_eos() {
    let mut player = player();
    let mut events = player.subscribe();
    player.play();
    player.graph_mut().post(BusEvent::EndOfStream);
    player.bus_tick();

    assert_eq!(events.wait_ended().await, Ok(()));
}
