//! # playgraph
//!
//! A media playback pipeline controller: a typed processing graph driven
//! through the classic Null/Ready/Paused/Playing ladder, with dynamic
//! stream routing, native overlay binding, runtime quality control, and
//! playback metrics.
//!
//! The pipeline is a directed acyclic graph of role-tagged nodes
//! (source, demultiplexer, per-branch decode chains, sinks). The static
//! skeleton is built once through a [`graph::NodeFactory`]; the
//! [`router::PadRouter`] completes the topology at runtime as the
//! demultiplexer discovers elementary streams, classifying each one by its
//! capability set and linking it into the video or audio branch (through
//! the decrypt node for common-encryption content).
//!
//! [`controller::Controller`] is the embedding surface: transport
//! (play/pause/seek), quality profiles, overlay handoff, and two periodic
//! cooperative duties (bus draining for error/end-of-stream recovery, and
//! progress reporting).
//!
//! ## Example
//!
//! ```rust,no_run
//! use playgraph::controller::Controller;
//! use playgraph::format::Caps;
//! use playgraph::overlay::{OverlaySurface, Rect};
//! use std::sync::Arc;
//!
//! struct Window;
//!
//! impl OverlaySurface for Window {
//!     fn handle(&self) -> Option<usize> {
//!         Some(0x5000)
//!     }
//!     fn rectangle(&self) -> Rect {
//!         Rect::with_size(1280, 720)
//!     }
//! }
//!
//! # fn main() -> playgraph::Result<()> {
//! let mut player = Controller::with_default_factory("/media/movie.mp4", Arc::new(Window))?;
//! let mut events = player.subscribe();
//!
//! player.pad_added("video_0", &Caps::video(1920, 1080));
//! player.pad_added("audio_0", &Caps::audio());
//! player.play();
//!
//! while let Some(event) = events.try_recv() {
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod controller;
pub mod error;
pub mod format;
pub mod graph;
pub mod metrics;
pub mod notify;
pub mod overlay;
pub mod position;
pub mod quality;
pub mod router;

pub use controller::Controller;
pub use error::{Error, Result};

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::bus::{Bus, BusEvent, BusMonitor};
    pub use crate::controller::{Controller, PlayIndicator};
    pub use crate::error::{Error, Result};
    pub use crate::format::{Branch, Caps, CapsValue, SizeRestriction, StreamClass};
    pub use crate::graph::{
        DefaultNodeFactory, GraphState, NodeFactory, NodeRole, PipelineGraph, VideoSinkKind,
    };
    pub use crate::metrics::MetricsSampler;
    pub use crate::notify::{EventReceiver, EventSender, PlayerEvent};
    pub use crate::overlay::{OverlayBinder, OverlaySurface, Rect};
    pub use crate::position::PositionController;
    pub use crate::quality::{QualityController, QualityProfile};
    pub use crate::router::{PadRouter, RouteState};
}
