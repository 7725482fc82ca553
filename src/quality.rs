//! Runtime quality (resolution clamp) control.
//!
//! A profile caps the decoded frame size by tightening the video branch's
//! capability filter. Mutating a negotiated constraint mid-stream is not
//! safe, so every change runs the same sequence: pause, swap the filter's
//! restriction, ask the scaler to renegotiate, resume. Applying a profile
//! and then clearing it restores the exact pre-profile pass-through state.

use crate::graph::{GraphState, PipelineGraph};
use crate::format::SizeRestriction;
use tracing::{debug, info};

/// A named resolution cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    /// Profile name, for logging.
    pub name: &'static str,
    /// Maximum decoded width.
    pub max_width: u32,
    /// Maximum decoded height.
    pub max_height: u32,
}

impl QualityProfile {
    /// 1280x720 cap.
    pub const HD: Self = Self {
        name: "hd",
        max_width: 1280,
        max_height: 720,
    };

    /// 854x480 cap.
    pub const SD: Self = Self {
        name: "sd",
        max_width: 854,
        max_height: 480,
    };

    /// The restriction this profile imposes.
    pub fn restriction(&self) -> SizeRestriction {
        SizeRestriction::clamp(self.max_width, self.max_height)
    }
}

/// Applies and clears quality profiles on a running graph.
#[derive(Debug, Default)]
pub struct QualityController {
    active: Option<QualityProfile>,
}

impl QualityController {
    /// Create a controller with no active profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// The profile currently applied, if any.
    pub fn active(&self) -> Option<QualityProfile> {
        self.active
    }

    /// Apply a resolution cap.
    ///
    /// Pauses the graph for the filter swap, requests a scaler
    /// renegotiation, and restores the previous state. Re-applying the
    /// active profile is a no-op. Returns whether a swap happened.
    pub fn apply(&mut self, graph: &mut PipelineGraph, profile: QualityProfile) -> bool {
        if self.active == Some(profile) {
            debug!(profile = profile.name, "profile already active");
            return false;
        }
        info!(
            profile = profile.name,
            width = profile.max_width,
            height = profile.max_height,
            "applying quality profile"
        );
        Self::swap_restriction(graph, profile.restriction());
        self.active = Some(profile);
        true
    }

    /// Remove any active cap, restoring pass-through.
    ///
    /// Runs the same pause/renegotiate/resume sequence. No-op when nothing
    /// is applied. Returns whether a swap happened.
    pub fn clear(&mut self, graph: &mut PipelineGraph) -> bool {
        if self.active.is_none() {
            debug!("no quality profile active");
            return false;
        }
        info!("clearing quality profile");
        Self::swap_restriction(graph, SizeRestriction::any());
        self.active = None;
        true
    }

    fn swap_restriction(graph: &mut PipelineGraph, restriction: SizeRestriction) {
        let previous = graph.set_state(GraphState::Paused);
        graph.set_filter_restriction(restriction);
        graph.request_scaler_renegotiation();
        graph.set_state(previous);
    }
}
