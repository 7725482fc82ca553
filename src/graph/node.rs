//! Typed processing nodes.
//!
//! Nodes are owned exclusively by the pipeline graph. Each node carries a
//! role tag, role-specific state, and its pads. Endpoints are created and
//! destroyed by their owning node; demultiplexer producer pads appear
//! dynamically as streams are discovered.

use crate::format::SizeRestriction;
use crate::graph::pad::{Pad, PadDirection};
use crate::metrics::FrameProbe;
use crate::overlay::SharedAttachment;
use std::path::{Path, PathBuf};

/// Role tag of a processing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Origin of the container stream (configured with a path).
    Source,
    /// Splits the container into elementary streams at runtime.
    Demultiplexer,
    /// Decouples a branch from the demultiplexer's execution context.
    Queue,
    /// Converts raw frames/samples between formats.
    Converter,
    /// Scales video / resamples audio.
    Scaler,
    /// Imposes a capability restriction on its branch.
    CapabilityFilter,
    /// Decrypts common-encryption content using externally provisioned keys.
    Decrypt,
    /// Renders video into the bound overlay surface.
    VideoSink,
    /// Renders audio.
    AudioSink,
}

/// Which flavor of video sink the platform gets.
///
/// Mirrors the platform fallback chain of the original overlay sinks, with
/// an environment override for troubleshooting (see
/// [`crate::graph::factory`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoSinkKind {
    /// Wayland subsurface sink.
    Wayland,
    /// X11 XImage sink.
    XImage,
    /// Direct3D 11 sink.
    D3d11,
    /// Let the platform pick.
    #[default]
    Auto,
}

/// Role-specific node state.
#[derive(Debug)]
pub enum NodeKind {
    /// Source state.
    Source {
        /// Local path of the container file (a native path, not a URI).
        location: Option<PathBuf>,
    },
    /// Demultiplexer state (dynamic producer pads only).
    Demultiplexer,
    /// Queue state.
    Queue,
    /// Converter state.
    Converter,
    /// Scaler state.
    Scaler {
        /// Renegotiation requests received from the quality controller.
        renegotiation_requests: u64,
    },
    /// Capability-filter state.
    CapabilityFilter {
        /// Active restriction; pass-through when unrestricted.
        restriction: SizeRestriction,
    },
    /// Decrypt state. Key material is provisioned externally and addressed
    /// by the stream's key identifier; this node does not manage storage.
    Decrypt,
    /// Video sink state.
    VideoSink {
        /// Sink flavor chosen at creation.
        sink_kind: VideoSinkKind,
        /// Overlay attachment shared with the binder.
        overlay: SharedAttachment,
        /// Buffer probe attached by the metrics sampler, if any.
        probe: Option<FrameProbe>,
    },
    /// Audio sink state.
    AudioSink,
}

impl NodeKind {
    /// The role tag this state belongs to.
    pub fn role(&self) -> NodeRole {
        match self {
            Self::Source { .. } => NodeRole::Source,
            Self::Demultiplexer => NodeRole::Demultiplexer,
            Self::Queue => NodeRole::Queue,
            Self::Converter => NodeRole::Converter,
            Self::Scaler { .. } => NodeRole::Scaler,
            Self::CapabilityFilter { .. } => NodeRole::CapabilityFilter,
            Self::Decrypt => NodeRole::Decrypt,
            Self::VideoSink { .. } => NodeRole::VideoSink,
            Self::AudioSink => NodeRole::AudioSink,
        }
    }
}

/// A node in the pipeline graph.
pub struct Node {
    name: String,
    kind: NodeKind,
    input_pads: Vec<Pad>,
    output_pads: Vec<Pad>,
}

impl Node {
    /// Create a node with the default pads for its role.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let (input_pads, output_pads) = match kind.role() {
            NodeRole::Source => (vec![], vec![Pad::src()]),
            // Demuxer producers are created dynamically on discovery
            NodeRole::Demultiplexer => (vec![Pad::sink()], vec![]),
            NodeRole::Queue
            | NodeRole::Converter
            | NodeRole::Scaler
            | NodeRole::CapabilityFilter
            | NodeRole::Decrypt => (vec![Pad::sink()], vec![Pad::src()]),
            NodeRole::VideoSink | NodeRole::AudioSink => (vec![Pad::sink()], vec![]),
        };

        Self {
            name: name.into(),
            kind,
            input_pads,
            output_pads,
        }
    }

    /// Get the node's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the node's role.
    pub fn role(&self) -> NodeRole {
        self.kind.role()
    }

    /// Get the input pads.
    pub fn input_pads(&self) -> &[Pad] {
        &self.input_pads
    }

    /// Get the output pads.
    pub fn output_pads(&self) -> &[Pad] {
        &self.output_pads
    }

    /// Get an input pad by name.
    pub fn input_pad(&self, name: &str) -> Option<&Pad> {
        self.input_pads.iter().find(|p| p.name() == name)
    }

    /// Get a mutable input pad by name.
    pub fn input_pad_mut(&mut self, name: &str) -> Option<&mut Pad> {
        self.input_pads.iter_mut().find(|p| p.name() == name)
    }

    /// Get an output pad by name.
    pub fn output_pad(&self, name: &str) -> Option<&Pad> {
        self.output_pads.iter().find(|p| p.name() == name)
    }

    /// Get a mutable output pad by name.
    pub fn output_pad_mut(&mut self, name: &str) -> Option<&mut Pad> {
        self.output_pads.iter_mut().find(|p| p.name() == name)
    }

    /// Add a dynamically discovered producer pad (demultiplexer only).
    ///
    /// Idempotent: a pad with the same name is left untouched.
    pub fn add_output_pad(&mut self, pad: Pad) {
        debug_assert_eq!(pad.direction(), PadDirection::Producer);
        if self.output_pad(pad.name()).is_none() {
            self.output_pads.push(pad);
        }
    }

    // ------------------------------------------------------------------
    // Role-specific accessors
    // ------------------------------------------------------------------

    /// Configure the source location. No-op for other roles.
    pub fn set_location(&mut self, path: impl Into<PathBuf>) {
        if let NodeKind::Source { location } = &mut self.kind {
            *location = Some(path.into());
        }
    }

    /// The configured source location, if this is a source node.
    pub fn location(&self) -> Option<&Path> {
        match &self.kind {
            NodeKind::Source { location } => location.as_deref(),
            _ => None,
        }
    }

    /// The active capability restriction, if this is a filter node.
    pub fn restriction(&self) -> Option<&SizeRestriction> {
        match &self.kind {
            NodeKind::CapabilityFilter { restriction } => Some(restriction),
            _ => None,
        }
    }

    /// Replace the capability restriction. No-op for other roles.
    pub fn set_restriction(&mut self, new: SizeRestriction) {
        if let NodeKind::CapabilityFilter { restriction } = &mut self.kind {
            *restriction = new;
        }
    }

    /// Ask the scaler to renegotiate downstream. No-op for other roles.
    pub fn request_renegotiation(&mut self) {
        if let NodeKind::Scaler {
            renegotiation_requests,
        } = &mut self.kind
        {
            *renegotiation_requests += 1;
        }
    }

    /// Renegotiation requests seen by this scaler.
    pub fn renegotiation_requests(&self) -> u64 {
        match &self.kind {
            NodeKind::Scaler {
                renegotiation_requests,
            } => *renegotiation_requests,
            _ => 0,
        }
    }

    /// The overlay attachment shared with the binder (video sink only).
    pub fn overlay(&self) -> Option<SharedAttachment> {
        match &self.kind {
            NodeKind::VideoSink { overlay, .. } => Some(overlay.clone()),
            _ => None,
        }
    }

    /// The video sink flavor, if this is a video sink.
    pub fn video_sink_kind(&self) -> Option<VideoSinkKind> {
        match &self.kind {
            NodeKind::VideoSink { sink_kind, .. } => Some(*sink_kind),
            _ => None,
        }
    }

    /// Attach a buffer probe to the video sink's consumer endpoint.
    ///
    /// Idempotent: returns `false` (and keeps the existing probe) when one
    /// is already attached or this is not a video sink.
    pub fn set_probe(&mut self, new: FrameProbe) -> bool {
        match &mut self.kind {
            NodeKind::VideoSink { probe, .. } => {
                if probe.is_some() {
                    return false;
                }
                *probe = Some(new);
                true
            }
            _ => false,
        }
    }

    /// Whether a buffer probe is attached.
    pub fn has_probe(&self) -> bool {
        matches!(
            &self.kind,
            NodeKind::VideoSink {
                probe: Some(_),
                ..
            }
        )
    }

    /// Deliver a rendered buffer's presentation timestamp to the probe.
    ///
    /// Called from the sink's execution context; the probe only touches its
    /// own shared state.
    pub fn observe_frame(&self, pts_ms: Option<u64>) {
        if let NodeKind::VideoSink {
            probe: Some(probe), ..
        } = &self.kind
        {
            probe.observe(pts_ms);
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("role", &self.role())
            .field("input_pads", &self.input_pads.len())
            .field("output_pads", &self.output_pads.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Caps;
    use crate::overlay::OverlayAttachment;
    use std::sync::{Arc, Mutex};

    fn video_sink() -> Node {
        Node::new(
            "video-sink",
            NodeKind::VideoSink {
                sink_kind: VideoSinkKind::Auto,
                overlay: Arc::new(Mutex::new(OverlayAttachment::default())),
                probe: None,
            },
        )
    }

    #[test]
    fn test_default_pads_per_role() {
        let src = Node::new("src", NodeKind::Source { location: None });
        assert_eq!(src.input_pads().len(), 0);
        assert_eq!(src.output_pads().len(), 1);

        let demux = Node::new("demux", NodeKind::Demultiplexer);
        assert_eq!(demux.input_pads().len(), 1);
        assert_eq!(demux.output_pads().len(), 0);

        let queue = Node::new("q", NodeKind::Queue);
        assert_eq!(queue.input_pads().len(), 1);
        assert_eq!(queue.output_pads().len(), 1);

        let sink = video_sink();
        assert_eq!(sink.input_pads().len(), 1);
        assert_eq!(sink.output_pads().len(), 0);
    }

    #[test]
    fn test_dynamic_output_pad_idempotent() {
        let mut demux = Node::new("demux", NodeKind::Demultiplexer);
        demux.add_output_pad(Pad::producer_with_caps("video_0", Caps::video(640, 360)));
        demux.add_output_pad(Pad::producer_with_caps("video_0", Caps::video(640, 360)));
        assert_eq!(demux.output_pads().len(), 1);
    }

    #[test]
    fn test_source_location() {
        let mut src = Node::new("src", NodeKind::Source { location: None });
        assert!(src.location().is_none());
        src.set_location("/media/movie.mp4");
        assert_eq!(src.location(), Some(Path::new("/media/movie.mp4")));

        // No-op on a non-source node
        let mut queue = Node::new("q", NodeKind::Queue);
        queue.set_location("/ignored");
        assert!(queue.location().is_none());
    }

    #[test]
    fn test_filter_restriction() {
        let mut filter = Node::new(
            "filter",
            NodeKind::CapabilityFilter {
                restriction: SizeRestriction::any(),
            },
        );
        assert!(filter.restriction().unwrap().is_pass_through());
        filter.set_restriction(SizeRestriction::clamp(640, 360));
        assert!(!filter.restriction().unwrap().is_pass_through());
    }

    #[test]
    fn test_scaler_renegotiation_counter() {
        let mut scaler = Node::new(
            "scaler",
            NodeKind::Scaler {
                renegotiation_requests: 0,
            },
        );
        scaler.request_renegotiation();
        scaler.request_renegotiation();
        assert_eq!(scaler.renegotiation_requests(), 2);
    }
}
