//! The pipeline graph: owned nodes, static links, and state transitions.
//!
//! Built once at controller construction; the demultiplexer branch heads are
//! left dangling until the router completes the topology at runtime. State
//! follows Null -> Ready -> Paused -> Playing. Teardown forces Null before
//! any node is released, guaranteeing no worker thread is mid-flight when
//! resources are freed.

use crate::bus::{Bus, BusEvent, BusSender};
use crate::error::{Error, Result};
use crate::format::{Branch, Caps, SizeRestriction};
use crate::graph::factory::NodeFactory;
use crate::graph::node::{Node, NodeRole};
use crate::graph::pad::Pad;
use crate::metrics::FrameProbe;
use crate::overlay::SharedAttachment;
use daggy::{Dag, NodeIndex};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the source node.
pub const SOURCE: &str = "src";
/// Name of the demultiplexer node.
pub const DEMUX: &str = "demux";
/// Name of the decrypt node (present only when the factory supports it).
pub const DECRYPT: &str = "decrypt";

/// Video branch chain, upstream to downstream.
pub const VIDEO_CHAIN: [&str; 5] = [
    "video-queue",
    "video-convert",
    "video-scale",
    "video-filter",
    "video-sink",
];
/// Audio branch chain, upstream to downstream.
pub const AUDIO_CHAIN: [&str; 5] = [
    "audio-queue",
    "audio-convert",
    "audio-scale",
    "audio-filter",
    "audio-sink",
];

impl Branch {
    /// The branch's queue node, target of dynamic links.
    pub fn queue_name(&self) -> &'static str {
        match self {
            Branch::Video => VIDEO_CHAIN[0],
            Branch::Audio => AUDIO_CHAIN[0],
        }
    }
}

/// Unique identifier for a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) NodeIndex);

impl NodeId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// State of the pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphState {
    /// Terminal resting state; safe to release nodes.
    #[default]
    Null,
    /// Built and stopped, reusable for the next play request.
    Ready,
    /// Prerolled, not advancing.
    Paused,
    /// Decoding and rendering.
    Playing,
}

/// A static or dynamic link between two node pads.
#[derive(Debug, Clone)]
pub struct LinkEdge {
    /// Name of the producer pad.
    pub src_pad: String,
    /// Name of the consumer pad.
    pub sink_pad: String,
}

/// Result of a link attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new link was made.
    Linked,
    /// The consumer was already linked; the attempt was a no-op.
    AlreadyLinked,
}

/// The media pipeline as a directed acyclic graph of owned nodes.
pub struct PipelineGraph {
    dag: Dag<Node, LinkEdge>,
    nodes_by_name: HashMap<String, NodeId>,
    state: GraphState,
    bus: Bus,
    position: Duration,
    duration: Option<Duration>,
}

impl PipelineGraph {
    /// Build the full graph through the given factory.
    ///
    /// Creates all nodes and static links (source -> demux, and
    /// queue -> convert -> scale -> filter -> sink per branch). Fails with
    /// [`Error::NodeCreation`] if any required node cannot be created; the
    /// decrypt node is optional and skipped when unsupported.
    pub fn build(factory: &dyn NodeFactory) -> Result<Self> {
        let mut graph = Self {
            dag: Dag::new(),
            nodes_by_name: HashMap::new(),
            state: GraphState::Null,
            bus: Bus::new(),
            position: Duration::ZERO,
            duration: None,
        };

        graph.create(factory, NodeRole::Source, SOURCE)?;
        graph.create(factory, NodeRole::Demultiplexer, DEMUX)?;

        for chain in [&VIDEO_CHAIN, &AUDIO_CHAIN] {
            graph.create(factory, NodeRole::Queue, chain[0])?;
            graph.create(factory, NodeRole::Converter, chain[1])?;
            graph.create(factory, NodeRole::Scaler, chain[2])?;
            graph.create(factory, NodeRole::CapabilityFilter, chain[3])?;
        }
        graph.create(factory, NodeRole::VideoSink, VIDEO_CHAIN[4])?;
        graph.create(factory, NodeRole::AudioSink, AUDIO_CHAIN[4])?;

        if factory.supports(NodeRole::Decrypt) {
            graph.create(factory, NodeRole::Decrypt, DECRYPT)?;
        } else {
            debug!("no decrypt node available, encrypted streams will fall back");
        }

        graph.link(SOURCE, "src", DEMUX, "sink")?;
        for chain in [&VIDEO_CHAIN, &AUDIO_CHAIN] {
            for pair in chain.windows(2) {
                graph.link(pair[0], "src", pair[1], "sink")?;
            }
        }

        info!(
            nodes = graph.node_count(),
            links = graph.edge_count(),
            "pipeline graph built"
        );
        Ok(graph)
    }

    fn create(&mut self, factory: &dyn NodeFactory, role: NodeRole, name: &str) -> Result<NodeId> {
        let node = factory.create(role, name)?;
        Ok(self.add_node(node))
    }

    /// Add a node to the graph, returning its id.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let name = node.name().to_string();
        let id = NodeId(self.dag.add_node(node));
        self.nodes_by_name.insert(name, id);
        id
    }

    /// Get a node id by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes_by_name.get(name).copied()
    }

    /// Get a node by name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_id(name).and_then(|id| self.dag.node_weight(id.0))
    }

    /// Get a mutable node by name.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        let id = self.node_id(name)?;
        self.dag.node_weight_mut(id.0)
    }

    /// Whether a node with this name exists.
    pub fn has_node(&self, name: &str) -> bool {
        self.nodes_by_name.contains_key(name)
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.dag.node_count()
    }

    /// Number of links in the graph.
    pub fn edge_count(&self) -> usize {
        self.dag.edge_count()
    }

    // ------------------------------------------------------------------
    // Linking
    // ------------------------------------------------------------------

    /// Link a producer pad to a consumer pad, by node and pad name.
    ///
    /// Idempotent on the consumer side: if the consumer pad is already
    /// linked the attempt is a no-op and reports
    /// [`LinkOutcome::AlreadyLinked`]. A missing node or pad is a
    /// recoverable [`Error::Link`].
    pub fn link(
        &mut self,
        src: &str,
        src_pad: &str,
        sink: &str,
        sink_pad: &str,
    ) -> Result<LinkOutcome> {
        let link_err = |reason: &str| Error::Link {
            src: format!("{}.{}", src, src_pad),
            sink: format!("{}.{}", sink, sink_pad),
            reason: reason.to_string(),
        };

        let src_id = self.node_id(src).ok_or_else(|| link_err("no such node"))?;
        let sink_id = self.node_id(sink).ok_or_else(|| link_err("no such node"))?;

        let src_node = self.dag.node_weight(src_id.0).expect("id maps to node");
        if src_node.output_pad(src_pad).is_none() {
            return Err(link_err("no such producer pad"));
        }
        let sink_node = self.dag.node_weight(sink_id.0).expect("id maps to node");
        let pad = sink_node
            .input_pad(sink_pad)
            .ok_or_else(|| link_err("no such consumer pad"))?;

        if pad.is_linked() {
            debug!(src = %src, sink = %sink, "consumer already linked, skipping");
            return Ok(LinkOutcome::AlreadyLinked);
        }

        self.dag
            .add_edge(
                src_id.0,
                sink_id.0,
                LinkEdge {
                    src_pad: src_pad.to_string(),
                    sink_pad: sink_pad.to_string(),
                },
            )
            .map_err(|_| Error::Topology("linking would create a cycle".to_string()))?;

        if let Some(node) = self.dag.node_weight_mut(src_id.0) {
            if let Some(pad) = node.output_pad_mut(src_pad) {
                pad.mark_linked();
            }
        }
        if let Some(node) = self.dag.node_weight_mut(sink_id.0) {
            if let Some(pad) = node.input_pad_mut(sink_pad) {
                pad.mark_linked();
            }
        }
        debug!(src = %src, src_pad = %src_pad, sink = %sink, sink_pad = %sink_pad, "linked");
        Ok(LinkOutcome::Linked)
    }

    /// Materialize a dynamically discovered demuxer producer pad.
    ///
    /// Idempotent: re-discovery of the same pad name is a no-op.
    pub fn add_demux_pad(&mut self, pad_name: &str, caps: Caps) -> Result<()> {
        let demux = self
            .node_mut(DEMUX)
            .ok_or_else(|| Error::UnknownNode(DEMUX.to_string()))?;
        demux.add_output_pad(Pad::producer_with_caps(pad_name, caps));
        Ok(())
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Current graph state.
    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Request a state transition.
    ///
    /// Idempotent when already in the target state. Returns the previous
    /// state.
    pub fn set_state(&mut self, target: GraphState) -> GraphState {
        let previous = self.state;
        if previous == target {
            return previous;
        }
        info!(from = ?previous, to = ?target, "graph state change");
        self.state = target;
        previous
    }

    /// Force the terminal Null state.
    ///
    /// Must complete before any node is released; worker threads have
    /// quiesced once the transition returns. Idempotent.
    pub fn teardown(&mut self) {
        if self.state != GraphState::Null {
            self.set_state(GraphState::Null);
        }
    }

    // ------------------------------------------------------------------
    // Source, position, seeking
    // ------------------------------------------------------------------

    /// Configure the origin node with a local container path.
    ///
    /// Call before the first play request.
    pub fn set_source(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        info!(path = %path.display(), "source configured");
        if let Some(node) = self.node_mut(SOURCE) {
            node.set_location(path);
        }
    }

    /// The configured source path.
    pub fn source_location(&self) -> Option<&Path> {
        self.node(SOURCE).and_then(|n| n.location())
    }

    /// Current playback position.
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Total media duration, once known.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Record the media duration reported by the demultiplexer.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    /// Advance the playback position (worker-side progress report).
    pub fn advance_position(&mut self, delta: Duration) {
        let next = self.position + delta;
        self.position = match self.duration {
            Some(total) => next.min(total),
            None => next,
        };
    }

    /// Issue a flushing, key-unit-aligned seek.
    ///
    /// Fire-and-forget: completion is observed through later position
    /// queries or bus events.
    pub fn seek(&mut self, target: Duration) {
        let clamped = match self.duration {
            Some(total) => target.min(total),
            None => target,
        };
        info!(
            target_ms = clamped.as_millis() as u64,
            flush = true,
            key_unit = true,
            "seek requested"
        );
        self.position = clamped;
    }

    // ------------------------------------------------------------------
    // Bus
    // ------------------------------------------------------------------

    /// Post an event onto the pipeline bus.
    pub fn post(&self, event: BusEvent) {
        self.bus.post(event);
    }

    /// A producer handle for worker contexts.
    pub fn bus_sender(&self) -> BusSender {
        self.bus.sender()
    }

    /// Pop the next pending bus event without blocking.
    pub fn bus_try_pop(&self) -> Option<BusEvent> {
        self.bus.try_pop()
    }

    // ------------------------------------------------------------------
    // Video branch access
    // ------------------------------------------------------------------

    /// The overlay attachment shared with the video sink.
    pub fn video_overlay(&self) -> Option<SharedAttachment> {
        self.node(VIDEO_CHAIN[4]).and_then(|n| n.overlay())
    }

    /// Attach a buffer probe to the video sink. Idempotent.
    pub fn attach_probe(&mut self, probe: FrameProbe) -> bool {
        match self.node_mut(VIDEO_CHAIN[4]) {
            Some(node) => node.set_probe(probe),
            None => false,
        }
    }

    /// Deliver a rendered frame's presentation timestamp to the probe.
    pub fn deliver_video_frame(&self, pts_ms: Option<u64>) {
        if let Some(node) = self.node(VIDEO_CHAIN[4]) {
            node.observe_frame(pts_ms);
        }
    }

    /// The video capability filter's current restriction.
    pub fn filter_restriction(&self) -> Option<SizeRestriction> {
        self.node(VIDEO_CHAIN[3]).and_then(|n| n.restriction().cloned())
    }

    /// Replace the video capability filter's restriction.
    pub fn set_filter_restriction(&mut self, restriction: SizeRestriction) {
        if let Some(node) = self.node_mut(VIDEO_CHAIN[3]) {
            node.set_restriction(restriction);
        }
    }

    /// Ask the video scaler to renegotiate downstream.
    pub fn request_scaler_renegotiation(&mut self) {
        if let Some(node) = self.node_mut(VIDEO_CHAIN[2]) {
            node.request_renegotiation();
            debug!(node = VIDEO_CHAIN[2], "renegotiation requested");
        }
    }

    /// Renegotiation requests seen by the video scaler.
    pub fn scaler_renegotiations(&self) -> u64 {
        self.node(VIDEO_CHAIN[2])
            .map(|n| n.renegotiation_requests())
            .unwrap_or(0)
    }
}

impl Drop for PipelineGraph {
    fn drop(&mut self) {
        // Release ordering invariant: the graph reaches Null before any
        // node is freed.
        self.teardown();
    }
}

impl std::fmt::Debug for PipelineGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineGraph")
            .field("nodes", &self.node_count())
            .field("links", &self.edge_count())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::factory::DefaultNodeFactory;

    struct NoQueueFactory(DefaultNodeFactory);

    impl NodeFactory for NoQueueFactory {
        fn create(&self, role: NodeRole, name: &str) -> Result<Node> {
            if role == NodeRole::Queue {
                return Err(Error::NodeCreation {
                    role,
                    name: name.to_string(),
                });
            }
            self.0.create(role, name)
        }
    }

    #[test]
    fn test_build_creates_full_topology() {
        let graph = PipelineGraph::build(&DefaultNodeFactory::new()).unwrap();
        // src, demux, decrypt, and two five-node branches
        assert_eq!(graph.node_count(), 13);
        // src->demux plus four links per branch
        assert_eq!(graph.edge_count(), 9);
        assert!(graph.has_node(DECRYPT));
        assert_eq!(graph.state(), GraphState::Null);
    }

    #[test]
    fn test_build_without_decrypt() {
        let graph = PipelineGraph::build(&DefaultNodeFactory::without_decrypt()).unwrap();
        assert_eq!(graph.node_count(), 12);
        assert!(!graph.has_node(DECRYPT));
    }

    #[test]
    fn test_missing_required_node_is_fatal() {
        let result = PipelineGraph::build(&NoQueueFactory(DefaultNodeFactory::new()));
        assert!(matches!(
            result,
            Err(Error::NodeCreation {
                role: NodeRole::Queue,
                ..
            })
        ));
    }

    #[test]
    fn test_set_state_idempotent() {
        let mut graph = PipelineGraph::build(&DefaultNodeFactory::new()).unwrap();
        assert_eq!(graph.set_state(GraphState::Playing), GraphState::Null);
        assert_eq!(graph.set_state(GraphState::Playing), GraphState::Playing);
        assert_eq!(graph.state(), GraphState::Playing);
    }

    #[test]
    fn test_dynamic_link_is_idempotent() {
        let mut graph = PipelineGraph::build(&DefaultNodeFactory::new()).unwrap();
        graph
            .add_demux_pad("video_0", Caps::video(1920, 1080))
            .unwrap();

        let first = graph
            .link(DEMUX, "video_0", VIDEO_CHAIN[0], "sink")
            .unwrap();
        assert_eq!(first, LinkOutcome::Linked);

        let second = graph
            .link(DEMUX, "video_0", VIDEO_CHAIN[0], "sink")
            .unwrap();
        assert_eq!(second, LinkOutcome::AlreadyLinked);
        assert_eq!(graph.edge_count(), 10);
    }

    #[test]
    fn test_link_unknown_pad_is_recoverable() {
        let mut graph = PipelineGraph::build(&DefaultNodeFactory::new()).unwrap();
        let result = graph.link(DEMUX, "missing_0", VIDEO_CHAIN[0], "sink");
        assert!(matches!(result, Err(Error::Link { .. })));
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut graph = PipelineGraph::build(&DefaultNodeFactory::new()).unwrap();
        graph.set_duration(Duration::from_secs(60));
        graph.seek(Duration::from_secs(90));
        assert_eq!(graph.position(), Duration::from_secs(60));

        graph.seek(Duration::from_secs(30));
        assert_eq!(graph.position(), Duration::from_secs(30));
    }

    #[test]
    fn test_advance_position_saturates() {
        let mut graph = PipelineGraph::build(&DefaultNodeFactory::new()).unwrap();
        graph.set_duration(Duration::from_secs(10));
        graph.advance_position(Duration::from_secs(7));
        graph.advance_position(Duration::from_secs(7));
        assert_eq!(graph.position(), Duration::from_secs(10));
    }

    #[test]
    fn test_teardown_forces_null() {
        let mut graph = PipelineGraph::build(&DefaultNodeFactory::new()).unwrap();
        graph.set_state(GraphState::Playing);
        graph.teardown();
        assert_eq!(graph.state(), GraphState::Null);
        // Idempotent
        graph.teardown();
        assert_eq!(graph.state(), GraphState::Null);
    }

    #[test]
    fn test_source_configuration() {
        let mut graph = PipelineGraph::build(&DefaultNodeFactory::new()).unwrap();
        assert!(graph.source_location().is_none());
        graph.set_source("/media/movie.mp4");
        assert_eq!(
            graph.source_location(),
            Some(Path::new("/media/movie.mp4"))
        );
    }
}
