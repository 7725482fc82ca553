//! Pipeline graph: typed nodes, endpoints, and the state machine.
//!
//! The graph is built once, through a [`NodeFactory`], and completed at
//! runtime by the pad router as the demultiplexer discovers streams.

mod factory;
mod node;
mod pad;
mod pipeline;

pub use factory::{DefaultNodeFactory, NodeFactory, VIDEO_SINK_ENV};
pub use node::{Node, NodeKind, NodeRole, VideoSinkKind};
pub use pad::{LinkState, Pad, PadDirection};
pub use pipeline::{
    GraphState, LinkEdge, LinkOutcome, NodeId, PipelineGraph, AUDIO_CHAIN, DECRYPT, DEMUX, SOURCE,
    VIDEO_CHAIN,
};
