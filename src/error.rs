//! Error types for playgraph.

use crate::graph::NodeRole;
use thiserror::Error;

/// Result type alias using playgraph's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for playgraph operations.
///
/// Only [`Error::NodeCreation`] is fatal: a missing core node makes playback
/// structurally impossible, so graph construction aborts. Every other variant
/// degrades to a stopped-but-alive state and is surfaced as a notification.
#[derive(Error, Debug)]
pub enum Error {
    /// A required node could not be created. Construction aborts.
    #[error("node creation failed: {role:?} '{name}'")]
    NodeCreation {
        /// Role of the node that could not be created.
        role: NodeRole,
        /// Name the node would have carried in the graph.
        name: String,
    },

    /// A pad link attempt failed. The consumer endpoint stays unlinked.
    #[error("link failed: {src} -> {sink}: {reason}")]
    Link {
        /// Producer side of the attempted link (node.pad).
        src: String,
        /// Consumer side of the attempted link (node.pad).
        sink: String,
        /// Why the link was refused.
        reason: String,
    },

    /// Routing a stream through the decrypt node failed.
    ///
    /// The router falls back to a direct link; the content will typically
    /// still fail at a later negotiation stage, surfaced as a bus error.
    #[error("decrypt routing failed for pad '{pad}': {reason}")]
    DecryptRouting {
        /// The discovered producer pad being routed.
        pad: String,
        /// Why the decrypt path could not be completed.
        reason: String,
    },

    /// A node name was looked up that does not exist in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// The requested link would corrupt the graph topology.
    #[error("invalid graph topology: {0}")]
    Topology(String),
}
