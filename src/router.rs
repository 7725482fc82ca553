//! Dynamic pad routing.
//!
//! The demultiplexer discovers producer endpoints only after the container
//! is parsed. Each discovered endpoint runs through a small state machine:
//!
//! ```text
//! Discovering -> Classifying -> Linking -> { Linked, Ignored, FailedFallback }
//! ```
//!
//! Classification is prefix-based on the capability set's structural name.
//! Encrypted streams are routed through the decrypt node when one exists;
//! when decrypt routing fails (or no decrypt node is present) the router
//! falls back to a best-effort direct link. The fallback has no success
//! criterion: content routed this way typically still fails at a later
//! negotiation stage, surfaced as a bus error rather than synchronously
//! here.

use crate::error::Error;
use crate::format::{Caps, StreamClass};
use crate::graph::{LinkOutcome, PipelineGraph, DECRYPT, DEMUX};
use metrics::counter;
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Metric name: streams linked into a branch.
pub(crate) const STREAMS_ROUTED: &str = "playgraph_streams_routed";
/// Metric name: streams left dangling (empty/unrecognized caps).
pub(crate) const STREAMS_IGNORED: &str = "playgraph_streams_ignored";
/// Metric name: best-effort direct-link fallbacks.
pub(crate) const STREAM_FALLBACKS: &str = "playgraph_stream_fallbacks";

/// Routing state of a discovered producer endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteState {
    /// Endpoint reported by the demultiplexer, not yet inspected.
    Discovering,
    /// Capability set being classified.
    Classifying,
    /// Link attempts in progress.
    Linking,
    /// Stream linked into its branch.
    Linked,
    /// Empty or unrecognized caps; endpoint left dangling (not an error).
    Ignored,
    /// A link attempt failed; a best-effort direct link was tried instead.
    FailedFallback,
}

/// One observed link attempt, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct LinkAttempt {
    /// Producer side (node.pad).
    pub src: String,
    /// Consumer side (node.pad).
    pub sink: String,
    /// Whether the attempt succeeded (including already-linked no-ops).
    pub ok: bool,
}

/// Routing record for one discovered endpoint.
#[derive(Debug)]
pub struct RouteRecord {
    /// Terminal state the endpoint reached.
    pub state: RouteState,
    /// Classification of the endpoint's caps.
    pub class: StreamClass,
    /// Link attempts made while routing, in order.
    pub attempts: SmallVec<[LinkAttempt; 2]>,
}

/// Reacts to dynamically discovered demultiplexer endpoints and completes
/// the graph topology.
#[derive(Debug, Default)]
pub struct PadRouter {
    routes: HashMap<String, RouteRecord>,
}

impl PadRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// The terminal routing state of a pad, if it has been discovered.
    pub fn route_state(&self, pad: &str) -> Option<RouteState> {
        self.routes.get(pad).map(|r| r.state)
    }

    /// The full routing record of a pad.
    pub fn route(&self, pad: &str) -> Option<&RouteRecord> {
        self.routes.get(pad)
    }

    /// Number of discovered endpoints.
    pub fn discovered(&self) -> usize {
        self.routes.len()
    }

    /// Handle a newly discovered producer endpoint.
    ///
    /// Idempotent: re-discovery of an already-routed pad is a no-op and
    /// returns its existing terminal state.
    pub fn pad_added(
        &mut self,
        graph: &mut PipelineGraph,
        pad_name: &str,
        caps: &Caps,
    ) -> RouteState {
        if let Some(record) = self.routes.get(pad_name) {
            debug!(pad = %pad_name, state = ?record.state, "pad already routed, skipping");
            return record.state;
        }

        debug!(pad = %pad_name, caps = %caps, "pad discovered");
        let class = caps.classify();
        let mut attempts: SmallVec<[LinkAttempt; 2]> = SmallVec::new();

        let state = match class.branch() {
            None => {
                debug!(pad = %pad_name, "empty or unrecognized caps, leaving endpoint dangling");
                counter!(STREAMS_IGNORED).increment(1);
                RouteState::Ignored
            }
            Some(branch) => {
                // Materialize the dynamic pad on the demuxer before linking.
                if let Err(e) = graph.add_demux_pad(pad_name, caps.clone()) {
                    warn!(pad = %pad_name, error = %e, "could not materialize demuxer pad");
                    counter!(STREAMS_IGNORED).increment(1);
                    self.finish(pad_name, RouteState::Ignored, class, attempts);
                    return RouteState::Ignored;
                }

                let queue = branch.queue_name();
                if class.is_encrypted() {
                    self.route_encrypted(graph, pad_name, queue, &mut attempts)
                } else {
                    let ok = Self::try_link(graph, DEMUX, pad_name, queue, "sink", &mut attempts);
                    if ok {
                        counter!(STREAMS_ROUTED, "class" => format!("{:?}", class)).increment(1);
                        RouteState::Linked
                    } else {
                        counter!(STREAM_FALLBACKS).increment(1);
                        RouteState::FailedFallback
                    }
                }
            }
        };

        self.finish(pad_name, state, class, attempts);
        state
    }

    /// Route an encrypted stream, preferring the decrypt node.
    fn route_encrypted(
        &mut self,
        graph: &mut PipelineGraph,
        pad_name: &str,
        queue: &str,
        attempts: &mut SmallVec<[LinkAttempt; 2]>,
    ) -> RouteState {
        let failure = if graph.has_node(DECRYPT) {
            let in_ok = Self::try_link(graph, DEMUX, pad_name, DECRYPT, "sink", attempts);
            let out_ok = in_ok && Self::try_link(graph, DECRYPT, "src", queue, "sink", attempts);
            if in_ok && out_ok {
                counter!(STREAMS_ROUTED, "class" => "encrypted").increment(1);
                return RouteState::Linked;
            }
            Error::DecryptRouting {
                pad: pad_name.to_string(),
                reason: "decrypt chain link failed".to_string(),
            }
        } else {
            Error::DecryptRouting {
                pad: pad_name.to_string(),
                reason: "no decrypt node present".to_string(),
            }
        };
        warn!(error = %failure, "attempting direct link as best effort");

        // Best effort: no success criterion. Playback of still-encrypted
        // bytes is expected to fail later as a bus error.
        Self::try_link(graph, DEMUX, pad_name, queue, "sink", attempts);
        counter!(STREAM_FALLBACKS).increment(1);
        RouteState::FailedFallback
    }

    /// Attempt one link, logging its outcome independently.
    fn try_link(
        graph: &mut PipelineGraph,
        src: &str,
        src_pad: &str,
        sink: &str,
        sink_pad: &str,
        attempts: &mut SmallVec<[LinkAttempt; 2]>,
    ) -> bool {
        let result = graph.link(src, src_pad, sink, sink_pad);
        let ok = match &result {
            Ok(LinkOutcome::Linked) => {
                debug!(src = %src, src_pad = %src_pad, sink = %sink, "link succeeded");
                true
            }
            Ok(LinkOutcome::AlreadyLinked) => {
                debug!(src = %src, src_pad = %src_pad, sink = %sink, "already linked, no-op");
                true
            }
            Err(e) => {
                warn!(src = %src, src_pad = %src_pad, sink = %sink, error = %e, "link failed");
                false
            }
        };
        attempts.push(LinkAttempt {
            src: format!("{}.{}", src, src_pad),
            sink: format!("{}.{}", sink, sink_pad),
            ok,
        });
        ok
    }

    fn finish(
        &mut self,
        pad_name: &str,
        state: RouteState,
        class: StreamClass,
        attempts: SmallVec<[LinkAttempt; 2]>,
    ) {
        self.routes.insert(
            pad_name.to_string(),
            RouteRecord {
                state,
                class,
                attempts,
            },
        );
    }
}
