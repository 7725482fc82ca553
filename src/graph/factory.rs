//! Node creation seam.
//!
//! The graph never constructs nodes directly; it asks a [`NodeFactory`].
//! A factory that cannot produce a required node aborts graph construction
//! with [`Error::NodeCreation`] -- the one unrecoverable error class.
//!
//! The default factory picks the video sink flavor from the platform, with
//! an environment override (`PLAYGRAPH_VIDEOSINK`) for troubleshooting.

use crate::error::{Error, Result};
use crate::format::SizeRestriction;
use crate::graph::node::{Node, NodeKind, NodeRole, VideoSinkKind};
use crate::overlay::OverlayAttachment;
use std::env;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Environment variable overriding the selected video sink flavor.
pub const VIDEO_SINK_ENV: &str = "PLAYGRAPH_VIDEOSINK";

impl VideoSinkKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "wayland" => Some(Self::Wayland),
            "ximage" => Some(Self::XImage),
            "d3d11" => Some(Self::D3d11),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    /// Pick a sink flavor for the current platform.
    ///
    /// Order: environment override, then the platform's native surface
    /// protocol, then an automatic fallback.
    pub fn detect() -> Self {
        if let Ok(name) = env::var(VIDEO_SINK_ENV) {
            if let Some(kind) = Self::from_name(&name) {
                debug!(sink = ?kind, "video sink selected via {}", VIDEO_SINK_ENV);
                return kind;
            }
            debug!(name = %name, "unrecognized {} value, ignoring", VIDEO_SINK_ENV);
        }

        #[cfg(target_os = "windows")]
        {
            return Self::D3d11;
        }
        #[cfg(not(target_os = "windows"))]
        {
            if env::var_os("WAYLAND_DISPLAY").is_some() {
                Self::Wayland
            } else if env::var_os("DISPLAY").is_some() {
                Self::XImage
            } else {
                Self::Auto
            }
        }
    }
}

/// Creates typed nodes for the pipeline graph.
pub trait NodeFactory {
    /// Create a node with the given role and name.
    ///
    /// Failure for a required role aborts graph construction.
    fn create(&self, role: NodeRole, name: &str) -> Result<Node>;

    /// Whether this factory can provide a node of the given role.
    ///
    /// The decrypt node is the only optional role: when unsupported the
    /// graph is built without it and encrypted streams fall back to direct
    /// links.
    fn supports(&self, role: NodeRole) -> bool {
        let _ = role;
        true
    }
}

/// Default factory: in-process nodes, platform-selected video sink.
#[derive(Debug, Clone)]
pub struct DefaultNodeFactory {
    decrypt: bool,
    sink_kind: VideoSinkKind,
}

impl DefaultNodeFactory {
    /// Factory with decrypt support and platform-detected video sink.
    pub fn new() -> Self {
        Self {
            decrypt: true,
            sink_kind: VideoSinkKind::detect(),
        }
    }

    /// Factory without a decrypt node (plaintext-only installations).
    pub fn without_decrypt() -> Self {
        Self {
            decrypt: false,
            ..Self::new()
        }
    }

    /// Override the video sink flavor.
    pub fn with_sink_kind(mut self, kind: VideoSinkKind) -> Self {
        self.sink_kind = kind;
        self
    }
}

impl Default for DefaultNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory for DefaultNodeFactory {
    fn create(&self, role: NodeRole, name: &str) -> Result<Node> {
        let kind = match role {
            NodeRole::Source => NodeKind::Source { location: None },
            NodeRole::Demultiplexer => NodeKind::Demultiplexer,
            NodeRole::Queue => NodeKind::Queue,
            NodeRole::Converter => NodeKind::Converter,
            NodeRole::Scaler => NodeKind::Scaler {
                renegotiation_requests: 0,
            },
            NodeRole::CapabilityFilter => NodeKind::CapabilityFilter {
                restriction: SizeRestriction::any(),
            },
            NodeRole::Decrypt => {
                if !self.decrypt {
                    return Err(Error::NodeCreation {
                        role,
                        name: name.to_string(),
                    });
                }
                NodeKind::Decrypt
            }
            NodeRole::VideoSink => NodeKind::VideoSink {
                sink_kind: self.sink_kind,
                overlay: Arc::new(Mutex::new(OverlayAttachment::default())),
                probe: None,
            },
            NodeRole::AudioSink => NodeKind::AudioSink,
        };
        Ok(Node::new(name, kind))
    }

    fn supports(&self, role: NodeRole) -> bool {
        role != NodeRole::Decrypt || self.decrypt
    }
}
