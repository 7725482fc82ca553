//! Endpoint (pad) abstraction for node inputs and outputs.
//!
//! Pads are the connection points of nodes. A consumer pad is linked at most
//! once; re-linking an already-linked pad is a no-op, never an error.

use crate::format::Caps;

/// Direction of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    /// Produces buffers toward downstream consumers.
    Producer,
    /// Consumes buffers from an upstream producer.
    Consumer,
}

/// Link state of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// Not connected to a peer.
    #[default]
    Unlinked,
    /// Connected to a peer.
    Linked,
}

/// A pad instance on a node.
#[derive(Debug, Clone)]
pub struct Pad {
    name: String,
    direction: PadDirection,
    link_state: LinkState,
    caps: Option<Caps>,
}

impl Pad {
    /// Create a new pad.
    pub fn new(name: impl Into<String>, direction: PadDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            link_state: LinkState::Unlinked,
            caps: None,
        }
    }

    /// Create a standard consumer pad named "sink".
    pub fn sink() -> Self {
        Self::new("sink", PadDirection::Consumer)
    }

    /// Create a standard producer pad named "src".
    pub fn src() -> Self {
        Self::new("src", PadDirection::Producer)
    }

    /// Create a producer pad carrying negotiated caps (demuxer dynamic pads).
    pub fn producer_with_caps(name: impl Into<String>, caps: Caps) -> Self {
        Self {
            name: name.into(),
            direction: PadDirection::Producer,
            link_state: LinkState::Unlinked,
            caps: Some(caps),
        }
    }

    /// Get the pad's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the pad's direction.
    pub fn direction(&self) -> PadDirection {
        self.direction
    }

    /// Check if this is a consumer pad.
    pub fn is_consumer(&self) -> bool {
        self.direction == PadDirection::Consumer
    }

    /// Check if this is a producer pad.
    pub fn is_producer(&self) -> bool {
        self.direction == PadDirection::Producer
    }

    /// Check if this pad is linked to a peer.
    pub fn is_linked(&self) -> bool {
        self.link_state == LinkState::Linked
    }

    /// Mark this pad linked.
    ///
    /// Returns `false` when the pad was already linked: the link-once
    /// invariant turns repeated linking into a no-op.
    pub fn mark_linked(&mut self) -> bool {
        if self.is_linked() {
            return false;
        }
        self.link_state = LinkState::Linked;
        true
    }

    /// The negotiated caps on this pad, if any.
    pub fn caps(&self) -> Option<&Caps> {
        self.caps.as_ref()
    }

    /// Set the negotiated caps.
    pub fn set_caps(&mut self, caps: Caps) {
        self.caps = Some(caps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_creation() {
        let sink = Pad::sink();
        assert_eq!(sink.name(), "sink");
        assert!(sink.is_consumer());
        assert!(!sink.is_producer());
        assert!(!sink.is_linked());

        let src = Pad::src();
        assert_eq!(src.name(), "src");
        assert!(src.is_producer());
    }

    #[test]
    fn test_link_once() {
        let mut pad = Pad::sink();
        assert!(pad.mark_linked());
        assert!(pad.is_linked());
        // Second link is a no-op, not an error
        assert!(!pad.mark_linked());
        assert!(pad.is_linked());
    }

    #[test]
    fn test_producer_with_caps() {
        let caps = Caps::video(1920, 1080);
        let pad = Pad::producer_with_caps("video_0", caps.clone());
        assert!(pad.is_producer());
        assert_eq!(pad.caps(), Some(&caps));
    }
}
