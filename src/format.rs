//! Capability sets and stream classification.
//!
//! A [`Caps`] value is the negotiated description of a stream's media kind at
//! an endpoint. Classification is prefix-based on the structural name
//! (`video/*`, `audio/*`, or the common-encryption marker); no further
//! disambiguation is attempted for compound or ambiguous names.
//!
//! The capability-filter node expresses its restriction with [`CapsValue`],
//! a constraint that can be fixed, a range, or unconstrained.

use std::fmt;

/// Structural name carried by common-encryption (CENC) capability sets.
///
/// Encrypted streams advertise this marker plus the original media type of
/// the protected content.
pub const CENC_MEDIA_TYPE: &str = "application/x-cenc";

// ============================================================================
// CapsValue - constraint value for the capability filter
// ============================================================================

/// A constraint value: fixed, range, or any.
///
/// # Examples
///
/// ```rust
/// use playgraph::format::CapsValue;
///
/// let clamp: CapsValue<u32> = CapsValue::Range { min: 1, max: 1280 };
/// assert!(clamp.accepts(&1280));
/// assert!(!clamp.accepts(&1920));
/// assert!(CapsValue::Any.accepts(&1920u32));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum CapsValue<T> {
    /// Exact value (fully constrained).
    Fixed(T),
    /// Range of acceptable values (inclusive).
    Range {
        /// Minimum acceptable value.
        min: T,
        /// Maximum acceptable value.
        max: T,
    },
    /// Any value accepted (unconstrained).
    #[default]
    Any,
}

impl<T: Clone + Ord> CapsValue<T> {
    /// Check if a value is accepted by this constraint.
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Self::Fixed(v) => v == value,
            Self::Range { min, max } => value >= min && value <= max,
            Self::Any => true,
        }
    }

    /// Intersect two constraints, finding common ground.
    ///
    /// Returns `None` if there is no overlap.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Any, other) => Some(other.clone()),
            (this, Self::Any) => Some(this.clone()),
            (Self::Fixed(a), Self::Fixed(b)) => (a == b).then(|| Self::Fixed(a.clone())),
            (Self::Fixed(v), Self::Range { min, max })
            | (Self::Range { min, max }, Self::Fixed(v)) => {
                (v >= min && v <= max).then(|| Self::Fixed(v.clone()))
            }
            (
                Self::Range {
                    min: min1,
                    max: max1,
                },
                Self::Range {
                    min: min2,
                    max: max2,
                },
            ) => {
                let min = min1.max(min2).clone();
                let max = max1.min(max2).clone();
                (min <= max).then_some(Self::Range { min, max })
            }
        }
    }

    /// Check if this constraint is unconstrained.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

// ============================================================================
// SizeRestriction - what the capability filter imposes on a branch
// ============================================================================

/// Width/height clamp applied by a capability-filter node.
///
/// The unrestricted value is pass-through: every size is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SizeRestriction {
    /// Width constraint.
    pub width: CapsValue<u32>,
    /// Height constraint.
    pub height: CapsValue<u32>,
}

impl SizeRestriction {
    /// Unrestricted (pass-through) restriction.
    pub fn any() -> Self {
        Self::default()
    }

    /// Clamp width and height to at most the given values.
    pub fn clamp(width: u32, height: u32) -> Self {
        Self {
            width: CapsValue::Range { min: 1, max: width },
            height: CapsValue::Range {
                min: 1,
                max: height,
            },
        }
    }

    /// Check whether a frame size passes this restriction.
    pub fn accepts(&self, width: u32, height: u32) -> bool {
        self.width.accepts(&width) && self.height.accepts(&height)
    }

    /// True when the restriction imposes nothing.
    pub fn is_pass_through(&self) -> bool {
        self.width.is_any() && self.height.is_any()
    }
}

// ============================================================================
// Caps and stream classification
// ============================================================================

/// A negotiated capability set for a stream endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caps {
    media_type: String,
    original_media_type: Option<String>,
    size: Option<(u32, u32)>,
}

impl Caps {
    /// Create a capability set with the given structural name.
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            original_media_type: None,
            size: None,
        }
    }

    /// An empty capability set (nothing negotiated yet).
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Raw video caps with a fixed frame size.
    pub fn video(width: u32, height: u32) -> Self {
        Self {
            media_type: "video/x-raw".to_string(),
            original_media_type: None,
            size: Some((width, height)),
        }
    }

    /// Raw audio caps.
    pub fn audio() -> Self {
        Self::new("audio/x-raw")
    }

    /// Common-encryption caps wrapping the given original media type.
    pub fn encrypted(original_media_type: impl Into<String>) -> Self {
        Self {
            media_type: CENC_MEDIA_TYPE.to_string(),
            original_media_type: Some(original_media_type.into()),
            size: None,
        }
    }

    /// The structural media-type name.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// The protected content's media type, for CENC caps.
    pub fn original_media_type(&self) -> Option<&str> {
        self.original_media_type.as_deref()
    }

    /// Fixed frame size, if negotiated.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    /// True when nothing has been negotiated.
    pub fn is_empty(&self) -> bool {
        self.media_type.is_empty()
    }

    /// Classify this capability set into a stream class.
    ///
    /// Prefix-based: `video/*`, `audio/*`, or the CENC marker combined with
    /// the original media type. Anything else is [`StreamClass::Unknown`].
    pub fn classify(&self) -> StreamClass {
        if self.is_empty() {
            return StreamClass::Unknown;
        }
        if self.media_type == CENC_MEDIA_TYPE {
            return match self.original_media_type.as_deref() {
                Some(orig) if orig.starts_with("video/") => StreamClass::EncryptedVideo,
                Some(orig) if orig.starts_with("audio/") => StreamClass::EncryptedAudio,
                _ => StreamClass::Unknown,
            };
        }
        if self.media_type.starts_with("video/") {
            StreamClass::Video
        } else if self.media_type.starts_with("audio/") {
            StreamClass::Audio
        } else {
            StreamClass::Unknown
        }
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "EMPTY");
        }
        write!(f, "{}", self.media_type)?;
        if let Some(orig) = &self.original_media_type {
            write!(f, "(original={})", orig)?;
        }
        if let Some((w, h)) = self.size {
            write!(f, " {}x{}", w, h)?;
        }
        Ok(())
    }
}

/// The class a discovered stream falls into.
///
/// Unknown streams are never linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamClass {
    /// Plaintext video.
    Video,
    /// Plaintext audio.
    Audio,
    /// Common-encryption video.
    EncryptedVideo,
    /// Common-encryption audio.
    EncryptedAudio,
    /// Empty or unrecognized caps.
    Unknown,
}

impl StreamClass {
    /// Whether this stream needs the decrypt node.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::EncryptedVideo | Self::EncryptedAudio)
    }

    /// The branch this stream feeds, if any.
    pub fn branch(&self) -> Option<Branch> {
        match self {
            Self::Video | Self::EncryptedVideo => Some(Branch::Video),
            Self::Audio | Self::EncryptedAudio => Some(Branch::Audio),
            Self::Unknown => None,
        }
    }
}

/// A decode branch of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// The video branch (queue -> convert -> scale -> filter -> video sink).
    Video,
    /// The audio branch (queue -> convert -> scale -> filter -> audio sink).
    Audio,
}
