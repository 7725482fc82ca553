//! Native render-surface binding.
//!
//! The pipeline signals "prepare window" just before the first frame reaches
//! the video sink, on the sink's own execution context. The binder must
//! attach the surface handle before that signal returns or the render call
//! is undefined. The handler therefore only performs cheap, re-entrant-safe
//! reads through the [`OverlaySurface`] capability trait and never blocks.

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Handles below this value are rejected as invalid (avoids binding a
/// not-yet-realized native window).
pub const MIN_VALID_HANDLE: usize = 0x10;

/// A rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle at the origin.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Minimal capability interface onto the hosting window.
///
/// Decouples the renderer from any specific windowing toolkit: the sink only
/// ever needs the native handle and the current widget bounds. `handle()`
/// returns `None` until the window has realized a native surface.
pub trait OverlaySurface: Send + Sync {
    /// The native window handle, once realized.
    fn handle(&self) -> Option<usize>;

    /// Current widget bounds, in surface coordinates.
    fn rectangle(&self) -> Rect;
}

/// What the video sink renders into: the bound handle and rectangle.
///
/// Owned by the video sink node, shared with the binder. `exposes` counts
/// redraw requests so sinks (and tests) can observe expose traffic.
#[derive(Debug, Default)]
pub struct OverlayAttachment {
    handle: Option<usize>,
    rect: Rect,
    exposes: u64,
}

impl OverlayAttachment {
    /// The bound native handle, if any.
    pub fn handle(&self) -> Option<usize> {
        self.handle
    }

    /// The current render rectangle.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Number of expose (redraw) requests issued so far.
    pub fn exposes(&self) -> u64 {
        self.exposes
    }

    /// Whether a handle has been bound.
    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }
}

/// Attachment shared between the video sink and the binder.
pub type SharedAttachment = Arc<Mutex<OverlayAttachment>>;

/// Binds the hosting window's surface to the video sink.
///
/// Cloneable so the handoff can be invoked from the sink's execution
/// context while the controller stays on the hosting thread.
#[derive(Clone)]
pub struct OverlayBinder {
    surface: Arc<dyn OverlaySurface>,
    attachment: SharedAttachment,
}

impl OverlayBinder {
    /// Create a binder for the given surface and sink attachment.
    pub fn new(surface: Arc<dyn OverlaySurface>, attachment: SharedAttachment) -> Self {
        Self {
            surface,
            attachment,
        }
    }

    /// Handle the synchronous prepare-window signal.
    ///
    /// Binds the current handle, applies the widget's bounds as the render
    /// rectangle, and requests a redraw. If the window has not realized a
    /// native handle yet (absent or below [`MIN_VALID_HANDLE`]) the bind is
    /// skipped, not failed; the next prepare or resize retries.
    ///
    /// Returns whether a handle is bound after the call.
    pub fn handle_prepare_window(&self) -> bool {
        let handle = match self.surface.handle() {
            Some(h) if h >= MIN_VALID_HANDLE => h,
            Some(h) => {
                debug!(handle = h, "surface handle below minimum, skipping bind");
                return false;
            }
            None => {
                debug!("surface handle not realized yet, skipping bind");
                return false;
            }
        };

        let rect = self.surface.rectangle();
        let mut attachment = self.attachment.lock().expect("attachment lock");
        attachment.handle = Some(handle);
        attachment.rect = rect;
        attachment.exposes += 1;
        info!(handle = handle, ?rect, "overlay bound");
        true
    }

    /// Re-apply the render rectangle after a hosting-window resize.
    ///
    /// No new bind: only the rectangle is refreshed and a redraw requested.
    /// Before the first successful bind this is a no-op; the following
    /// prepare-window signal carries the fresh geometry.
    pub fn handle_resize(&self) {
        let rect = self.surface.rectangle();
        let mut attachment = self.attachment.lock().expect("attachment lock");
        if !attachment.is_bound() {
            return;
        }
        attachment.rect = rect;
        attachment.exposes += 1;
        debug!(?rect, "render rectangle re-applied");
    }

    /// The shared attachment (for the sink and for tests).
    pub fn attachment(&self) -> SharedAttachment {
        self.attachment.clone()
    }
}
