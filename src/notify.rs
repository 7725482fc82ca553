//! Upward notification channel.
//!
//! The controller reports playback conditions and metrics to the embedding
//! application through a broadcast channel: any number of receivers, no
//! receiver required.

use std::fmt;
use std::future::Future;
use tokio::sync::broadcast;

/// Notifications delivered to the embedding application.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Graph state has changed.
    StateChanged {
        /// Previous state.
        from: crate::graph::GraphState,
        /// New state.
        to: crate::graph::GraphState,
    },

    /// A runtime error was recovered from (graph forced to Ready).
    Error {
        /// The error message from the bus.
        message: String,
    },

    /// End of stream reached (graph forced to Ready).
    EndOfStream,

    /// Wall-clock latency from play request to first rendered frame.
    TimeToFirstFrame {
        /// Latency in milliseconds.
        millis: u64,
    },

    /// Frame-interval percentiles over the current metrics window.
    FrameIntervals {
        /// 50th percentile inter-frame delta, milliseconds.
        p50: u64,
        /// 95th percentile inter-frame delta, milliseconds.
        p95: u64,
        /// Number of samples in the window.
        samples: usize,
    },

    /// Normalized playback progress.
    Progress {
        /// Current position in milliseconds.
        position_ms: u64,
        /// Total duration in milliseconds.
        duration_ms: u64,
        /// Position / duration, in `[0, 1]`.
        fraction: f64,
    },
}

impl fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerEvent::StateChanged { from, to } => {
                write!(f, "StateChanged: {:?} -> {:?}", from, to)
            }
            PlayerEvent::Error { message } => write!(f, "Error: {}", message),
            PlayerEvent::EndOfStream => write!(f, "EOS"),
            PlayerEvent::TimeToFirstFrame { millis } => {
                write!(f, "TTFF: {} ms", millis)
            }
            PlayerEvent::FrameIntervals { p50, p95, samples } => {
                write!(f, "Intervals: p50={} ms p95={} ms n={}", p50, p95, samples)
            }
            PlayerEvent::Progress { fraction, .. } => {
                write!(f, "Progress: {:.1}%", fraction * 100.0)
            }
        }
    }
}

/// Sender for player notifications.
///
/// Held by the controller and its components; cloning is cheap.
#[derive(Clone)]
pub struct EventSender {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventSender {
    /// Create a new sender with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send a notification.
    ///
    /// Returns the number of receivers that got the event; 0 when nobody is
    /// listening (which is fine).
    pub fn send(&self, event: PlayerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Create a receiver for notifications.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Create a stream of notifications.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }
}

impl Default for EventSender {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receiver for player notifications.
pub struct EventReceiver {
    receiver: broadcast::Receiver<PlayerEvent>,
}

impl EventReceiver {
    /// Receive the next notification.
    ///
    /// Returns `None` if the sender has been dropped.
    pub async fn recv(&mut self) -> Option<PlayerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Missed some events, continue with the next one
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive a notification without blocking.
    pub fn try_recv(&mut self) -> Option<PlayerEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Wait for playback to stop: EOS or a recovered error.
    ///
    /// Returns `Ok(())` on EOS, `Err(message)` on error.
    pub async fn wait_ended(&mut self) -> Result<(), String> {
        while let Some(event) = self.recv().await {
            match event {
                PlayerEvent::EndOfStream => return Ok(()),
                PlayerEvent::Error { message } => return Err(message),
                _ => continue,
            }
        }
        Err("notification channel closed unexpectedly".to_string())
    }
}

/// A stream adapter for receiving notifications with async iteration.
pub struct EventStream {
    receiver: EventReceiver,
}

impl EventStream {
    /// Create a new stream from a receiver.
    pub fn new(receiver: EventReceiver) -> Self {
        Self { receiver }
    }
}

impl futures::Stream for EventStream {
    type Item = PlayerEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let fut = self.receiver.recv();
        tokio::pin!(fut);
        fut.poll(cx)
    }
}
