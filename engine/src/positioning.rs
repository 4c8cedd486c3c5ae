//! Continuous device positioning.
//!
//! The platform capability is modelled as a channel: a [`PositionWatch`] is
//! the consuming end held by the resolver, a [`PositionFeed`] is the producing
//! end held by whatever talks to the device. Dropping (or releasing) the watch
//! closes the channel, which is how the device side learns it must stop
//! reporting.

use std::time::Duration;

use proxima_types::Coordinate;
use thiserror::Error;
use tokio::sync::mpsc;

const WATCH_BUFFER: usize = 16;

/// Options handed to the platform when a watch is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Maximum age of a cached fix the platform may report. Zero disables reuse.
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(30),
            maximum_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    Unavailable,
    #[error("timed out waiting for a position fix")]
    Timeout,
}

impl PositionError {
    /// The platform will not report again on this watch.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionEvent {
    Fix(Coordinate),
    Failed(PositionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("continuous positioning is not supported on this platform")]
pub struct PositioningUnsupported;

/// A platform able to open continuous position watches.
pub trait PositioningSource: Send + Sync {
    fn watch(&self, options: WatchOptions) -> Result<PositionWatch, PositioningUnsupported>;
}

/// Consuming end of an open watch. Dropping it releases the subscription.
#[derive(Debug)]
pub struct PositionWatch {
    events: mpsc::Receiver<PositionEvent>,
}

impl PositionWatch {
    /// Create a connected feed/watch pair.
    #[must_use]
    pub fn channel() -> (PositionFeed, PositionWatch) {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        (PositionFeed { events: tx }, PositionWatch { events: rx })
    }

    /// Next event, in the order the platform produced them. `None` once the
    /// platform side has gone away.
    pub async fn next(&mut self) -> Option<PositionEvent> {
        self.events.recv().await
    }

    /// Explicitly release the subscription.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.events.close();
        tracing::debug!("Position watch released");
    }
}

/// Producing end of a watch, held by the platform bridge.
#[derive(Debug, Clone)]
pub struct PositionFeed {
    events: mpsc::Sender<PositionEvent>,
}

impl PositionFeed {
    /// Deliver an event. Returns `false` once the watch has been released.
    pub async fn publish(&self, event: PositionEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.events.is_closed()
    }

    /// Resolves when the consumer releases the watch.
    pub async fn released(&self) {
        self.events.closed().await;
    }
}

/// A watch request forwarded to the host by [`ChannelPositioning`].
#[derive(Debug)]
pub struct WatchRequest {
    pub options: WatchOptions,
    pub feed: PositionFeed,
}

/// Forwards every watch request to a host task over a channel.
#[derive(Debug, Clone)]
pub struct ChannelPositioning {
    requests: mpsc::UnboundedSender<WatchRequest>,
}

impl ChannelPositioning {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WatchRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { requests: tx }, rx)
    }
}

impl PositioningSource for ChannelPositioning {
    fn watch(&self, options: WatchOptions) -> Result<PositionWatch, PositioningUnsupported> {
        let (feed, watch) = PositionWatch::channel();
        self.requests
            .send(WatchRequest { options, feed })
            .map_err(|_| PositioningUnsupported)?;
        Ok(watch)
    }
}

/// A platform with no positioning capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPositioning;

impl PositioningSource for NoPositioning {
    fn watch(&self, _options: WatchOptions) -> Result<PositionWatch, PositioningUnsupported> {
        Err(PositioningUnsupported)
    }
}
