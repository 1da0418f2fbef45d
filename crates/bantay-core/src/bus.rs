// ── Typed publish/subscribe bus ──
//
// Handlers are registered per tag and invoked synchronously, in
// registration order, on the publishing task. Each invocation is guarded:
// a handler that returns an error or panics is logged and skipped, and the
// remaining handlers still run. Every published event is also forwarded to
// a broadcast channel for async consumers (`EventBus::stream`).

use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

const STREAM_CHANNEL_SIZE: usize = 256;

/// Error a handler may return. It is logged, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler<E> = Arc<dyn Fn(&E) -> Result<(), HandlerError> + Send + Sync>;

/// An event that can travel on an [`EventBus`].
pub trait BusEvent: Clone + Send + Sync + 'static {
    type Tag: Copy + Eq + Hash + fmt::Display + Send + Sync + 'static;

    fn tag(&self) -> Self::Tag;
}

/// Token returned by [`EventBus::subscribe`]; pass it to
/// [`EventBus::unsubscribe`] to remove the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription<T> {
    tag: T,
    id: u64,
}

impl<T: Copy> Subscription<T> {
    pub fn tag(&self) -> T {
        self.tag
    }
}

pub struct EventBus<E: BusEvent> {
    handlers: DashMap<E::Tag, Vec<(u64, Handler<E>)>>,
    next_id: AtomicU64,
    stream_tx: broadcast::Sender<Arc<E>>,
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        let (stream_tx, _) = broadcast::channel(STREAM_CHANNEL_SIZE);
        Self {
            handlers: DashMap::new(),
            next_id: AtomicU64::new(1),
            stream_tx,
        }
    }

    /// Register `handler` for events tagged `tag`.
    pub fn subscribe<F>(&self, tag: E::Tag, handler: F) -> Subscription<E::Tag>
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .entry(tag)
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription { tag, id }
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription<E::Tag>) -> bool {
        let Some(mut handlers) = self.handlers.get_mut(&subscription.tag) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        before != handlers.len()
    }

    pub fn listener_count(&self, tag: E::Tag) -> usize {
        self.handlers.get(&tag).map_or(0, |h| h.len())
    }

    /// Deliver `event` to every handler registered for its tag, then to
    /// stream consumers.
    pub fn publish(&self, event: E) {
        let tag = event.tag();

        // Snapshot the handler list so handlers may (un)subscribe re-entrantly.
        let handlers: Vec<Handler<E>> = self
            .handlers
            .get(&tag)
            .map(|h| h.iter().map(|(_, f)| Arc::clone(f)).collect())
            .unwrap_or_default();

        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(event = %tag, error = %e, "event handler failed"),
                Err(_) => warn!(event = %tag, "event handler panicked"),
            }
        }

        // No receivers is fine.
        let _ = self.stream_tx.send(Arc::new(event));
    }

    /// Subscribe to every event as an async stream.
    pub fn stream(&self) -> EventStream<E> {
        EventStream {
            inner: BroadcastStream::new(self.stream_tx.subscribe()),
        }
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("tags", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

// ── Async stream adapter ─────────────────────────────────────────────

/// `Stream` of every event published after the stream was created.
///
/// A consumer that falls more than the channel capacity behind skips the
/// missed events (logged) rather than ending.
pub struct EventStream<E: BusEvent> {
    inner: BroadcastStream<Arc<E>>,
}

impl<E: BusEvent> Stream for EventStream<E> {
    type Item = Arc<E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(n)))) => {
                    warn!(skipped = n, "event stream lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
