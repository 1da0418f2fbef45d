//! Connection establishment for board links.
//!
//! A [`Dialer`] turns an endpoint URL into a pair of text-frame halves: a
//! sink for outbound frames and a stream of inbound frames. The production
//! implementation is [`WebSocketDialer`]; tests plug in in-memory dialers.

use std::pin::Pin;

use futures::future::{self, BoxFuture};
use futures::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use crate::error::Error;

/// Outbound half of a live connection: accepts serialized text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of a live connection: yields text frames until the peer
/// goes away. The stream ending means the connection closed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// Opens one live connection to a board endpoint.
pub trait Dialer: Send + Sync {
    fn dial(&self, url: Url) -> BoxFuture<'static, Result<(FrameSink, FrameStream), Error>>;
}

// ── WebSocket dialer ─────────────────────────────────────────────────

/// Dials `ws://host:port/path` endpoints with `tokio-tungstenite`.
///
/// Only text frames are surfaced. Ping/pong is answered by tungstenite,
/// binary frames are ignored, and a close frame ends the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

impl Dialer for WebSocketDialer {
    fn dial(&self, url: Url) -> BoxFuture<'static, Result<(FrameSink, FrameStream), Error>> {
        async move {
            tracing::debug!(url = %url, "opening WebSocket");

            let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

            let (write, read) = ws_stream.split();

            let sink = write
                .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(Message::text(text))))
                .sink_map_err(|e| Error::WebSocketConnect(e.to_string()));

            let stream = read.filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Close(close)) => {
                        if let Some(cf) = close {
                            tracing::debug!(code = %cf.code, reason = %cf.reason, "close frame received");
                        }
                        None
                    }
                    // Binary, Ping, Pong, Frame
                    Ok(_) => None,
                    Err(e) => Some(Err(Error::WebSocketConnect(e.to_string()))),
                })
            });

            let sink: FrameSink = Box::pin(sink);
            let stream: FrameStream = Box::pin(stream);
            Ok((sink, stream))
        }
        .boxed()
    }
}
