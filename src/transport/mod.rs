//! Transport boundary — the interface between the framework and a hosting adapter.
//!
//! The framework does not open sockets or parse wire bytes. A hosting adapter
//! (an external server integration) hands the dispatcher three things per
//! request:
//!
//! - a [`Scope`] describing the request line, headers, and peer,
//! - a [`Receive`] stream yielding the request body in chunks,
//! - a [`Transmit`] sink accepting the response as [`Event`]s.
//!
//! The dispatcher's only obligation to the adapter is to emit exactly one
//! [`Event::Start`] followed by body events culminating in `more_body == false`.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::http::{Headers, Method};

/// Errors crossing the transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport channel closed before the message stream completed")]
    Closed,

    #[error("transport rejected an outbound event: {0}")]
    Send(String),
}

/// Request metadata supplied by the hosting adapter.
///
/// A `Scope` is immutable once constructed; everything mutable about a request
/// (cached body, path parameters) lives on [`Request`](crate::http::Request).
///
/// # Examples
///
/// ```
/// use trellis::{Method, Scope};
///
/// let scope = Scope::new(Method::Get, "/users/42")
///     .with_query("page=2")
///     .with_header("accept", "application/json");
///
/// assert_eq!(scope.path, "/users/42");
/// ```
#[derive(Debug, Clone)]
pub struct Scope {
    /// HTTP method of the request.
    pub method: Method,
    /// Request path, without the query string.
    pub path: String,
    /// Raw query string (without the leading `?`), if any.
    pub query_string: Option<String>,
    /// Request headers.
    pub headers: Headers,
    /// Peer address, when the adapter knows it.
    pub client: Option<SocketAddr>,
}

impl Scope {
    /// Creates a scope with no query string, no headers, and no client address.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query_string: None,
            headers: Headers::new(),
            client: None,
        }
    }

    /// Sets the raw query string.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub fn with_client(mut self, client: SocketAddr) -> Self {
        self.client = Some(client);
        self
    }
}

/// An inbound message from the transport.
#[derive(Debug, Clone)]
pub enum Message {
    /// A chunk of the request body. `more_body == false` marks the final chunk.
    Body { data: Bytes, more_body: bool },
}

/// An outbound event to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Response status line and headers. Sent exactly once per request.
    Start {
        status: u16,
        headers: Vec<(String, String)>,
    },
    /// A chunk of the response body. `more_body == false` marks the final chunk.
    Body { data: Bytes, more_body: bool },
}

/// Source of inbound body chunks for one request.
///
/// Implementations are polled by [`Request::body`](crate::http::Request::body)
/// until a chunk arrives with `more_body == false`. The framework drains a
/// `Receive` at most once per request; the drained body is cached on the
/// `Request` afterwards.
pub trait Receive: Send {
    /// Waits for the next inbound message.
    fn next(&mut self)
    -> Pin<Box<dyn Future<Output = Result<Message, TransportError>> + Send + '_>>;
}

/// Sink for outbound response events for one request.
pub trait Transmit: Send {
    /// Delivers one outbound event to the adapter.
    fn send(
        &mut self,
        event: Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>>;
}

/// A body stream with no content.
///
/// Yields a single empty final chunk, then reports the stream as closed.
/// Useful for requests without a body and in tests.
#[derive(Debug, Default)]
pub struct EmptyBody {
    drained: bool,
}

impl EmptyBody {
    /// Creates an empty body stream.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Receive for EmptyBody {
    fn next(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Message, TransportError>> + Send + '_>> {
        let result = if self.drained {
            Err(TransportError::Closed)
        } else {
            self.drained = true;
            Ok(Message::Body {
                data: Bytes::new(),
                more_body: false,
            })
        };
        Box::pin(std::future::ready(result))
    }
}

/// [`Receive`] implementation backed by a tokio mpsc channel.
///
/// Adapters push [`Message`]s into the sending half as chunks arrive off the
/// wire; the dispatcher consumes them on demand.
#[derive(Debug)]
pub struct ChannelReceive {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl ChannelReceive {
    /// Wraps the receiving half of a message channel.
    pub fn new(rx: mpsc::UnboundedReceiver<Message>) -> Self {
        Self { rx }
    }
}

impl Receive for ChannelReceive {
    fn next(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Message, TransportError>> + Send + '_>> {
        Box::pin(async move { self.rx.recv().await.ok_or(TransportError::Closed) })
    }
}

/// [`Transmit`] implementation backed by a tokio mpsc channel.
#[derive(Debug)]
pub struct ChannelTransmit {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelTransmit {
    /// Wraps the sending half of an event channel.
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

impl Transmit for ChannelTransmit {
    fn send(
        &mut self,
        event: Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        let result = self.tx.send(event).map_err(|_| TransportError::Closed);
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_body_yields_one_final_chunk() {
        let mut body = EmptyBody::new();
        match body.next().await.unwrap() {
            Message::Body { data, more_body } => {
                assert!(data.is_empty());
                assert!(!more_body);
            }
        }
        assert!(matches!(body.next().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn channel_receive_yields_messages_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Message::Body {
            data: Bytes::from_static(b"hello"),
            more_body: true,
        })
        .unwrap();
        tx.send(Message::Body {
            data: Bytes::from_static(b" world"),
            more_body: false,
        })
        .unwrap();

        let mut receive = ChannelReceive::new(rx);
        let Message::Body { data, more_body } = receive.next().await.unwrap();
        assert_eq!(&data[..], b"hello");
        assert!(more_body);
        let Message::Body { data, more_body } = receive.next().await.unwrap();
        assert_eq!(&data[..], b" world");
        assert!(!more_body);
    }

    #[tokio::test]
    async fn channel_receive_reports_closed_sender() {
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        drop(tx);
        let mut receive = ChannelReceive::new(rx);
        assert!(matches!(receive.next().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn channel_transmit_delivers_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transmit = ChannelTransmit::new(tx);
        transmit
            .send(Event::Start {
                status: 200,
                headers: vec![],
            })
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(Event::Start { status: 200, .. })
        ));
    }

    #[tokio::test]
    async fn channel_transmit_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut transmit = ChannelTransmit::new(tx);
        let result = transmit
            .send(Event::Body {
                data: Bytes::new(),
                more_body: false,
            })
            .await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
