//! Inbound request wrapper with idempotent body buffering.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;

use crate::handler::HandlerError;
use crate::http::{Headers, Method};
use crate::router::PathParams;
use crate::transport::{EmptyBody, Message, Receive, Scope, TransportError};

/// An inbound HTTP request.
///
/// Wraps the transport [`Scope`] together with the body stream. Path
/// parameters are stamped on by the dispatcher after route resolution and are
/// read-only afterwards.
///
/// The body is read lazily: the first call to [`body`](Self::body) drains the
/// transport stream and caches the bytes; every later call returns the cached
/// bytes without touching the transport again.
///
/// # Examples
///
/// ```
/// use trellis::{Method, Request, Scope};
///
/// let scope = Scope::new(Method::Get, "/search").with_query("q=rust&page=2");
/// let request = Request::without_body(scope);
///
/// assert_eq!(request.path(), "/search");
/// assert_eq!(request.query_param("q"), Some("rust"));
/// assert_eq!(request.query_param("page"), Some("2"));
/// ```
pub struct Request {
    scope: Scope,
    receive: Box<dyn Receive>,
    cached_body: Option<Bytes>,
    query_params: HashMap<String, String>,
    params: PathParams,
}

impl Request {
    /// Creates a request from a transport scope and body stream.
    pub fn new(scope: Scope, receive: Box<dyn Receive>) -> Self {
        let query_params = scope
            .query_string
            .as_deref()
            .map(parse_query_string)
            .unwrap_or_default();
        Self {
            scope,
            receive,
            cached_body: None,
            query_params,
            params: PathParams::new(),
        }
    }

    /// Creates a request with an empty body. Convenient for tests and for
    /// methods that carry no payload.
    pub fn without_body(scope: Scope) -> Self {
        Self::new(scope, Box::new(EmptyBody::new()))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.scope.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.scope.path
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.scope.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.scope.query_string.as_deref()
    }

    /// Returns a parsed query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).map(String::as_str)
    }

    /// Returns the peer address, when the adapter supplied one.
    pub fn client(&self) -> Option<SocketAddr> {
        self.scope.client
    }

    /// Returns the path parameters captured by the matched route.
    ///
    /// Empty until the dispatcher resolves a route, and for requests that did
    /// not match any route.
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    // Set exactly once by the dispatcher, before the middleware chain runs.
    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    /// Reads the complete request body.
    ///
    /// The first call drains the transport stream until a chunk arrives with
    /// `more_body == false` and caches the result. Subsequent calls return the
    /// cached bytes; the transport is never drained twice.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the stream closes before the final chunk.
    pub async fn body(&mut self) -> Result<Bytes, TransportError> {
        if let Some(cached) = &self.cached_body {
            return Ok(cached.clone());
        }

        let mut buf = BytesMut::new();
        loop {
            let Message::Body { data, more_body } = self.receive.next().await?;
            buf.extend_from_slice(&data);
            if !more_body {
                break;
            }
        }

        let body = buf.freeze();
        self.cached_body = Some(body.clone());
        Ok(body)
    }

    /// Reads the body and deserializes it as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Validation`] when the body is not valid JSON
    /// for `T`, and [`HandlerError::Internal`] when the transport fails.
    pub async fn json<T>(&mut self) -> Result<T, HandlerError>
    where
        T: DeserializeOwned,
    {
        let body = self
            .body()
            .await
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        serde_json::from_slice(&body)
            .map_err(|e| HandlerError::Validation(format!("invalid JSON in request body: {e}")))
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.scope.method)
            .field("path", &self.scope.path)
            .field("params", &self.params)
            .field("body_cached", &self.cached_body.is_some())
            .finish()
    }
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
///
/// Keys and values have `+` decoded as a space. Percent-decoding is left to
/// the transport adapter.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.replace('+', " ");
            let value = parts.next().unwrap_or("").replace('+', " ");
            Some((key, value))
        })
        .collect()
}
