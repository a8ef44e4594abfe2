//! Outbound response accumulator.
//!
//! A [`Response`] is created fresh per request by the dispatcher, mutated
//! through the middleware chain, and finalized exactly once at the end of
//! dispatch. Once [`finish`](Response::finish) has been called, further
//! mutation is a no-op.

use bytes::Bytes;
use serde_json::Value;

use crate::http::Headers;

/// The response body in its pre-serialization form.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body; serializes to zero bytes.
    #[default]
    Empty,
    /// A JSON value, serialized at finalization with
    /// `content-type: application/json` unless one was set explicitly.
    Json(Value),
    /// A UTF-8 text body, passed through verbatim.
    Text(String),
    /// Raw bytes, passed through verbatim.
    Bytes(Bytes),
}

/// The outbound response under construction.
///
/// # Examples
///
/// ```
/// use trellis::Response;
///
/// let mut response = Response::new();
/// response.set_status(201);
/// response.json(serde_json::json!({ "created": true }));
/// response.set_header("location", "/items/7");
///
/// assert_eq!(response.status(), 201);
/// ```
#[derive(Debug, Default)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Body,
    finished: bool,
}

impl Response {
    /// Creates a `200 OK` response with no headers and an empty body.
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Headers::new(),
            body: Body::Empty,
            finished: false,
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Sets the status code. No-op once the response is finished.
    pub fn set_status(&mut self, status: u16) {
        if !self.finished {
            self.status = status;
        }
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Sets a header (last-write-wins). No-op once the response is finished.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if !self.finished {
            self.headers.set(name, value);
        }
    }

    /// Appends a header entry. No-op once the response is finished.
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if !self.finished {
            self.headers.append(name, value);
        }
    }

    /// Returns the body in its pre-serialization form.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Sets a JSON body. No-op once the response is finished.
    pub fn json(&mut self, value: Value) {
        if !self.finished {
            self.body = Body::Json(value);
        }
    }

    /// Sets a text body. No-op once the response is finished.
    pub fn text(&mut self, text: impl Into<String>) {
        if !self.finished {
            self.body = Body::Text(text.into());
        }
    }

    /// Sets a raw byte body. No-op once the response is finished.
    pub fn bytes(&mut self, data: impl Into<Bytes>) {
        if !self.finished {
            self.body = Body::Bytes(data.into());
        }
    }

    /// Marks the response as finished; all mutators become no-ops.
    ///
    /// Middleware can use this to pin a short-circuit response against
    /// downstream modification.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Returns `true` once [`finish`](Self::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // Serializes the response for the transport: body to bytes, plus
    // content-type for JSON bodies (when unset) and content-length, always.
    // Called exactly once per request, after the chain has completed.
    pub(crate) fn finalize(mut self) -> (u16, Vec<(String, String)>, Bytes) {
        let body = std::mem::take(&mut self.body);
        let is_json = matches!(body, Body::Json(_));
        let data: Bytes = match body {
            Body::Empty => Bytes::new(),
            Body::Json(value) => Bytes::from(value.to_string()),
            Body::Text(text) => Bytes::from(text),
            Body::Bytes(data) => data,
        };

        if is_json && !self.headers.contains("content-type") {
            self.headers.set("content-type", "application/json");
        }
        self.headers.set("content-length", data.len().to_string());

        let headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        (self.status, headers, data)
    }
}
