//! Route handler adaptation — call shapes and return-value conversion.
//!
//! Handlers come in four shapes, distinguished by what they accept:
//!
//! | Shape              | Signature                                  |
//! |--------------------|--------------------------------------------|
//! | `NoArgs`           | `Fn() -> Future`                           |
//! | `ParamsOnly`       | `Fn(PathParams) -> Future`                 |
//! | `RequestOnly`      | `Fn(Request) -> Future`                    |
//! | `ParamsAndRequest` | `Fn(PathParams, Request) -> Future`        |
//!
//! The shape is determined once at registration through the [`Handler`]
//! marker-trait pattern and cached on the route; it is never re-inspected per
//! call. Whatever the shape, the return value goes through [`IntoReply`] to
//! become the response body: JSON values serialize with
//! `content-type: application/json`, strings and bytes pass through, and a
//! `(value, status)` pair sets the status explicitly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::http::Request;
use crate::router::PathParams;

/// Errors surfaced by handlers and middleware.
///
/// A `Validation` error that reaches the dispatch boundary uncaught becomes a
/// `400` response carrying the message; anything else becomes a `500` with the
/// generic body. Middleware may intercept either by matching on the result of
/// its `next` call.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request failed validation; the message is safe to return to the client.
    #[error("{0}")]
    Validation(String),

    /// The handler failed; the message is logged, never sent to the client.
    #[error("{0}")]
    Internal(String),
}

/// The call shape of a registered handler, computed once at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerShape {
    /// Takes no arguments.
    NoArgs,
    /// Takes the captured path parameters.
    ParamsOnly,
    /// Takes the request object.
    RequestOnly,
    /// Takes path parameters and the request object, in that order.
    ParamsAndRequest,
}

/// A handler's return value, normalized for the dispatcher.
///
/// Usually produced through [`IntoReply`] rather than constructed directly.
#[derive(Debug)]
pub struct Reply {
    body: ReplyBody,
    status: Option<u16>,
}

#[derive(Debug)]
pub(crate) enum ReplyBody {
    Empty,
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl Reply {
    /// An empty reply; the response keeps its current status and body.
    pub fn empty() -> Self {
        Self {
            body: ReplyBody::Empty,
            status: None,
        }
    }

    /// A JSON reply.
    pub fn json(value: Value) -> Self {
        Self {
            body: ReplyBody::Json(value),
            status: None,
        }
    }

    /// A plain-text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            body: ReplyBody::Text(text.into()),
            status: None,
        }
    }

    /// A raw-bytes reply.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self {
            body: ReplyBody::Bytes(data.into()),
            status: None,
        }
    }

    /// Overrides the response status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub(crate) fn into_parts(self) -> (ReplyBody, Option<u16>) {
        (self.body, self.status)
    }
}

/// Conversion of handler return values into a [`Reply`].
///
/// Implemented for JSON values, strings, bytes, `()`, `(value, status)`
/// pairs, and `Result<value, HandlerError>`.
pub trait IntoReply {
    /// Converts the value, failing only when serialization itself fails.
    fn into_reply(self) -> Result<Reply, HandlerError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(self)
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::empty())
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::json(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::text(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::text(self))
    }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::bytes(self))
    }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::bytes(self))
    }
}

impl<R> IntoReply for (R, u16)
where
    R: IntoReply,
{
    fn into_reply(self) -> Result<Reply, HandlerError> {
        let (value, status) = self;
        Ok(value.into_reply()?.with_status(status))
    }
}

impl<R> IntoReply for Result<R, HandlerError>
where
    R: IntoReply,
{
    fn into_reply(self) -> Result<Reply, HandlerError> {
        self?.into_reply()
    }
}

/// Wrapper that serializes any [`Serialize`] type into a JSON reply.
///
/// # Examples
///
/// ```
/// use serde::Serialize;
/// use trellis::Json;
///
/// #[derive(Serialize)]
/// struct Greeting {
///     message: String,
/// }
///
/// async fn hello() -> Json<Greeting> {
///     Json(Greeting { message: "Hello".into() })
/// }
/// ```
#[derive(Debug)]
pub struct Json<T>(pub T);

impl<T> IntoReply for Json<T>
where
    T: Serialize,
{
    fn into_reply(self) -> Result<Reply, HandlerError> {
        let value = serde_json::to_value(self.0)
            .map_err(|e| HandlerError::Internal(format!("JSON serialization failed: {e}")))?;
        Ok(Reply::json(value))
    }
}

/// Conversion trait for async route handlers.
///
/// The `Args` marker type distinguishes the four call shapes so the blanket
/// impls below stay coherent: a plain `Fn() -> Future` and a
/// `Fn(PathParams) -> Future` implement `Handler` with different markers.
/// Registration erases the concrete type and records the shape on the route.
pub trait Handler<Args>: Send + Sync + 'static {
    /// The call shape this handler was registered with.
    fn shape(&self) -> HandlerShape;

    /// Calls the handler, supplying exactly the arguments its shape requires.
    fn invoke(
        &self,
        params: PathParams,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>>;
}

impl<F, Fut, R> Handler<()> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn shape(&self) -> HandlerShape {
        HandlerShape::NoArgs
    }

    fn invoke(
        &self,
        _params: PathParams,
        _request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>> {
        let fut = (self)();
        Box::pin(async move { fut.await.into_reply() })
    }
}

impl<F, Fut, R> Handler<(PathParams,)> for F
where
    F: Fn(PathParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn shape(&self) -> HandlerShape {
        HandlerShape::ParamsOnly
    }

    fn invoke(
        &self,
        params: PathParams,
        _request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>> {
        let fut = (self)(params);
        Box::pin(async move { fut.await.into_reply() })
    }
}

impl<F, Fut, R> Handler<(Request,)> for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn shape(&self) -> HandlerShape {
        HandlerShape::RequestOnly
    }

    fn invoke(
        &self,
        _params: PathParams,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>> {
        let fut = (self)(request);
        Box::pin(async move { fut.await.into_reply() })
    }
}

impl<F, Fut, R> Handler<(PathParams, Request)> for F
where
    F: Fn(PathParams, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn shape(&self) -> HandlerShape {
        HandlerShape::ParamsAndRequest
    }

    fn invoke(
        &self,
        params: PathParams,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>> {
        let fut = (self)(params, request);
        Box::pin(async move { fut.await.into_reply() })
    }
}

// Type-erased handler stored on a route. Cloning shares the underlying
// closure via `Arc`.
type ErasedHandler = Arc<
    dyn Fn(PathParams, Request) -> Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>>
        + Send
        + Sync,
>;

/// A registered handler with its cached call shape.
#[derive(Clone)]
pub(crate) struct RouteHandler {
    func: ErasedHandler,
    shape: HandlerShape,
}

impl RouteHandler {
    pub(crate) fn erase<H, Args>(handler: H) -> Self
    where
        H: Handler<Args>,
    {
        let shape = handler.shape();
        let func: ErasedHandler = Arc::new(move |params, request| handler.invoke(params, request));
        Self { func, shape }
    }

    pub(crate) fn shape(&self) -> HandlerShape {
        self.shape
    }

    pub(crate) fn call(
        &self,
        params: PathParams,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>> {
        (self.func)(params, request)
    }
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandler")
            .field("shape", &self.shape)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use crate::transport::Scope;

    fn request() -> Request {
        Request::without_body(Scope::new(Method::Get, "/"))
    }

    fn params_with(key: &str, value: &str) -> PathParams {
        let mut params = PathParams::new();
        params.insert(key.to_owned(), value.to_owned());
        params
    }

    #[tokio::test]
    async fn no_args_shape() {
        let handler = RouteHandler::erase(|| async { serde_json::json!({ "ok": true }) });
        assert_eq!(handler.shape(), HandlerShape::NoArgs);

        let reply = handler.call(PathParams::new(), request()).await.unwrap();
        let (body, status) = reply.into_parts();
        assert!(status.is_none());
        assert!(matches!(body, ReplyBody::Json(v) if v == serde_json::json!({ "ok": true })));
    }

    #[tokio::test]
    async fn params_only_shape() {
        let handler = RouteHandler::erase(|params: PathParams| async move {
            let name = params.get("name").unwrap_or("unknown").to_owned();
            serde_json::json!({ "message": format!("Hello, {name}") })
        });
        assert_eq!(handler.shape(), HandlerShape::ParamsOnly);

        let reply = handler
            .call(params_with("name", "Ada"), request())
            .await
            .unwrap();
        let (body, _) = reply.into_parts();
        assert!(
            matches!(body, ReplyBody::Json(v) if v == serde_json::json!({ "message": "Hello, Ada" }))
        );
    }

    #[tokio::test]
    async fn request_only_shape() {
        let handler = RouteHandler::erase(|req: Request| async move { req.path().to_owned() });
        assert_eq!(handler.shape(), HandlerShape::RequestOnly);

        let reply = handler.call(PathParams::new(), request()).await.unwrap();
        let (body, _) = reply.into_parts();
        assert!(matches!(body, ReplyBody::Text(s) if s == "/"));
    }

    #[tokio::test]
    async fn params_and_request_shape() {
        let handler = RouteHandler::erase(|params: PathParams, req: Request| async move {
            format!("{}:{}", req.method(), params.get("id").unwrap_or("?"))
        });
        assert_eq!(handler.shape(), HandlerShape::ParamsAndRequest);

        let reply = handler
            .call(params_with("id", "42"), request())
            .await
            .unwrap();
        let (body, _) = reply.into_parts();
        assert!(matches!(body, ReplyBody::Text(s) if s == "GET:42"));
    }

    #[tokio::test]
    async fn tuple_return_sets_status() {
        let handler = RouteHandler::erase(|| async { ("created", 201) });
        let reply = handler.call(PathParams::new(), request()).await.unwrap();
        let (body, status) = reply.into_parts();
        assert_eq!(status, Some(201));
        assert!(matches!(body, ReplyBody::Text(s) if s == "created"));
    }

    #[tokio::test]
    async fn result_return_propagates_error() {
        let handler = RouteHandler::erase(|| async {
            Err::<Reply, HandlerError>(HandlerError::Internal("boom".into()))
        });
        let err = handler
            .call(PathParams::new(), request())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Internal(msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn json_wrapper_serializes_struct() {
        #[derive(Serialize)]
        struct Item {
            id: u32,
        }

        let handler = RouteHandler::erase(|| async { Json(Item { id: 7 }) });
        let reply = handler.call(PathParams::new(), request()).await.unwrap();
        let (body, _) = reply.into_parts();
        assert!(matches!(body, ReplyBody::Json(v) if v == serde_json::json!({ "id": 7 })));
    }

    #[tokio::test]
    async fn bytes_return_passes_through() {
        let handler = RouteHandler::erase(|| async { vec![0xde, 0xad] });
        let reply = handler.call(PathParams::new(), request()).await.unwrap();
        let (body, _) = reply.into_parts();
        assert!(matches!(body, ReplyBody::Bytes(b) if b.as_ref() == &[0xde, 0xad][..]));
    }

    #[tokio::test]
    async fn unit_return_is_empty_reply() {
        let handler = RouteHandler::erase(|| async {});
        let reply = handler.call(PathParams::new(), request()).await.unwrap();
        let (body, status) = reply.into_parts();
        assert!(matches!(body, ReplyBody::Empty));
        assert!(status.is_none());
    }
}
