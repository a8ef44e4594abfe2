//! Middleware pipeline — composable before/after logic around route handlers.
//!
//! Each layer receives the request, the response under construction, and a
//! [`Next`] cursor into the remainder of the chain. A layer may:
//!
//! - **Pass through** — call `next.run(request, response).await` unchanged.
//! - **Short-circuit** — return a response without calling `next`; downstream
//!   layers and the route handler never run.
//! - **Decorate** — mutate the request before forwarding, or inspect and
//!   mutate the response afterwards.
//! - **Intercept errors** — match on the `Result` of its `next` call and
//!   substitute a response for an error.
//!
//! The route handler itself runs as the innermost layer of the chain, as do
//! the `404`/`405` fallbacks for unmatched requests. Middleware therefore
//! observes those outcomes as ordinary responses flowing back out, never as
//! errors.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

use crate::handler::{HandlerError, ReplyBody};
use crate::http::{Request, Response};
use crate::router::Resolution;

/// The trait implemented by all middleware.
///
/// Implementations must be `Send + Sync`; a single middleware instance is
/// shared across concurrent dispatches.
///
/// # Examples
///
/// ```rust,no_run
/// use std::future::Future;
/// use std::pin::Pin;
/// use trellis::{HandlerError, Middleware, Next, Request, Response};
///
/// struct ServerHeader;
///
/// impl Middleware for ServerHeader {
///     fn handle(
///         &self,
///         request: Request,
///         response: Response,
///         next: Next,
///     ) -> Pin<Box<dyn Future<Output = Result<Response, HandlerError>> + Send>> {
///         Box::pin(async move {
///             let mut response = next.run(request, response).await?;
///             response.set_header("server", "trellis");
///             Ok(response)
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Handles the request and optionally delegates to the next layer.
    ///
    /// Returning `Err` aborts the chain; the dispatcher converts an uncaught
    /// error into a `400` or `500` response at the boundary.
    fn handle(
        &self,
        request: Request,
        response: Response,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, HandlerError>> + Send>>;
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a layer can forward the
/// request at most once. When the cursor moves past the last layer, the
/// chain's terminal runs the resolved route handler (or produces the
/// `404`/`405` fallback).
pub struct Next {
    layers: Vec<Arc<dyn Middleware>>,
    // Position of the layer to invoke on the next `run` call.
    index: usize,
    terminal: Terminal,
}

impl Next {
    pub(crate) fn new(layers: Vec<Arc<dyn Middleware>>, terminal: Terminal) -> Self {
        Self {
            layers,
            index: 0,
            terminal,
        }
    }

    /// Invokes the next layer in the chain and returns its result.
    ///
    /// # Errors
    ///
    /// Propagates any [`HandlerError`] raised by a downstream layer or the
    /// route handler.
    pub async fn run(
        mut self,
        request: Request,
        response: Response,
    ) -> Result<Response, HandlerError> {
        if self.index < self.layers.len() {
            let layer = Arc::clone(&self.layers[self.index]);
            self.index += 1;
            layer.handle(request, response, self).await
        } else {
            self.terminal.finish(request, response).await
        }
    }
}

// The innermost element of every chain: invokes the resolved handler and
// folds its reply into the response, or synthesizes the 404/405 fallback.
// Running inside the chain means middleware sees those responses on the way
// back out.
pub(crate) struct Terminal {
    resolution: Resolution,
}

impl Terminal {
    pub(crate) fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    async fn finish(
        self,
        request: Request,
        mut response: Response,
    ) -> Result<Response, HandlerError> {
        match self.resolution {
            Resolution::Found { handler, params } => {
                let reply = handler.call(params, request).await?;
                let (body, status) = reply.into_parts();
                if let Some(status) = status {
                    response.set_status(status);
                }
                match body {
                    ReplyBody::Empty => {}
                    ReplyBody::Json(value) => response.json(value),
                    ReplyBody::Text(text) => response.text(text),
                    ReplyBody::Bytes(data) => response.bytes(data),
                }
                Ok(response)
            }
            Resolution::MethodNotAllowed { allow } => {
                let allow = allow
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                tracing::debug!(method = %request.method(), path = request.path(), allow, "method not allowed");
                response.set_status(405);
                response.set_header("allow", allow);
                response.json(serde_json::json!({ "error": "Method Not Allowed" }));
                Ok(response)
            }
            Resolution::NotFound => {
                tracing::debug!(method = %request.method(), path = request.path(), "no route matched");
                response.set_status(404);
                response.json(serde_json::json!({ "error": "Not Found" }));
                Ok(response)
            }
        }
    }
}

/// Adapts an async closure into a [`Middleware`].
///
/// # Examples
///
/// ```rust,no_run
/// use trellis::{Router, middleware::from_fn};
///
/// let mut router = Router::new();
/// router.use_global(from_fn(|request, response, next| async move {
///     let mut response = next.run(request, response).await?;
///     response.set_header("x-powered-by", "trellis");
///     Ok(response)
/// }));
/// ```
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    FromFn(f)
}

/// Function middleware returned by [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    fn handle(
        &self,
        request: Request,
        response: Response,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, HandlerError>> + Send>> {
        Box::pin((self.0)(request, response, next))
    }
}

/// Built-in middleware that logs every request with an id, status, and timing.
///
/// Assigns a monotonically increasing request id, then emits one
/// `tracing::info!` record after the downstream chain completes:
///
/// ```text
/// GET /users/42 - 200 (312µs)
/// ```
///
/// Errors are logged at `error` level and re-propagated untouched.
/// `RequestLog` never short-circuits.
#[derive(Debug, Default)]
pub struct RequestLog {
    counter: AtomicU64,
}

impl RequestLog {
    /// Creates a logger with its id counter at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Middleware for RequestLog {
    fn handle(
        &self,
        request: Request,
        response: Response,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, HandlerError>> + Send>> {
        let request_id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method();
            let path = request.path().to_owned();

            let result = next.run(request, response).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(response) => {
                    tracing::info!(
                        request_id,
                        %method,
                        path,
                        status = response.status(),
                        ?elapsed,
                        "request completed"
                    );
                }
                Err(error) => {
                    tracing::error!(request_id, %method, path, %error, ?elapsed, "request failed");
                }
            }
            result
        })
    }
}
