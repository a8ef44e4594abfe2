//! Application shell — the root router, lifecycle hooks, and the dispatcher.
//!
//! An [`App`] owns the root [`Router`] and drives one request at a time
//! through resolution, the middleware chain, and response finalization. The
//! dispatcher is the only place the framework touches the transport: it emits
//! exactly one [`Event::Start`] followed by one final [`Event::Body`] per
//! request, no matter what the chain did.
//!
//! Handler and middleware errors stop at the dispatch boundary. An uncaught
//! [`HandlerError::Validation`] becomes a `400` carrying its message; any
//! other error becomes a `500` with a generic body, with the detail going to
//! the log and never to the client.

use std::future::Future;
use std::pin::Pin;

use crate::handler::{Handler, HandlerError};
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Next, RequestLog, Terminal};
use crate::router::{RegistrationError, Resolution, Router};
use crate::transport::{Event, Receive, Scope, Transmit, TransportError};

type Hook = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// The application: a root router plus lifecycle hooks and a dispatcher.
///
/// Routes, middleware, and mounts registered on the `App` land on its root
/// router. Registration is meant to complete before serving begins; dispatch
/// only reads the route table, so adding routes after the first request is
/// unsupported.
///
/// # Examples
///
/// ```
/// use trellis::{App, PathParams};
///
/// let mut app = App::new();
/// app.get("/hello/{name}", |params: PathParams| async move {
///     let name = params.get("name").unwrap_or("world").to_owned();
///     serde_json::json!({ "message": format!("Hello, {name}") })
/// })?;
/// # Ok::<(), trellis::RegistrationError>(())
/// ```
pub struct App {
    router: Router,
    on_startup: Vec<Hook>,
    on_shutdown: Vec<Hook>,
}

impl App {
    /// Creates an app with request logging enabled.
    ///
    /// A [`RequestLog`] middleware is installed as the outermost layer; every
    /// dispatch emits one `tracing` record. Use [`bare`](Self::bare) to opt
    /// out.
    pub fn new() -> Self {
        let mut app = Self::bare();
        app.use_global(RequestLog::new());
        app
    }

    /// Creates an app without the built-in request logger.
    pub fn bare() -> Self {
        Self {
            router: Router::new(),
            on_startup: Vec::new(),
            on_shutdown: Vec::new(),
        }
    }

    /// Registers a handler for `GET` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the pattern is malformed.
    pub fn get<H, Args>(&mut self, path: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.router.get(path, handler)
    }

    /// Registers a handler for `POST` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the pattern is malformed.
    pub fn post<H, Args>(&mut self, path: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.router.post(path, handler)
    }

    /// Registers a handler for `PUT` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the pattern is malformed.
    pub fn put<H, Args>(&mut self, path: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.router.put(path, handler)
    }

    /// Registers a handler for `DELETE` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the pattern is malformed.
    pub fn delete<H, Args>(&mut self, path: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.router.delete(path, handler)
    }

    /// Registers a handler for `PATCH` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the pattern is malformed.
    pub fn patch<H, Args>(&mut self, path: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.router.patch(path, handler)
    }

    /// Registers a handler for `OPTIONS` requests matching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the pattern is malformed.
    pub fn options<H, Args>(&mut self, path: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.router.options(path, handler)
    }

    /// Registers a handler for every routed method on `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the pattern is malformed.
    pub fn all<H, Args>(&mut self, path: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.router.all(path, handler)
    }

    /// Registers middleware that runs for every request.
    pub fn use_global<M>(&mut self, middleware: M)
    where
        M: Middleware + 'static,
    {
        self.router.use_global(middleware);
    }

    /// Registers middleware scoped to paths under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the prefix pattern is malformed.
    pub fn use_scoped<M>(&mut self, prefix: &str, middleware: M) -> Result<(), RegistrationError>
    where
        M: Middleware + 'static,
    {
        self.router.use_scoped(prefix, middleware)
    }

    /// Mounts a child router under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the prefix pattern is malformed.
    pub fn mount(&mut self, prefix: &str, child: Router) -> Result<(), RegistrationError> {
        self.router.mount(prefix, child)
    }

    /// Returns the root router.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Registers an async hook to run when the adapter starts serving.
    pub fn on_startup<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_startup.push(Box::new(move || Box::pin(hook())));
    }

    /// Registers an async hook to run when the adapter stops serving.
    pub fn on_shutdown<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_shutdown.push(Box::new(move || Box::pin(hook())));
    }

    /// Runs all startup hooks, awaiting each in registration order.
    ///
    /// Hooks registered after this call are not run retroactively; the
    /// adapter is expected to call `startup` exactly once, before the first
    /// dispatch.
    pub async fn startup(&self) {
        tracing::info!(hooks = self.on_startup.len(), "application starting");
        for hook in &self.on_startup {
            hook().await;
        }
    }

    /// Runs all shutdown hooks, awaiting each in registration order.
    pub async fn shutdown(&self) {
        for hook in &self.on_shutdown {
            hook().await;
        }
        tracing::info!("application stopped");
    }

    /// Dispatches one request through the middleware chain to its handler.
    ///
    /// Resolves the route, stamps captured path parameters onto the request,
    /// assembles the applicable middleware with the handler (or the
    /// `404`/`405` fallback) as the innermost layer, runs the chain, and
    /// writes the finalized response to `transmit`.
    ///
    /// Errors escaping the chain are converted here: `Validation` to a `400`
    /// carrying its message, anything else to a `500` with a generic body.
    /// Error detail never reaches the transmit side.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when `transmit` rejects an event.
    pub async fn dispatch<R, T>(
        &self,
        scope: Scope,
        receive: R,
        transmit: &mut T,
    ) -> Result<(), TransportError>
    where
        R: Receive + 'static,
        T: Transmit + ?Sized,
    {
        let resolution = self.router.resolve(scope.method, &scope.path);
        let layers = self.router.collect_middleware(&scope.path);

        let mut request = Request::new(scope, Box::new(receive));
        if let Resolution::Found { params, .. } = &resolution {
            request.set_params(params.clone());
        }

        let chain = Next::new(layers, Terminal::new(resolution));
        let response = match chain.run(request, Response::new()).await {
            Ok(response) => response,
            Err(HandlerError::Validation(message)) => {
                tracing::debug!(%message, "request rejected by validation");
                let mut response = Response::new();
                response.set_status(400);
                response.json(serde_json::json!({ "error": message }));
                response.finish();
                response
            }
            Err(error) => {
                tracing::error!(%error, "unhandled error during dispatch");
                let mut response = Response::new();
                response.set_status(500);
                response.json(serde_json::json!({ "error": "Internal Server Error" }));
                response.finish();
                response
            }
        };

        let (status, headers, body) = response.finalize();
        transmit.send(Event::Start { status, headers }).await?;
        transmit
            .send(Event::Body {
                data: body,
                more_body: false,
            })
            .await?;
        Ok(())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("router", &self.router)
            .field("startup_hooks", &self.on_startup.len())
            .field("shutdown_hooks", &self.on_shutdown.len())
            .finish()
    }
}
