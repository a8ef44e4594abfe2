//! # trellis
//!
//! A minimal async web framework: a path-pattern router, an Express-style
//! middleware chain, and a dispatcher over a transport-agnostic boundary.
//! The framework owns routing and dispatch; sockets and wire parsing belong
//! to a hosting adapter that speaks [`transport::Scope`], [`transport::Receive`],
//! and [`transport::Transmit`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trellis::{App, Method, PathParams, Scope};
//! use trellis::transport::{ChannelTransmit, EmptyBody};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = App::new();
//!     app.get("/hello/{name}", |params: PathParams| async move {
//!         let name = params.get("name").unwrap_or("world").to_owned();
//!         serde_json::json!({ "message": format!("Hello, {name}") })
//!     })?;
//!
//!     // A hosting adapter would build these from the wire.
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let mut transmit = ChannelTransmit::new(tx);
//!     let scope = Scope::new(Method::Get, "/hello/Ada");
//!     app.dispatch(scope, EmptyBody::new(), &mut transmit).await?;
//!
//!     while let Ok(event) = rx.try_recv() {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod router;
pub mod transport;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::App;
pub use handler::{Handler, HandlerError, HandlerShape, IntoReply, Json, Reply};
pub use http::{Body, Headers, Method, Request, Response};
pub use middleware::{Middleware, Next, RequestLog, from_fn};
pub use router::{PathParams, RegistrationError, Router};
pub use transport::{Event, Message, Scope, TransportError};
