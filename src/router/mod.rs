//! Request routing — map URL patterns and HTTP methods to handler functions.
//!
//! This module provides [`Router`], which resolves incoming requests to
//! registered handlers by method and path. Patterns are sequences of `/`
//! separated segments, each either a literal or a `{name}` placeholder:
//!
//! | Pattern                   | Example match      | Captured params              |
//! |---------------------------|--------------------|------------------------------|
//! | `/users`                  | `/users`           | *(none)*                     |
//! | `/users/{id}`             | `/users/42`        | `id → "42"`                  |
//! | `/users/{id}/posts/{pid}` | `/users/7/posts/9` | `id → "7"`, `pid → "9"`      |
//!
//! A placeholder captures exactly one segment; a pattern with N segments only
//! matches paths with exactly N segments. Literal segments compare
//! case-sensitively. Trailing slashes are normalized on both patterns and
//! incoming paths, so `/users/` and `/users` are treated as equivalent.
//!
//! Routers compose: [`Router::mount`] attaches a child router under a path
//! prefix, conceptually prepending the prefix to every child route. Mount
//! prefixes may themselves contain placeholders; their captures are merged
//! into the final parameter map (child captures win on name collision).
//! Because `mount` takes the child by value, a router tree cannot contain
//! cycles.
//!
//! Resolution distinguishes three outcomes so the dispatcher can tell 404
//! from 405: a handler match, a path that only matches under other methods
//! (with the allowed set), or no match at all.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::handler::{Handler, RouteHandler};
use crate::http::Method;
use crate::middleware::Middleware;

/// Path parameters captured from a matched route pattern.
///
/// Values are the raw segment strings; no decoding beyond what the transport
/// adapter already performed.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a captured value.
    pub fn insert(&mut self, name: String, value: String) {
        self.map.insert(name, value);
    }

    /// Returns the captured value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Returns `true` if `name` was captured.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Returns the number of captured parameters.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns an iterator over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // Merge `other` into self; entries in `other` win on collision.
    pub(crate) fn extend(&mut self, other: PathParams) {
        self.map.extend(other.map);
    }
}

/// Errors raised synchronously at registration time.
///
/// Registration failures are fatal to startup by design: a malformed pattern
/// is reported when the route is added, never deferred to the first request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The same parameter name appears twice in one pattern.
    #[error("duplicate path parameter `{name}` in pattern `{pattern}`")]
    DuplicateParam { name: String, pattern: String },

    /// A segment mixes literal characters and braces, or has an empty name.
    #[error("malformed segment `{segment}` in pattern `{pattern}`")]
    MalformedSegment { segment: String, pattern: String },
}

// A single path segment, either a literal string or a named capture (`{name}`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compiles a pattern string into segment descriptors.
    ///
    /// A trailing slash (other than on the root `/`) is stripped before
    /// compilation so that `/users/` and `/users` compile identically.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::MalformedSegment`] for segments like `a{b}`,
    ///   `{}`, or stray braces.
    /// - [`RegistrationError::DuplicateParam`] when a parameter name repeats.
    pub(crate) fn parse(pattern: &str) -> Result<Self, RegistrationError> {
        let raw = normalize(pattern).to_owned();

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        for part in raw.split('/').filter(|s| !s.is_empty()) {
            if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if inner.is_empty() || inner.contains(['{', '}']) {
                    return Err(RegistrationError::MalformedSegment {
                        segment: part.to_owned(),
                        pattern: raw.clone(),
                    });
                }
                if names.contains(&inner) {
                    return Err(RegistrationError::DuplicateParam {
                        name: inner.to_owned(),
                        pattern: raw.clone(),
                    });
                }
                names.push(inner);
                segments.push(Segment::Param(inner.to_owned()));
            } else if part.contains(['{', '}']) {
                return Err(RegistrationError::MalformedSegment {
                    segment: part.to_owned(),
                    pattern: raw.clone(),
                });
            } else {
                segments.push(Segment::Literal(part.to_owned()));
            }
        }

        Ok(Self { raw, segments })
    }

    /// The normalized pattern string this was compiled from.
    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }

    // Try to match `path` exactly, returning captured params on success.
    pub(crate) fn matches(&self, path: &str) -> Option<PathParams> {
        let path = normalize(path);
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_owned());
                }
            }
        }

        Some(params)
    }

    // Match this pattern against a leading portion of `path`. On success,
    // returns the captured params and the remaining path (always starting
    // with `/`, `"/"` when fully consumed). Used for mounts and for
    // path-scoped middleware prefixes.
    pub(crate) fn prefix_matches(&self, path: &str) -> Option<(PathParams, String)> {
        let path = normalize(path);
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if parts.len() < self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_owned());
                }
            }
        }

        let rest = &parts[self.segments.len()..];
        let remainder = if rest.is_empty() {
            "/".to_owned()
        } else {
            format!("/{}", rest.join("/"))
        };
        Some((params, remainder))
    }
}

// Strip a single trailing slash, except on the root path.
fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A single registered route binding a method + pattern to a handler.
#[derive(Debug)]
struct Route {
    method: Method,
    pattern: Pattern,
    handler: RouteHandler,
}

/// Outcome of resolving a request against a router tree.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// A route matched; carries the handler and the merged path parameters.
    Found {
        handler: RouteHandler,
        params: PathParams,
    },
    /// The path matches at least one route, but not for this method.
    MethodNotAllowed { allow: Vec<Method> },
    /// No registered pattern matches the path.
    NotFound,
}

/// A composable route table with per-path middleware.
///
/// Routes are registered through the method helpers ([`get`](Self::get),
/// [`post`](Self::post), ...); middleware through [`use_global`](Self::use_global)
/// and [`use_scoped`](Self::use_scoped); child routers through
/// [`mount`](Self::mount). Registering the same method + pattern twice
/// replaces the earlier handler (last registration wins).
///
/// The table is meant to be fully populated before serving begins; resolution
/// only reads it, so concurrent dispatch needs no locking. Registering routes
/// after serving starts is unsupported.
///
/// # Examples
///
/// ```
/// use trellis::{PathParams, Router};
///
/// let mut router = Router::new();
/// router.get("/users/{id}", |params: PathParams| async move {
///     serde_json::json!({ "id": params.get("id") })
/// })?;
/// # Ok::<(), trellis::RegistrationError>(())
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    middleware: Vec<(Option<Pattern>, Arc<dyn Middleware>)>,
    mounts: Vec<(Pattern, Router)>,
}

impl Router {
    /// Creates a new, empty `Router`.
    pub fn new() -> Self {
        Self::default()
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
        self.add_route(Method::Get, path, RouteHandler::erase(handler))
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
        self.add_route(Method::Post, path, RouteHandler::erase(handler))
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
        self.add_route(Method::Put, path, RouteHandler::erase(handler))
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
        self.add_route(Method::Delete, path, RouteHandler::erase(handler))
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
        self.add_route(Method::Patch, path, RouteHandler::erase(handler))
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
        self.add_route(Method::Options, path, RouteHandler::erase(handler))
    }

    /// Registers a handler for every routed method on `path`.
    ///
    /// Equivalent to registering the same handler under each method
    /// individually, so a 405 for this path can never occur and the `Allow`
    /// set lists every method.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the pattern is malformed.
    pub fn all<H, Args>(&mut self, path: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        let handler = RouteHandler::erase(handler);
        for method in Method::ALL {
            self.add_route(method, path, handler.clone())?;
        }
        Ok(())
    }

    fn add_route(
        &mut self,
        method: Method,
        path: &str,
        handler: RouteHandler,
    ) -> Result<(), RegistrationError> {
        let pattern = Pattern::parse(path)?;
        tracing::debug!(method = %method, path = pattern.raw(), "route registered");

        // Last registration wins for an identical (method, pattern) pair.
        match self
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.pattern.raw() == pattern.raw())
        {
            Some(existing) => existing.handler = handler,
            None => self.routes.push(Route {
                method,
                pattern,
                handler,
            }),
        }
        Ok(())
    }

    /// Registers middleware that runs for every path under this router.
    pub fn use_global<M>(&mut self, middleware: M)
    where
        M: Middleware + 'static,
    {
        self.middleware.push((None, Arc::new(middleware)));
    }

    /// Registers middleware scoped to paths under `prefix`.
    ///
    /// The prefix uses the same segment syntax as route patterns and matches
    /// any path it is a leading portion of: middleware scoped to `/api` runs
    /// for `/api`, `/api/users`, and so on.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the prefix pattern is malformed.
    pub fn use_scoped<M>(&mut self, prefix: &str, middleware: M) -> Result<(), RegistrationError>
    where
        M: Middleware + 'static,
    {
        let pattern = Pattern::parse(prefix)?;
        self.middleware.push((Some(pattern), Arc::new(middleware)));
        Ok(())
    }

    /// Mounts a child router under `prefix`.
    ///
    /// Every route and middleware registration in the child behaves as if its
    /// pattern had `prefix` prepended. Placeholders in `prefix` capture into
    /// the parameter map; on a name collision the child's own capture wins.
    ///
    /// The child is moved into this router, so a mount relation is exclusive
    /// and the router tree cannot contain cycles.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the prefix pattern is malformed.
    pub fn mount(&mut self, prefix: &str, child: Router) -> Result<(), RegistrationError> {
        let pattern = Pattern::parse(prefix)?;
        tracing::debug!(prefix = pattern.raw(), "router mounted");
        self.mounts.push((pattern, child));
        Ok(())
    }

    /// Returns the number of routes registered directly on this router,
    /// excluding mounted children.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered directly on this router.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    // Resolve a request against this router tree. The path is checked
    // method-blind first so the dispatcher can distinguish 404 from 405.
    pub(crate) fn resolve(&self, method: Method, path: &str) -> Resolution {
        if let Some((handler, params)) = self.find(method, path, &PathParams::new()) {
            return Resolution::Found { handler, params };
        }
        let allow = self.allowed_methods(path);
        if allow.is_empty() {
            Resolution::NotFound
        } else {
            Resolution::MethodNotAllowed { allow }
        }
    }

    fn find(
        &self,
        method: Method,
        path: &str,
        inherited: &PathParams,
    ) -> Option<(RouteHandler, PathParams)> {
        for route in &self.routes {
            if route.method != method {
                continue;
            }
            if let Some(captured) = route.pattern.matches(path) {
                let mut params = inherited.clone();
                params.extend(captured);
                return Some((route.handler.clone(), params));
            }
        }

        for (prefix, child) in &self.mounts {
            if let Some((captured, rest)) = prefix.prefix_matches(path) {
                let mut params = inherited.clone();
                params.extend(captured);
                if let Some(found) = child.find(method, &rest, &params) {
                    return Some(found);
                }
            }
        }

        None
    }

    // Every method with a route matching `path`, across the whole tree,
    // deduplicated in first-seen order. Non-empty means 405 territory.
    pub(crate) fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut allow = Vec::new();
        self.collect_allowed(path, &mut allow);
        allow
    }

    fn collect_allowed(&self, path: &str, allow: &mut Vec<Method>) {
        for route in &self.routes {
            if route.pattern.matches(path).is_some() && !allow.contains(&route.method) {
                allow.push(route.method);
            }
        }
        for (prefix, child) in &self.mounts {
            if let Some((_, rest)) = prefix.prefix_matches(path) {
                child.collect_allowed(&rest, allow);
            }
        }
    }

    // Middleware applicable to `path`, in execution order: this router's
    // global middleware (registration order), then its matching path-scoped
    // middleware (registration order), then matching mounted children,
    // recursively with the mount prefix stripped.
    pub(crate) fn collect_middleware(&self, path: &str) -> Vec<Arc<dyn Middleware>> {
        let mut layers = Vec::new();
        self.collect_layers(path, &mut layers);
        layers
    }

    fn collect_layers(&self, path: &str, layers: &mut Vec<Arc<dyn Middleware>>) {
        for (prefix, middleware) in &self.middleware {
            if prefix.is_none() {
                layers.push(Arc::clone(middleware));
            }
        }
        for (prefix, middleware) in &self.middleware {
            if let Some(prefix) = prefix {
                if prefix.prefix_matches(path).is_some() {
                    layers.push(Arc::clone(middleware));
                }
            }
        }
        for (prefix, child) in &self.mounts {
            if let Some((_, rest)) = prefix.prefix_matches(path) {
                child.collect_layers(&rest, layers);
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware.len())
            .field("mounts", &self.mounts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ReplyBody;
    use crate::http::Request;
    use crate::transport::Scope;

    async fn ok() -> &'static str {
        "ok"
    }

    // ── Pattern::parse ────────────────────────────────────────────────────────

    #[test]
    fn pattern_parse_root() {
        let pat = Pattern::parse("/").unwrap();
        assert_eq!(pat.raw(), "/");
        assert!(pat.segments.is_empty());
    }

    #[test]
    fn pattern_parse_literals_and_params() {
        let pat = Pattern::parse("/users/{id}/posts/{post_id}").unwrap();
        assert_eq!(pat.segments.len(), 4);
        assert_eq!(pat.segments[0], Segment::Literal("users".into()));
        assert_eq!(pat.segments[1], Segment::Param("id".into()));
        assert_eq!(pat.segments[3], Segment::Param("post_id".into()));
    }

    #[test]
    fn pattern_parse_trailing_slash_stripped() {
        assert_eq!(Pattern::parse("/users/").unwrap().raw(), "/users");
    }

    #[test]
    fn pattern_parse_rejects_duplicate_params() {
        let err = Pattern::parse("/users/{id}/friends/{id}").unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateParam {
                name: "id".into(),
                pattern: "/users/{id}/friends/{id}".into(),
            }
        );
    }

    #[test]
    fn pattern_parse_rejects_malformed_segments() {
        assert!(matches!(
            Pattern::parse("/users/{}"),
            Err(RegistrationError::MalformedSegment { .. })
        ));
        assert!(matches!(
            Pattern::parse("/users/x{id}"),
            Err(RegistrationError::MalformedSegment { .. })
        ));
        assert!(matches!(
            Pattern::parse("/users/{id"),
            Err(RegistrationError::MalformedSegment { .. })
        ));
    }

    // ── Pattern::matches ──────────────────────────────────────────────────────

    #[test]
    fn pattern_exact_match() {
        let pat = Pattern::parse("/users").unwrap();
        assert!(pat.matches("/users").is_some());
        assert!(pat.matches("/users/").is_some());
        assert!(pat.matches("/posts").is_none());
    }

    #[test]
    fn pattern_literals_are_case_sensitive() {
        let pat = Pattern::parse("/Users").unwrap();
        assert!(pat.matches("/Users").is_some());
        assert!(pat.matches("/users").is_none());
    }

    #[test]
    fn pattern_param_extracts_value() {
        let pat = Pattern::parse("/users/{id}").unwrap();
        let params = pat.matches("/users/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
    }

    #[test]
    fn pattern_param_wrong_segment_count() {
        let pat = Pattern::parse("/users/{id}").unwrap();
        assert!(pat.matches("/users").is_none());
        assert!(pat.matches("/users/42/extra").is_none());
    }

    #[test]
    fn pattern_multi_param_extracts_all() {
        let pat = Pattern::parse("/users/{id}/posts/{post_id}").unwrap();
        let params = pat.matches("/users/7/posts/99").unwrap();
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("post_id"), Some("99"));
    }

    #[test]
    fn pattern_root_matches_only_root() {
        let pat = Pattern::parse("/").unwrap();
        assert!(pat.matches("/").is_some());
        assert!(pat.matches("/other").is_none());
    }

    // ── Pattern::prefix_matches ───────────────────────────────────────────────

    #[test]
    fn prefix_match_strips_consumed_segments() {
        let pat = Pattern::parse("/api").unwrap();
        let (params, rest) = pat.prefix_matches("/api/users/42").unwrap();
        assert!(params.is_empty());
        assert_eq!(rest, "/users/42");
    }

    #[test]
    fn prefix_match_exact_leaves_root() {
        let pat = Pattern::parse("/api").unwrap();
        let (_, rest) = pat.prefix_matches("/api").unwrap();
        assert_eq!(rest, "/");
    }

    #[test]
    fn prefix_match_captures_params() {
        let pat = Pattern::parse("/users/{user_id}").unwrap();
        let (params, rest) = pat.prefix_matches("/users/42/posts/7").unwrap();
        assert_eq!(params.get("user_id"), Some("42"));
        assert_eq!(rest, "/posts/7");
    }

    #[test]
    fn prefix_match_rejects_mismatch() {
        let pat = Pattern::parse("/api").unwrap();
        assert!(pat.prefix_matches("/admin/users").is_none());
        assert!(Pattern::parse("/api/v2").unwrap().prefix_matches("/api").is_none());
    }

    // ── Router::resolve ───────────────────────────────────────────────────────

    #[test]
    fn resolve_found() {
        let mut router = Router::new();
        router.get("/hello/{name}", ok).unwrap();

        match router.resolve(Method::Get, "/hello/Ada") {
            Resolution::Found { params, .. } => assert_eq!(params.get("name"), Some("Ada")),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn resolve_not_found() {
        let mut router = Router::new();
        router.get("/hello", ok).unwrap();
        assert!(matches!(
            router.resolve(Method::Get, "/goodbye"),
            Resolution::NotFound
        ));
    }

    #[test]
    fn resolve_wrong_method_lists_allowed() {
        let mut router = Router::new();
        router.post("/items", ok).unwrap();
        router.put("/items", ok).unwrap();

        match router.resolve(Method::Get, "/items") {
            Resolution::MethodNotAllowed { allow } => {
                assert_eq!(allow.len(), 2);
                assert!(allow.contains(&Method::Post));
                assert!(allow.contains(&Method::Put));
            }
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut router = Router::new();
        router.get("/users/{id}", ok).unwrap();

        for _ in 0..2 {
            match router.resolve(Method::Get, "/users/9") {
                Resolution::Found { params, .. } => assert_eq!(params.get("id"), Some("9")),
                other => panic!("expected Found, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn duplicate_registration_last_wins() {
        let mut router = Router::new();
        router.get("/path", || async { "first" }).unwrap();
        router.get("/path", || async { "second" }).unwrap();
        assert_eq!(router.len(), 1);

        // The surviving route must invoke the handler registered last.
        let handler = match router.resolve(Method::Get, "/path") {
            Resolution::Found { handler, .. } => handler,
            other => panic!("expected Found, got {other:?}"),
        };
        let request = Request::without_body(Scope::new(Method::Get, "/path"));
        let reply = handler.call(PathParams::new(), request).await.unwrap();
        let (body, _) = reply.into_parts();
        assert!(matches!(body, ReplyBody::Text(s) if s == "second"));
    }

    #[test]
    fn all_registers_every_method() {
        let mut router = Router::new();
        router.all("/anything", ok).unwrap();
        assert_eq!(router.len(), Method::ALL.len());
        for method in Method::ALL {
            assert!(matches!(
                router.resolve(method, "/anything"),
                Resolution::Found { .. }
            ));
        }
    }

    #[test]
    fn registration_error_propagates() {
        let mut router = Router::new();
        assert!(router.get("/bad/{x}/{x}", ok).is_err());
    }

    // ── Mounting ──────────────────────────────────────────────────────────────

    #[test]
    fn mounted_routes_resolve_under_prefix() {
        let mut api = Router::new();
        api.get("/users", ok).unwrap();

        let mut root = Router::new();
        root.mount("/api", api).unwrap();

        assert!(matches!(
            root.resolve(Method::Get, "/api/users"),
            Resolution::Found { .. }
        ));
        assert!(matches!(
            root.resolve(Method::Get, "/users"),
            Resolution::NotFound
        ));
    }

    #[test]
    fn mount_merges_prefix_params_child_wins() {
        let mut posts = Router::new();
        posts.get("/posts/{post_id}", ok).unwrap();

        let mut root = Router::new();
        root.mount("/users/{user_id}", posts).unwrap();

        match root.resolve(Method::Get, "/users/42/posts/7") {
            Resolution::Found { params, .. } => {
                assert_eq!(params.get("user_id"), Some("42"));
                assert_eq!(params.get("post_id"), Some("7"));
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn mount_param_collision_child_takes_precedence() {
        let mut child = Router::new();
        child.get("/items/{id}", ok).unwrap();

        let mut root = Router::new();
        root.mount("/tenants/{id}", child).unwrap();

        match root.resolve(Method::Get, "/tenants/outer/items/inner") {
            Resolution::Found { params, .. } => assert_eq!(params.get("id"), Some("inner")),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn nested_mounts_resolve() {
        let mut leaf = Router::new();
        leaf.get("/ping", ok).unwrap();

        let mut middle = Router::new();
        middle.mount("/v1", leaf).unwrap();

        let mut root = Router::new();
        root.mount("/api", middle).unwrap();

        assert!(matches!(
            root.resolve(Method::Get, "/api/v1/ping"),
            Resolution::Found { .. }
        ));
    }

    #[test]
    fn mounted_route_wrong_method_reported_as_405() {
        let mut api = Router::new();
        api.post("/items", ok).unwrap();

        let mut root = Router::new();
        root.mount("/api", api).unwrap();

        match root.resolve(Method::Get, "/api/items") {
            Resolution::MethodNotAllowed { allow } => assert_eq!(allow, vec![Method::Post]),
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
    }
}
