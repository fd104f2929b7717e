//! Radix-tree router for terminal handlers.
//!
//! The router is the innermost handler of the pipeline: by the time a request
//! gets here its context already carries whatever Group and Profile could be
//! resolved. Paths with no registered handler go to the fallback, [`Home`] by
//! default.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, Handler, ResponseWriter};
use crate::home::Home;
use crate::request::Request;

/// Maps request paths to terminal handlers.
///
/// O(path-length) lookup, no allocation on a miss. Build it once at startup.
pub struct Router {
    routes: MatchitRouter<BoxedHandler>,
    fallback: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: MatchitRouter::new(), fallback: Arc::new(Home::default()) }
    }

    /// Registers `handler` for `path`. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax and are read back with
    /// [`Request::param`]:
    ///
    /// ```rust,no_run
    /// # use matchbox_http::{Router, handler};
    /// # let ipxe = handler::from_fn(|_, _| {});
    /// # let assets = handler::from_fn(|_, _| {});
    /// Router::new()
    ///     .route("/ipxe", ipxe)
    ///     .route("/assets/{*file}", assets);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered. Routes are fixed at startup, so this is a programming error.
    pub fn route(mut self, path: &str, handler: impl Handler) -> Self {
        self.routes
            .insert(path, Arc::new(handler))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Replaces the handler for unmatched paths.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Arc::new(handler);
        self
    }

    fn lookup(&self, path: &str) -> Option<(&BoxedHandler, HashMap<String, String>)> {
        let matched = self.routes.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl Handler for Router {
    fn serve<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a, ()> {
        match self.lookup(req.path()) {
            Some((handler, params)) => handler.serve(req.with_params(params), w),
            None => self.fallback.serve(req, w),
        }
    }
}
