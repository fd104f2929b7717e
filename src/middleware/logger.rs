use tracing::info;

use crate::handler::{BoxFuture, ResponseWriter};
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// Logs one line per inbound request, then hands it on untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn name(&self) -> &'static str {
        "log-request"
    }

    fn handle<'a>(
        &'a self,
        req: Request,
        w: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        info!(method = %req.method(), uri = %req.uri(), "HTTP request");
        next.run(req, w)
    }
}
