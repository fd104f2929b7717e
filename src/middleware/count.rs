use std::sync::Arc;

use crate::handler::{BoxFuture, ResponseWriter};
use crate::middleware::recorder::StatusRecorder;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::telemetry::RequestCounter;

/// Counts each request by path and the status the client observed.
///
/// The increment happens after everything downstream has returned, so the
/// recorded status is the final one.
#[derive(Clone)]
pub struct CountRequests {
    counter: Arc<dyn RequestCounter>,
}

impl CountRequests {
    pub fn new(counter: Arc<dyn RequestCounter>) -> Self {
        Self { counter }
    }
}

impl Middleware for CountRequests {
    fn name(&self) -> &'static str {
        "count-request"
    }

    fn handle<'a>(
        &'a self,
        req: Request,
        w: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let path = req.path().to_owned();
            let mut recorder = StatusRecorder::new(w);

            next.run(req, &mut recorder).await;

            self.counter.increment(&path, recorder.status());
        })
    }
}
