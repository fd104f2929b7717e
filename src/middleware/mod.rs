//! Middleware layer.
//!
//! Middleware wraps the terminal handler with cross-cutting concerns. Every
//! request passes through the standard stages in this order:
//!
//! ```text
//! RequestLogger → CountRequests → GroupResolver → ProfileResolver → terminal
//!   log line       status recorder   attach Group     attach Profile    router / home
//!                  + counter bump
//! ```
//!
//! Each stage does its work and then calls [`Next::run`] exactly once, waiting
//! for the rest of the chain before it resumes. Nothing in the chain writes a
//! response except the terminal handler, and nothing in the chain can fail a
//! request: a resolver that finds no match simply continues without attaching
//! anything.
//!
//! The order is fixed by [`PipelineBuilder`]. [`Pipeline::from_stages`] builds
//! arbitrary compositions for embedding code and tests.

mod count;
mod logger;
pub mod recorder;
pub mod resolve;

use std::sync::Arc;

pub use count::CountRequests;
pub use logger::RequestLogger;
pub use recorder::StatusRecorder;
pub use resolve::{GroupResolver, ProfileResolver, Resolver};

use crate::handler::{BoxFuture, BoxedHandler, Handler, ResponseWriter};
use crate::labels::{LabelExtractor, QueryLabels};
use crate::matcher::Matcher;
use crate::request::Request;
use crate::telemetry::{PrometheusCounter, RequestCounter};

/// A pipeline stage.
///
/// `handle` receives the request by value, the response writer, and the rest
/// of the chain. Implementations call `next.run(..)` once, passing on either
/// the original request or one rebuilt with [`Request::with_context`].
pub trait Middleware: Send + Sync + 'static {
    /// Short stage name used in logs and by [`Pipeline::stage_names`].
    fn name(&self) -> &'static str;

    fn handle<'a>(
        &'a self,
        req: Request,
        w: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()>;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// Runs the following stage, or the terminal handler when none is left.
    ///
    /// The writer may be borrowed for less than `'a`, which is what lets a
    /// stage substitute a wrapper it owns (see [`StatusRecorder`]).
    pub fn run<'b>(self, req: Request, w: &'b mut dyn ResponseWriter) -> BoxFuture<'b, ()>
    where
        'a: 'b,
    {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next { stages: rest, terminal: self.terminal };
                stage.handle(req, w, next)
            }
            None => self.terminal.serve(req, w),
        }
    }
}

/// Middleware stages composed around a terminal handler.
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
    terminal: BoxedHandler,
}

impl Pipeline {
    /// Starts the standard pipeline around `matcher`.
    pub fn builder(matcher: Arc<dyn Matcher>) -> PipelineBuilder {
        PipelineBuilder {
            matcher,
            counter: Arc::new(PrometheusCounter::default()),
            labels: Arc::new(QueryLabels),
        }
    }

    /// Composes `stages` in the given order, outermost first.
    pub fn from_stages(stages: Vec<Arc<dyn Middleware>>, terminal: BoxedHandler) -> Self {
        Self { stages, terminal }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Handler for Pipeline {
    fn serve<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a, ()> {
        let next = Next { stages: &self.stages, terminal: self.terminal.as_ref() };
        next.run(req, w)
    }
}

/// Builds the standard pipeline.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use matchbox_http::{Matcher, Pipeline, RequestTally, Router};
/// # fn engine() -> Arc<dyn Matcher> { unimplemented!() }
/// let tally = Arc::new(RequestTally::new());
/// let app = Pipeline::builder(engine())
///     .counter(tally.clone())
///     .build(Router::new());
/// ```
pub struct PipelineBuilder {
    matcher: Arc<dyn Matcher>,
    counter: Arc<dyn RequestCounter>,
    labels: Arc<dyn LabelExtractor>,
}

impl PipelineBuilder {
    /// Where request counts go. Defaults to [`PrometheusCounter`].
    pub fn counter(mut self, counter: Arc<dyn RequestCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// How both resolvers derive labels. Defaults to [`QueryLabels`].
    pub fn labels(mut self, labels: Arc<dyn LabelExtractor>) -> Self {
        self.labels = labels;
        self
    }

    /// Wraps `terminal` with logger, counter, group and profile stages.
    pub fn build(self, terminal: impl Handler) -> Pipeline {
        let group = GroupResolver::new(Arc::clone(&self.matcher))
            .with_labels(Arc::clone(&self.labels));
        let profile = ProfileResolver::new(self.matcher).with_labels(self.labels);

        let stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(RequestLogger),
            Arc::new(CountRequests::new(self.counter)),
            Arc::new(group),
            Arc::new(profile),
        ];
        Pipeline::from_stages(stages, Arc::new(terminal))
    }
}
