//! Group and Profile resolver stages.
//!
//! Both stages do the same thing for a different entity kind: extract labels,
//! ask the [`Matcher`], and on success hand the next stage a request whose
//! context carries the entity. On failure the request continues with its
//! original context. A resolver never writes a response; deciding what a
//! missing Group or Profile means is up to the terminal handler.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::context::{GroupKey, Key, ProfileKey};
use crate::entity::{Group, Profile};
use crate::handler::{BoxFuture, ResponseWriter};
use crate::labels::{LabelExtractor, LabelSet, QueryLabels};
use crate::matcher::{MatchError, Matcher};
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// An entity kind a [`Resolver`] can attach.
pub trait EntityKind: Send + Sync + 'static {
    /// Context key the entity is stored under.
    type Key: Key;

    /// Stage name, as reported by [`Middleware::name`].
    const STAGE: &'static str;

    fn select<'a>(
        matcher: &'a dyn Matcher,
        labels: &'a LabelSet,
    ) -> BoxFuture<'a, Result<<Self::Key as Key>::Value, MatchError>>;
}

/// Selects a [`Group`].
pub enum GroupKind {}

impl EntityKind for GroupKind {
    type Key = GroupKey;
    const STAGE: &'static str = "select-group";

    fn select<'a>(
        matcher: &'a dyn Matcher,
        labels: &'a LabelSet,
    ) -> BoxFuture<'a, Result<Group, MatchError>> {
        matcher.select_group(labels)
    }
}

/// Selects a [`Profile`].
pub enum ProfileKind {}

impl EntityKind for ProfileKind {
    type Key = ProfileKey;
    const STAGE: &'static str = "select-profile";

    fn select<'a>(
        matcher: &'a dyn Matcher,
        labels: &'a LabelSet,
    ) -> BoxFuture<'a, Result<Profile, MatchError>> {
        matcher.select_profile(labels)
    }
}

/// Middleware attaching an entity of kind `K` to the request context.
pub struct Resolver<K> {
    matcher: Arc<dyn Matcher>,
    labels: Arc<dyn LabelExtractor>,
    kind: PhantomData<fn() -> K>,
}

pub type GroupResolver = Resolver<GroupKind>;
pub type ProfileResolver = Resolver<ProfileKind>;

impl<K: EntityKind> Resolver<K> {
    /// A resolver extracting labels from the query string.
    pub fn new(matcher: Arc<dyn Matcher>) -> Self {
        Self { matcher, labels: Arc::new(QueryLabels), kind: PhantomData }
    }

    /// Replaces the label extractor.
    pub fn with_labels(mut self, labels: Arc<dyn LabelExtractor>) -> Self {
        self.labels = labels;
        self
    }
}

impl<K> Clone for Resolver<K> {
    fn clone(&self) -> Self {
        Self {
            matcher: Arc::clone(&self.matcher),
            labels: Arc::clone(&self.labels),
            kind: PhantomData,
        }
    }
}

impl<K: EntityKind> Middleware for Resolver<K> {
    fn name(&self) -> &'static str {
        K::STAGE
    }

    fn handle<'a>(
        &'a self,
        req: Request,
        w: &'a mut dyn ResponseWriter,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            // An attached entity is never replaced.
            if req.context().contains::<K::Key>() {
                debug!(stage = K::STAGE, "entity already attached");
                return next.run(req, w).await;
            }

            let labels = self.labels.extract(&req);
            let req = match K::select(self.matcher.as_ref(), &labels).await {
                Ok(entity) => {
                    debug!(stage = K::STAGE, path = %req.path(), "entity attached");
                    let ctx = req.context().with_value::<K::Key>(entity);
                    req.with_context(ctx)
                }
                Err(reason) => {
                    debug!(stage = K::STAGE, path = %req.path(), %reason, "entity not resolved");
                    req
                }
            };

            next.run(req, w).await;
        })
    }
}
