//! The matching engine seam.
//!
//! Deciding which Group or Profile a machine belongs to is not this crate's
//! job. The resolver stages only need something that answers "given these
//! labels, which entity?", and that is [`Matcher`].

use async_trait::async_trait;

use crate::entity::{Group, Profile};
use crate::labels::LabelSet;

/// Why an entity could not be selected.
///
/// The resolver stages treat every variant the same way: the entity is simply
/// not attached. The distinction only shows up in debug logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("no group matches the given labels")]
    NoMatchingGroup,

    #[error("no profile matches the given labels")]
    NoMatchingProfile,

    #[error("matching engine failure: {0}")]
    Engine(String),
}

/// Selects Groups and Profiles for a set of machine labels.
///
/// Calls are awaited by the resolver stage before the request moves on, so a
/// slow engine delays that request and nothing else.
#[async_trait]
pub trait Matcher: Send + Sync + 'static {
    async fn select_group(&self, labels: &LabelSet) -> Result<Group, MatchError>;

    async fn select_profile(&self, labels: &LabelSet) -> Result<Profile, MatchError>;
}
