//! Request-scoped propagation context.
//!
//! A [`Context`] is an immutable chain of key/value nodes. Extending it never
//! touches the receiver: [`Context::with_value`] allocates a new head node that
//! points at the old head as its parent, so anything still holding the parent
//! keeps seeing exactly what it saw before.
//!
//! ```text
//!   Context::new()            head: None
//!        ↓ with_group(g)
//!   [GroupKey → g] ─────────→ None
//!        ↓ with_profile(p)
//!   [ProfileKey → p] → [GroupKey → g] → None
//! ```
//!
//! Keys are zero-sized marker types. Lookups compare [`TypeId`]s, so two key
//! types can never collide, and asking for a key that was never attached
//! yields `None` rather than some default value.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::entity::{Group, Profile};

/// A context key. The associated `Value` is the type stored under it.
pub trait Key: 'static {
    type Value: Send + Sync + 'static;

    /// Label used by `Debug` output.
    const NAME: &'static str;
}

struct Node {
    key: TypeId,
    name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

/// Immutable, append-only association carried by one request.
///
/// Cloning is one `Arc` increment; clones share their nodes.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self { head: None }
    }

    /// Returns a new context holding `value` under `K`, with `self` as parent.
    pub fn with_value<K: Key>(&self, value: K::Value) -> Self {
        let node = Node {
            key: TypeId::of::<K>(),
            name: K::NAME,
            value: Arc::new(value),
            parent: self.head.clone(),
        };
        Self { head: Some(Arc::new(node)) }
    }

    /// Looks up the nearest value stored under `K`.
    pub fn value<K: Key>(&self) -> Option<&K::Value> {
        let wanted = TypeId::of::<K>();
        self.nodes()
            .find(|node| node.key == wanted)
            .and_then(|node| node.value.downcast_ref::<K::Value>())
    }

    /// Whether a value is stored under `K`.
    pub fn contains<K: Key>(&self) -> bool {
        self.value::<K>().is_some()
    }

    fn nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::successors(self.head.as_deref(), |node| node.parent.as_deref())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes().map(|node| node.name)).finish()
    }
}

// ── Entity keys ───────────────────────────────────────────────────────────────

/// Key under which the resolved [`Group`] is stored.
pub struct GroupKey;

impl Key for GroupKey {
    type Value = Group;
    const NAME: &'static str = "group";
}

/// Key under which the resolved [`Profile`] is stored.
pub struct ProfileKey;

impl Key for ProfileKey {
    type Value = Profile;
    const NAME: &'static str = "profile";
}

/// Returns a copy of `ctx` extended with `group`.
pub fn with_group(ctx: &Context, group: Group) -> Context {
    ctx.with_value::<GroupKey>(group)
}

/// Returns a copy of `ctx` extended with `profile`.
pub fn with_profile(ctx: &Context, profile: Profile) -> Context {
    ctx.with_value::<ProfileKey>(profile)
}

/// The Group attached to `ctx`, if any.
pub fn group_from(ctx: &Context) -> Option<&Group> {
    ctx.value::<GroupKey>()
}

/// The Profile attached to `ctx`, if any.
pub fn profile_from(ctx: &Context) -> Option<&Profile> {
    ctx.value::<ProfileKey>()
}
