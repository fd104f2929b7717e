//! Entities handed out by the matching engine.
//!
//! The pipeline never looks inside these; it stores them in the request
//! [`Context`](crate::Context) and terminal handlers read them back. The
//! fields mirror the provisioning service's stored records so engines and
//! renderers can share one definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A set of machines sharing a Profile, selected by label selectors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub name: String,
    /// Id of the Profile machines in this group boot with.
    pub profile: String,
    /// Labels a machine must carry to match this group.
    pub selector: BTreeMap<String, String>,
    /// Free-form template data.
    pub metadata: serde_json::Value,
}

/// Boot configuration and config references applied to a Group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub ignition_id: String,
    pub generic_id: String,
    pub boot: Option<Boot>,
}

/// Network boot parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Boot {
    pub kernel: String,
    pub initrd: Vec<String>,
    pub args: Vec<String>,
}
