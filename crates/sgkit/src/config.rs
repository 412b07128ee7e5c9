//! Typed per-group configuration.
//!
//! Each group file deserializes into a [`GroupConfig`]. Loading and
//! templating the files is the caller's job; this module only describes
//! the schema and its defaults.

use crate::error::Result;
use crate::types::{DEFAULT_GROUP_REGION, Direction, GroupRef, PortRange, Protocol};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Desired state of one security group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GroupConfig {
    /// Region the group lives in (defaults to `us-east-1`)
    #[serde(default)]
    pub region: Option<String>,

    /// VPC the group is created in. Only needed for groups that don't exist yet.
    #[serde(default)]
    pub vpc: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub inbound: Vec<RuleSpec>,

    #[serde(default)]
    pub outbound: Vec<RuleSpec>,
}

impl GroupConfig {
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_GROUP_REGION)
    }

    pub fn rules(&self, direction: Direction) -> &[RuleSpec] {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    /// Description used when creating the group.
    pub fn description_for(&self, name: &str) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Managed security group {name}"))
    }
}

/// One configured rule entry. Every ip range and every group expands to
/// its own rule sharing protocol and ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuleSpec {
    /// Free-form label, informational only
    #[serde(default)]
    pub zone: Option<String>,

    /// Why the rule exists, informational only
    #[serde(default)]
    pub justification: Option<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub ip_ranges: Vec<String>,

    #[serde(default)]
    pub groups: Vec<GroupRefSpec>,

    #[serde(default)]
    pub protocol: Option<String>,

    #[serde(default)]
    pub port_range: Option<PortSpec>,
}

impl RuleSpec {
    pub fn protocol(&self) -> Protocol {
        self.protocol
            .as_deref()
            .map(Protocol::parse)
            .unwrap_or_default()
    }

    pub fn ports(&self) -> Result<PortRange> {
        match &self.port_range {
            None => Ok(PortRange::FULL),
            Some(PortSpec::Number(port)) => PortRange::single(*port),
            Some(PortSpec::Text(text)) => PortRange::parse(text),
        }
    }
}

/// `port_range` accepts either a number or a textual range.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    Number(i32),
    Text(String),
}

/// A configured group reference: a bare string, `{ name = "..." }` or
/// `{ id = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GroupRefSpec {
    Plain(String),
    Named { name: String },
    ById { id: String },
}

impl GroupRefSpec {
    pub fn to_ref(&self) -> GroupRef {
        match self {
            GroupRefSpec::Plain(value) => GroupRef::parse(value),
            GroupRefSpec::Named { name } => GroupRef::Name(name.clone()),
            GroupRefSpec::ById { id } => GroupRef::Id(id.clone()),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// All configured groups, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct GroupConfigs {
    groups: BTreeMap<String, GroupConfig>,
}

impl GroupConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, config: GroupConfig) {
        self.groups.insert(name.into(), config);
    }

    pub fn get(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.get(name)
    }

    /// Configuration for `name`, only if it targets `region`.
    pub fn get_in_region(&self, name: &str, region: &str) -> Option<&GroupConfig> {
        self.get(name).filter(|config| config.region() == region)
    }

    /// Names of groups configured for `region`, sorted.
    pub fn names_in_region(&self, region: &str) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|(_, config)| config.region() == region)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroupConfig)> {
        self.groups.iter().map(|(name, config)| (name.as_str(), config))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl FromIterator<(String, GroupConfig)> for GroupConfigs {
    fn from_iter<T: IntoIterator<Item = (String, GroupConfig)>>(iter: T) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}
