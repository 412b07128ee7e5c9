//! Core value types shared by rules, groups and control-plane backends.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Region a group belongs to when its configuration names none.
pub const DEFAULT_GROUP_REGION: &str = authkit::DEFAULT_REGION;

/// Lowest and highest port a range may span.
pub const MIN_PORT: i32 = -1;
pub const MAX_PORT: i32 = 65535;

/// Traffic direction a rule governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// Order in which directions are processed.
    pub const ALL: [Direction; 2] = [Direction::Outbound, Direction::Inbound];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IP protocol, normalized so that names and protocol numbers compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Icmp,
    Icmpv6,
    /// Every protocol (`-1` on the wire)
    All,
    /// Any other protocol number or name, lowercased
    Other(String),
}

impl Protocol {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "tcp" | "6" => Protocol::Tcp,
            "udp" | "17" => Protocol::Udp,
            "icmp" | "1" => Protocol::Icmp,
            "icmpv6" | "58" => Protocol::Icmpv6,
            "-1" | "all" | "any" => Protocol::All,
            other => Protocol::Other(other.to_string()),
        }
    }

    /// Value submitted as `IpProtocol`.
    pub fn as_api_str(&self) -> &str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Icmpv6 => "icmpv6",
            Protocol::All => "-1",
            Protocol::Other(value) => value,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::All => f.write_str("all"),
            other => f.write_str(other.as_api_str()),
        }
    }
}

/// Inclusive port range. A single port has `from == to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRange {
    pub from: i32,
    pub to: i32,
}

impl PortRange {
    /// The range used when none is configured.
    pub const FULL: PortRange = PortRange {
        from: 0,
        to: MAX_PORT,
    };

    pub fn new(from: i32, to: i32) -> Result<Self> {
        let value = format!("{from}-{to}");
        if from < MIN_PORT || to > MAX_PORT {
            return Err(Error::InvalidPortRange {
                value,
                reason: format!("ports must be between {MIN_PORT} and {MAX_PORT}"),
            });
        }
        if from > to {
            return Err(Error::InvalidPortRange {
                value,
                reason: "start is greater than end".to_string(),
            });
        }
        Ok(Self { from, to })
    }

    pub fn single(port: i32) -> Result<Self> {
        Self::new(port, port)
    }

    /// Parse `22`, `8000-8080` or `8000..8080`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let invalid = |reason: &str| Error::InvalidPortRange {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let port = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|_| invalid("not a number"))
        };

        if let Ok(single) = value.parse::<i32>() {
            return Self::single(single);
        }
        let (from, to) = value
            .split_once("..")
            .or_else(|| value.split_once('-'))
            .ok_or_else(|| invalid("expected a port or a range like 80-443"))?;
        Self::new(port(from)?, port(to)?)
    }

    /// Range carried by a live permission; absent ports mean every port.
    pub fn from_api(from: Option<i32>, to: Option<i32>) -> Self {
        match (from, to) {
            (Some(from), Some(to)) => Self { from, to },
            (Some(port), None) | (None, Some(port)) => Self {
                from: port,
                to: port,
            },
            (None, None) => Self::FULL,
        }
    }

    pub fn is_single(&self) -> bool {
        self.from == self.to
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "port {}", self.from)
        } else {
            write!(f, "ports {}-{}", self.from, self.to)
        }
    }
}

/// Reference to a security group, either by id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupRef {
    Id(String),
    Name(String),
}

impl GroupRef {
    /// Interpret a bare string: `sg-<hex>` is an id, anything else a name.
    pub fn parse(value: &str) -> Self {
        if is_group_id(value) {
            GroupRef::Id(value.to_string())
        } else {
            GroupRef::Name(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GroupRef::Id(value) | GroupRef::Name(value) => value,
        }
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check whether a string has the shape of a security group id.
pub fn is_group_id(value: &str) -> bool {
    value
        .strip_prefix("sg-")
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Where traffic governed by a rule comes from (or goes to).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Cidr(String),
    Group(GroupRef),
}

impl Source {
    pub fn is_ipv6(&self) -> bool {
        matches!(self, Source::Cidr(cidr) if cidr.contains(':'))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Cidr(cidr) => f.write_str(cidr),
            Source::Group(group) => write!(f, "{group}"),
        }
    }
}

// Control-plane wire shapes (EC2 JSON).

/// One structural permission record. A record may carry several sources
/// that share protocol and ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpPermission {
    pub ip_protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_ranges: Vec<IpRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv6_ranges: Vec<Ipv6Range>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_id_group_pairs: Vec<UserIdGroupPair>,
}

impl IpPermission {
    /// Same protocol and ports, regardless of sources.
    pub fn same_shape(&self, other: &IpPermission) -> bool {
        Protocol::parse(&self.ip_protocol) == Protocol::parse(&other.ip_protocol)
            && self.from_port == other.from_port
            && self.to_port == other.to_port
    }

    pub fn source_count(&self) -> usize {
        self.ip_ranges.len() + self.ipv6_ranges.len() + self.user_id_group_pairs.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpRange {
    pub cidr_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ipv6Range {
    pub cidr_ipv6: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserIdGroupPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A security group as listed by the control-plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupDescriptor {
    #[serde(rename = "GroupId")]
    pub id: String,
    #[serde(rename = "GroupName")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub ip_permissions: Vec<IpPermission>,
    #[serde(default)]
    pub ip_permissions_egress: Vec<IpPermission>,
}

impl GroupDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn permissions(&self, direction: Direction) -> &[IpPermission] {
        match direction {
            Direction::Inbound => &self.ip_permissions,
            Direction::Outbound => &self.ip_permissions_egress,
        }
    }

    pub fn permissions_mut(&mut self, direction: Direction) -> &mut Vec<IpPermission> {
        match direction {
            Direction::Inbound => &mut self.ip_permissions,
            Direction::Outbound => &mut self.ip_permissions_egress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_normalization() {
        assert_eq!(Protocol::parse("TCP"), Protocol::Tcp);
        assert_eq!(Protocol::parse("6"), Protocol::Tcp);
        assert_eq!(Protocol::parse("17"), Protocol::Udp);
        assert_eq!(Protocol::parse("-1"), Protocol::All);
        assert_eq!(Protocol::parse("all"), Protocol::All);
        assert_eq!(Protocol::parse("50"), Protocol::Other("50".to_string()));
        assert_eq!(Protocol::All.as_api_str(), "-1");
        assert_eq!(Protocol::All.to_string(), "all");
    }

    #[test]
    fn test_port_range_parse() {
        assert_eq!(PortRange::parse("22").unwrap(), PortRange { from: 22, to: 22 });
        assert_eq!(
            PortRange::parse("8000-8080").unwrap(),
            PortRange { from: 8000, to: 8080 }
        );
        assert_eq!(
            PortRange::parse("0..65535").unwrap(),
            PortRange::FULL
        );
        assert_eq!(PortRange::parse("-1").unwrap(), PortRange { from: -1, to: -1 });
    }

    #[test]
    fn test_port_range_rejects_invalid() {
        assert!(matches!(
            PortRange::parse("443-80"),
            Err(Error::InvalidPortRange { .. })
        ));
        assert!(PortRange::parse("70000").is_err());
        assert!(PortRange::parse("http").is_err());
        assert!(PortRange::parse("1-b").is_err());
    }

    #[test]
    fn test_port_range_display() {
        assert_eq!(PortRange { from: 22, to: 22 }.to_string(), "port 22");
        assert_eq!(PortRange::FULL.to_string(), "ports 0-65535");
    }

    #[test]
    fn test_port_range_from_api() {
        assert_eq!(PortRange::from_api(None, None), PortRange::FULL);
        assert_eq!(
            PortRange::from_api(Some(80), Some(80)),
            PortRange { from: 80, to: 80 }
        );
    }

    #[test]
    fn test_group_ref_parse() {
        assert_eq!(
            GroupRef::parse("sg-0a1b2c3d"),
            GroupRef::Id("sg-0a1b2c3d".to_string())
        );
        assert_eq!(GroupRef::parse("sg-web"), GroupRef::Name("sg-web".to_string()));
        assert_eq!(GroupRef::parse("web"), GroupRef::Name("web".to_string()));
        assert!(!is_group_id("sg-"));
    }

    #[test]
    fn test_parse_group_descriptor() {
        let json = r#"{
            "GroupId": "sg-0123abcd",
            "GroupName": "web",
            "Description": "web tier",
            "VpcId": "vpc-1",
            "IpPermissions": [
                {
                    "IpProtocol": "tcp",
                    "FromPort": 22,
                    "ToPort": 22,
                    "IpRanges": [{"CidrIp": "10.0.0.0/8"}],
                    "Ipv6Ranges": [],
                    "PrefixListIds": [],
                    "UserIdGroupPairs": [{"GroupId": "sg-0ffe", "UserId": "123456789012"}]
                }
            ],
            "IpPermissionsEgress": [
                {"IpProtocol": "-1", "IpRanges": [{"CidrIp": "0.0.0.0/0"}]}
            ]
        }"#;
        let group: GroupDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(group.id, "sg-0123abcd");
        assert_eq!(group.name, "web");
        assert_eq!(group.permissions(Direction::Inbound)[0].source_count(), 2);
        assert_eq!(group.permissions(Direction::Outbound)[0].from_port, None);
    }

    #[test]
    fn test_permission_serializes_without_empty_fields() {
        let permission = IpPermission {
            ip_protocol: "tcp".to_string(),
            from_port: Some(443),
            to_port: Some(443),
            ip_ranges: vec![IpRange {
                cidr_ip: "0.0.0.0/0".to_string(),
                description: None,
            }],
            ..Default::default()
        };
        let json = serde_json::to_string(&permission).unwrap();
        assert_eq!(
            json,
            r#"{"IpProtocol":"tcp","FromPort":443,"ToPort":443,"IpRanges":[{"CidrIp":"0.0.0.0/0"}]}"#
        );
    }
}
