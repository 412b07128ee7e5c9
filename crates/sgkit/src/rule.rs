//! A single permission entry and the calls that apply it.

use crate::backend::ControlPlane;
use crate::config::{GroupConfig, RuleSpec};
use crate::error::{Error, Result};
use crate::report::{RuleAction, RuleOutcome, RuleReport};
use crate::resolver::GroupResolver;
use crate::types::{
    Direction, GroupRef, IpPermission, IpRange, Ipv6Range, PortRange, Protocol, Source,
    UserIdGroupPair,
};

/// The live permission record a rule was read from.
///
/// The provider may store several sources in one record; revoking through
/// the handle removes the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveHandle {
    pub group_id: String,
    pub direction: Direction,
    pub permission: IpPermission,
}

/// One permission: direction, protocol, ports and a single source.
#[derive(Debug, Clone)]
pub struct Rule {
    direction: Direction,
    protocol: Protocol,
    ports: PortRange,
    source: Source,
    handle: Option<LiveHandle>,
}

impl Rule {
    pub fn new(direction: Direction, protocol: Protocol, ports: PortRange, source: Source) -> Self {
        // ports carry no meaning when every protocol is allowed
        let ports = if protocol == Protocol::All {
            PortRange::FULL
        } else {
            ports
        };
        Self {
            direction,
            protocol,
            ports,
            source,
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: LiveHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn ports(&self) -> PortRange {
        self.ports
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn handle(&self) -> Option<&LiveHandle> {
        self.handle.as_ref()
    }

    /// Same direction, protocol, ports and source. The live handle is ignored.
    pub fn equivalent_to(&self, other: &Rule) -> bool {
        self.direction == other.direction
            && self.protocol == other.protocol
            && self.ports == other.ports
            && self.source == other.source
    }

    /// Expand one configured entry into a rule per source.
    pub fn from_spec(direction: Direction, spec: &RuleSpec) -> Result<Vec<Rule>> {
        let protocol = spec.protocol();
        let ports = spec.ports()?;

        let cidrs = spec.ip_ranges.iter().map(|cidr| Source::Cidr(cidr.clone()));
        let groups = spec.groups.iter().map(|group| Source::Group(group.to_ref()));
        Ok(cidrs
            .chain(groups)
            .map(|source| Rule::new(direction, protocol.clone(), ports, source))
            .collect())
    }

    /// Every desired rule for one direction of a group configuration.
    pub fn from_config(config: &GroupConfig, direction: Direction) -> Result<Vec<Rule>> {
        let mut rules = Vec::new();
        for spec in config.rules(direction) {
            rules.extend(Rule::from_spec(direction, spec)?);
        }
        Ok(rules)
    }

    /// Expand one live record into a rule per source, each holding the record.
    pub fn from_permission(
        group_id: &str,
        direction: Direction,
        permission: &IpPermission,
    ) -> Vec<Rule> {
        let protocol = Protocol::parse(&permission.ip_protocol);
        let ports = PortRange::from_api(permission.from_port, permission.to_port);
        let handle = LiveHandle {
            group_id: group_id.to_string(),
            direction,
            permission: permission.clone(),
        };

        let v4 = permission
            .ip_ranges
            .iter()
            .map(|r| Source::Cidr(r.cidr_ip.clone()));
        let v6 = permission
            .ipv6_ranges
            .iter()
            .map(|r| Source::Cidr(r.cidr_ipv6.clone()));
        let groups = permission.user_id_group_pairs.iter().filter_map(|pair| {
            match (&pair.group_id, &pair.group_name) {
                (Some(id), _) => Some(Source::Group(GroupRef::Id(id.clone()))),
                (None, Some(name)) => Some(Source::Group(GroupRef::Name(name.clone()))),
                (None, None) => None,
            }
        });

        v4.chain(v6)
            .chain(groups)
            .map(|source| {
                Rule::new(direction, protocol.clone(), ports, source).with_handle(handle.clone())
            })
            .collect()
    }

    pub fn from_permissions(
        group_id: &str,
        direction: Direction,
        permissions: &[IpPermission],
    ) -> Vec<Rule> {
        permissions
            .iter()
            .flat_map(|p| Rule::from_permission(group_id, direction, p))
            .collect()
    }

    /// Replace a group name source with the id it resolves to, so that
    /// configured and live rules compare equal. Unknown names are kept.
    pub fn canonical(&self, resolver: &mut GroupResolver<'_>) -> Result<Rule> {
        let mut rule = self.clone();
        if let Source::Group(GroupRef::Name(name)) = &self.source {
            if let Some(group) = resolver.lookup(name)? {
                rule.source = Source::Group(GroupRef::Id(group.id.clone()));
            }
        }
        Ok(rule)
    }

    /// Human-readable line, e.g. `inbound tcp port 22 for 10.0.0.0/8`.
    pub fn describe(&self, resolver: &GroupResolver<'_>) -> String {
        let source = match &self.source {
            Source::Cidr(cidr) => cidr.clone(),
            Source::Group(GroupRef::Id(id)) => resolver.label(id),
            Source::Group(GroupRef::Name(name)) => name.clone(),
        };
        format!(
            "{} {} {} for {source}",
            self.direction, self.protocol, self.ports
        )
    }

    /// Permission record submitted to authorize this rule.
    pub fn to_permission(&self, source_group_id: Option<&str>) -> IpPermission {
        let (from_port, to_port) = if self.protocol == Protocol::All {
            (None, None)
        } else {
            (Some(self.ports.from), Some(self.ports.to))
        };
        let mut permission = IpPermission {
            ip_protocol: self.protocol.as_api_str().to_string(),
            from_port,
            to_port,
            ..Default::default()
        };

        match (&self.source, source_group_id) {
            (_, Some(id)) => permission.user_id_group_pairs.push(UserIdGroupPair {
                group_id: Some(id.to_string()),
                ..Default::default()
            }),
            (Source::Cidr(cidr), None) if self.source.is_ipv6() => {
                permission.ipv6_ranges.push(Ipv6Range {
                    cidr_ipv6: cidr.clone(),
                    description: None,
                });
            }
            (Source::Cidr(cidr), None) => permission.ip_ranges.push(IpRange {
                cidr_ip: cidr.clone(),
                description: None,
            }),
            (Source::Group(group), None) => permission.user_id_group_pairs.push(UserIdGroupPair {
                group_id: Some(group.as_str().to_string()),
                ..Default::default()
            }),
        }
        permission
    }

    /// Add this rule to `group_id`. Failures are reported, never returned.
    pub fn authorize(
        &self,
        plane: &dyn ControlPlane,
        group_id: &str,
        resolver: &mut GroupResolver<'_>,
    ) -> RuleReport {
        let source_group = match &self.source {
            Source::Cidr(_) => Ok(None),
            Source::Group(GroupRef::Id(id)) => Ok(Some(id.clone())),
            Source::Group(GroupRef::Name(name)) => match resolver.lookup(name) {
                Ok(Some(group)) => Ok(Some(group.id.clone())),
                Ok(None) => Err(Error::UnknownGroup { query: name.clone() }),
                Err(e) => Err(e),
            },
        };
        let description = self.describe(resolver);

        let result = source_group.and_then(|id| {
            let permission = self.to_permission(id.as_deref());
            match self.direction {
                Direction::Inbound => plane.authorize_ingress(group_id, &permission),
                Direction::Outbound => plane.authorize_egress(group_id, &permission),
            }
        });

        let outcome = match result {
            Ok(()) => RuleOutcome::Authorized,
            Err(e) => {
                log::warn!("Authorize failed for {description}: {e}");
                RuleOutcome::failed(&e)
            }
        };
        RuleReport::new(RuleAction::Authorize, description, outcome)
    }

    /// Remove the live record this rule was read from.
    pub fn revoke(&self, plane: &dyn ControlPlane, resolver: &GroupResolver<'_>) -> RuleReport {
        let description = self.describe(resolver);
        let result = match &self.handle {
            Some(handle) => plane.revoke(handle),
            None => Err(Error::MissingHandle),
        };

        let outcome = match result {
            Ok(()) => RuleOutcome::Revoked,
            Err(e) => {
                log::warn!("Revoke failed for {description}: {e}");
                RuleOutcome::failed(&e)
            }
        };
        RuleReport::new(RuleAction::Revoke, description, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::config::{GroupRefSpec, PortSpec};

    fn cidr_rule(direction: Direction, port: i32, cidr: &str) -> Rule {
        Rule::new(
            direction,
            Protocol::Tcp,
            PortRange { from: port, to: port },
            Source::Cidr(cidr.to_string()),
        )
    }

    fn record(port: i32, cidrs: &[&str]) -> IpPermission {
        IpPermission {
            ip_protocol: "tcp".to_string(),
            from_port: Some(port),
            to_port: Some(port),
            ip_ranges: cidrs
                .iter()
                .map(|c| IpRange {
                    cidr_ip: (*c).to_string(),
                    description: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_equivalence_ignores_handle() {
        let a = cidr_rule(Direction::Inbound, 22, "10.0.0.0/8");
        let b = cidr_rule(Direction::Inbound, 22, "10.0.0.0/8").with_handle(LiveHandle {
            group_id: "sg-1".to_string(),
            direction: Direction::Inbound,
            permission: record(22, &["10.0.0.0/8"]),
        });
        assert!(a.equivalent_to(&b));
        assert!(b.equivalent_to(&a));
    }

    #[test]
    fn test_equivalence_compares_every_field() {
        let base = cidr_rule(Direction::Inbound, 22, "10.0.0.0/8");
        let others = [
            cidr_rule(Direction::Outbound, 22, "10.0.0.0/8"),
            cidr_rule(Direction::Inbound, 23, "10.0.0.0/8"),
            cidr_rule(Direction::Inbound, 22, "10.0.0.0/16"),
            Rule::new(
                Direction::Inbound,
                Protocol::Udp,
                PortRange { from: 22, to: 22 },
                Source::Cidr("10.0.0.0/8".to_string()),
            ),
        ];
        for other in &others {
            assert!(!base.equivalent_to(other));
            assert!(!other.equivalent_to(&base));
        }
    }

    #[test]
    fn test_protocol_aliases_are_equivalent() {
        let by_name = Rule::new(
            Direction::Outbound,
            Protocol::parse("all"),
            PortRange { from: 1, to: 2 },
            Source::Cidr("0.0.0.0/0".to_string()),
        );
        let live = Rule::from_permission(
            "sg-1",
            Direction::Outbound,
            &IpPermission {
                ip_protocol: "-1".to_string(),
                ip_ranges: vec![IpRange {
                    cidr_ip: "0.0.0.0/0".to_string(),
                    description: None,
                }],
                ..Default::default()
            },
        );
        assert!(by_name.equivalent_to(&live[0]));
    }

    #[test]
    fn test_from_spec_expands_sources() {
        let spec = RuleSpec {
            ip_ranges: vec!["10.0.0.0/8".to_string(), "::/0".to_string()],
            groups: vec![GroupRefSpec::Plain("lb".to_string())],
            protocol: Some("udp".to_string()),
            port_range: Some(PortSpec::Text("8000..8010".to_string())),
            ..Default::default()
        };
        let rules = Rule::from_spec(Direction::Inbound, &spec).unwrap();
        assert_eq!(rules.len(), 3);
        assert!(rules.iter().all(|r| *r.protocol() == Protocol::Udp));
        assert!(rules.iter().all(|r| r.ports() == PortRange { from: 8000, to: 8010 }));
        assert_eq!(
            rules[2].source(),
            &Source::Group(GroupRef::Name("lb".to_string()))
        );
        assert!(rules.iter().all(|r| r.handle().is_none()));
    }

    #[test]
    fn test_from_spec_defaults() {
        let spec = RuleSpec {
            ip_ranges: vec!["10.0.0.0/8".to_string()],
            ..Default::default()
        };
        let rules = Rule::from_spec(Direction::Outbound, &spec).unwrap();
        assert_eq!(*rules[0].protocol(), Protocol::Tcp);
        assert_eq!(rules[0].ports(), PortRange::FULL);
    }

    #[test]
    fn test_from_permission_shares_handle() {
        let permission = IpPermission {
            user_id_group_pairs: vec![UserIdGroupPair {
                group_id: Some("sg-0aa".to_string()),
                ..Default::default()
            }],
            ..record(22, &["10.0.0.0/8", "192.168.0.0/16"])
        };
        let rules = Rule::from_permission("sg-1", Direction::Inbound, &permission);
        assert_eq!(rules.len(), 3);
        assert_eq!(
            rules[2].source(),
            &Source::Group(GroupRef::Id("sg-0aa".to_string()))
        );
        for rule in &rules {
            assert_eq!(rule.handle().unwrap().permission, permission);
        }
    }

    #[test]
    fn test_canonical_resolves_names() {
        let backend = MockBackend::new();
        let lb = backend.add_group("lb");
        let mut resolver = GroupResolver::new(&backend);

        let named = Rule::new(
            Direction::Inbound,
            Protocol::Tcp,
            PortRange::FULL,
            Source::Group(GroupRef::Name("lb".to_string())),
        );
        let canonical = named.canonical(&mut resolver).unwrap();
        assert_eq!(canonical.source(), &Source::Group(GroupRef::Id(lb)));

        let unknown = Rule::new(
            Direction::Inbound,
            Protocol::Tcp,
            PortRange::FULL,
            Source::Group(GroupRef::Name("ghost".to_string())),
        );
        assert!(unknown.equivalent_to(&unknown.canonical(&mut resolver).unwrap()));
    }

    #[test]
    fn test_describe() {
        let backend = MockBackend::new();
        let lb = backend.add_group("lb");
        let mut resolver = GroupResolver::new(&backend);
        resolver.lookup("lb").unwrap();

        let rule = cidr_rule(Direction::Inbound, 22, "10.0.0.0/8");
        assert_eq!(rule.describe(&resolver), "inbound tcp port 22 for 10.0.0.0/8");

        let rule = Rule::new(
            Direction::Outbound,
            Protocol::Udp,
            PortRange { from: 600, to: 700 },
            Source::Group(GroupRef::Id(lb.clone())),
        );
        assert_eq!(
            rule.describe(&resolver),
            format!("outbound udp ports 600-700 for lb ({lb})")
        );
    }

    #[test]
    fn test_to_permission_shapes() {
        let v6 = cidr_rule(Direction::Inbound, 443, "::/0").to_permission(None);
        assert_eq!(v6.ipv6_ranges[0].cidr_ipv6, "::/0");
        assert!(v6.ip_ranges.is_empty());

        let all = Rule::new(
            Direction::Outbound,
            Protocol::All,
            PortRange::FULL,
            Source::Cidr("0.0.0.0/0".to_string()),
        )
        .to_permission(None);
        assert_eq!(all.ip_protocol, "-1");
        assert_eq!(all.from_port, None);

        let group = cidr_rule(Direction::Inbound, 22, "unused").to_permission(Some("sg-0aa"));
        assert_eq!(group.user_id_group_pairs[0].group_id.as_deref(), Some("sg-0aa"));
    }

    #[test]
    fn test_authorize_resolves_name_and_submits_id() {
        let backend = MockBackend::new();
        let web = backend.add_group("web");
        let lb = backend.add_group("lb");
        let mut resolver = GroupResolver::new(&backend);

        let rule = Rule::new(
            Direction::Outbound,
            Protocol::Udp,
            PortRange { from: 666, to: 666 },
            Source::Group(GroupRef::Name("lb".to_string())),
        );
        let report = rule.authorize(&backend, &web, &mut resolver);
        assert_eq!(report.outcome, RuleOutcome::Authorized);
        assert_eq!(report.action, RuleAction::Authorize);

        let calls = backend.calls();
        assert_eq!(calls.authorize.len(), 1);
        let (group_id, direction, permission) = &calls.authorize[0];
        assert_eq!(group_id, &web);
        assert_eq!(*direction, Direction::Outbound);
        assert_eq!(permission.user_id_group_pairs[0].group_id.as_deref(), Some(lb.as_str()));
    }

    #[test]
    fn test_authorize_unknown_group_fails_rule_only() {
        let backend = MockBackend::new();
        let web = backend.add_group("web");
        let mut resolver = GroupResolver::new(&backend);

        let rule = Rule::new(
            Direction::Inbound,
            Protocol::Tcp,
            PortRange::FULL,
            Source::Group(GroupRef::Name("ghost".to_string())),
        );
        let report = rule.authorize(&backend, &web, &mut resolver);
        assert!(matches!(
            report.outcome,
            RuleOutcome::Failed { ref class, .. } if class == "UnknownGroup"
        ));
        assert!(report.description.contains("ghost"));
        assert!(backend.calls().authorize.is_empty());
    }

    #[test]
    fn test_authorize_reports_provider_rejection() {
        let backend = MockBackend::new();
        let web = backend.add_group("web");
        backend.reject_source("1.2.3.4/32");
        let mut resolver = GroupResolver::new(&backend);

        let report = cidr_rule(Direction::Inbound, 22, "1.2.3.4/32").authorize(
            &backend,
            &web,
            &mut resolver,
        );
        assert!(report.outcome.is_failure());
        assert_eq!(report.description, "inbound tcp port 22 for 1.2.3.4/32");
    }

    #[test]
    fn test_revoke_without_handle_fails() {
        let backend = MockBackend::new();
        let resolver = GroupResolver::new(&backend);
        let report = cidr_rule(Direction::Inbound, 22, "10.0.0.0/8").revoke(&backend, &resolver);
        assert!(matches!(
            report.outcome,
            RuleOutcome::Failed { ref class, .. } if class == "MissingHandle"
        ));
        assert!(backend.calls().revoke.is_empty());
    }

    #[test]
    fn test_revoke_uses_handle() {
        let backend = MockBackend::new();
        let web = backend.add_group("web");
        backend.add_permission(&web, Direction::Inbound, record(80, &["0.0.0.0/0"]));
        let resolver = GroupResolver::new(&backend);

        let live = Rule::from_permissions(
            &web,
            Direction::Inbound,
            &backend.ingress_permissions(&web).unwrap(),
        );
        let report = live[0].revoke(&backend, &resolver);
        assert_eq!(report.outcome, RuleOutcome::Revoked);
        assert!(backend.ingress_permissions(&web).unwrap().is_empty());
    }
}
