//! Whole-region reconciliation: create missing groups, then converge
//! every live group on its configuration.

use crate::backend::ControlPlane;
use crate::config::{GroupConfig, GroupConfigs};
use crate::diff::diff_rules;
use crate::error::{Error, Result};
use crate::group::SecurityGroup;
use crate::report::{GroupReport, ReconcileObserver, RunSummary};
use crate::resolver::GroupResolver;
use crate::types::Direction;

/// What a reconciliation pass would do to one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub name: String,
    pub kind: PlanKind,
    /// Descriptions of rules that would be revoked
    pub deletions: Vec<String>,
    /// Descriptions of rules that would be authorized
    pub additions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanKind {
    /// Configured but not live yet
    Create,
    /// Live and configured
    Update,
    /// Live without configuration
    Unmanaged,
    /// Could not be planned
    Failed(String),
}

impl GroupPlan {
    fn new(name: &str, kind: PlanKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            deletions: Vec::new(),
            additions: Vec::new(),
        }
    }

    pub fn has_changes(&self) -> bool {
        self.kind == PlanKind::Create || !self.deletions.is_empty() || !self.additions.is_empty()
    }
}

/// Reconciles every configured group of one region.
pub struct ReconciliationDriver<'a> {
    plane: &'a dyn ControlPlane,
    configs: &'a GroupConfigs,
    region: String,
}

impl<'a> ReconciliationDriver<'a> {
    pub fn new(
        plane: &'a dyn ControlPlane,
        configs: &'a GroupConfigs,
        region: impl Into<String>,
    ) -> Self {
        Self {
            plane,
            configs,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Names of groups configured for this region.
    pub fn configured_groups(&self) -> Vec<&str> {
        self.configs.names_in_region(&self.region)
    }

    fn config(&self, name: &str) -> Option<&GroupConfig> {
        self.configs.get_in_region(name, &self.region)
    }

    /// Configured groups with no live counterpart.
    pub fn missing_groups(&self, resolver: &mut GroupResolver<'_>) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for name in self.configured_groups() {
            let vpc = self.config(name).and_then(|c| c.vpc.as_deref());
            if resolver.find(name, vpc)?.is_none() {
                missing.push(name.to_string());
            }
        }
        Ok(missing)
    }

    /// Create every missing group. A group that cannot be created is
    /// reported and left out; the rest of the run continues.
    pub fn create_missing_groups(
        &self,
        resolver: &mut GroupResolver<'_>,
        observer: &mut dyn ReconcileObserver,
        summary: &mut RunSummary,
    ) -> Result<Vec<String>> {
        let mut created = Vec::new();
        for name in self.missing_groups(resolver)? {
            match self.create_group(&name) {
                Ok(id) => {
                    log::info!("Created security group {name} ({id})");
                    observer.on_group_created(&name, &id);
                    summary.groups_created += 1;
                    created.push(name);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::error!("Failed to create security group {name}: {e}");
                    observer.on_group_create_failed(&name, &e);
                    summary.groups_failed += 1;
                }
            }
        }
        Ok(created)
    }

    fn create_group(&self, name: &str) -> Result<String> {
        let config = self.config(name).ok_or_else(|| Error::UnknownGroup {
            query: name.to_string(),
        })?;
        // reject bad rules before anything is created
        SecurityGroup::new(name, Some(config))?;
        let vpc = config.vpc.as_deref().ok_or_else(|| Error::MissingVpc {
            name: name.to_string(),
        })?;
        let group = self
            .plane
            .create_group(name, vpc, &config.description_for(name))?;
        Ok(group.id)
    }

    /// Live group names, sorted and de-duplicated.
    fn live_names(resolver: &mut GroupResolver<'_>) -> Result<Vec<String>> {
        let mut names: Vec<String> = resolver.groups()?.iter().map(|g| g.name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Update one live group against its configuration, if any.
    pub fn reconcile_group(
        &self,
        name: &str,
        resolver: &mut GroupResolver<'_>,
        observer: &mut dyn ReconcileObserver,
    ) -> Result<GroupReport> {
        let group = SecurityGroup::new(name, self.config(name))?;
        group.update_rules(self.plane, resolver, observer)
    }

    /// Create missing groups, then update every live group.
    ///
    /// Only a failure to list groups or a fatal authentication error is
    /// returned as an error. Everything else is counted in the summary and
    /// reported to the observer.
    pub fn reconcile_all(&self, observer: &mut dyn ReconcileObserver) -> Result<RunSummary> {
        let mut resolver = GroupResolver::new(self.plane);
        let mut summary = RunSummary::new();

        let created = self.create_missing_groups(&mut resolver, observer, &mut summary)?;
        if !created.is_empty() {
            resolver.refresh();
        }

        for name in Self::live_names(&mut resolver)? {
            match self.reconcile_group(&name, &mut resolver, observer) {
                Ok(report) => summary.add_group(&report),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::error!("Failed to reconcile {name}: {e}");
                    observer.on_group_failed(&name, &e);
                    summary.groups_failed += 1;
                }
            }
        }

        log::debug!("Reconciliation summary: {summary:?}");
        Ok(summary)
    }

    /// Compute what [`reconcile_all`](Self::reconcile_all) would do without
    /// changing anything.
    ///
    /// Rules dropped together with a revoked record and put back afterwards
    /// are not shown.
    pub fn plan(&self) -> Result<Vec<GroupPlan>> {
        let mut resolver = GroupResolver::new(self.plane);
        let mut plans = Vec::new();

        for name in self.missing_groups(&mut resolver)? {
            plans.push(self.plan_create(&name, &mut resolver));
        }
        for name in Self::live_names(&mut resolver)? {
            plans.push(self.plan_update(&name, &mut resolver));
        }
        Ok(plans)
    }

    fn plan_create(&self, name: &str, resolver: &mut GroupResolver<'_>) -> GroupPlan {
        match self.planned_rules(name, resolver) {
            Ok(additions) => GroupPlan {
                additions,
                ..GroupPlan::new(name, PlanKind::Create)
            },
            Err(e) => GroupPlan::new(name, PlanKind::Failed(e.to_string())),
        }
    }

    /// Descriptions of every rule a new group would receive.
    fn planned_rules(&self, name: &str, resolver: &mut GroupResolver<'_>) -> Result<Vec<String>> {
        let config = self.config(name).ok_or_else(|| Error::UnknownGroup {
            query: name.to_string(),
        })?;
        if config.vpc.is_none() {
            return Err(Error::MissingVpc {
                name: name.to_string(),
            });
        }

        let group = SecurityGroup::new(name, Some(config))?;
        let mut additions = Vec::new();
        for direction in Direction::ALL {
            let desired = group
                .desired_rules(direction)
                .iter()
                .map(|rule| rule.canonical(resolver))
                .collect::<Result<Vec<_>>>()?;
            for rule in diff_rules(&desired, &[]).additions {
                additions.push(rule.describe(resolver));
            }
        }
        Ok(additions)
    }

    fn plan_update(&self, name: &str, resolver: &mut GroupResolver<'_>) -> GroupPlan {
        let group = match SecurityGroup::new(name, self.config(name)) {
            Ok(group) => group,
            Err(e) => return GroupPlan::new(name, PlanKind::Failed(e.to_string())),
        };
        if !group.is_managed() {
            return GroupPlan::new(name, PlanKind::Unmanaged);
        }

        let diff = group
            .group_id(resolver)
            .and_then(|id| group.rules_diff(self.plane, resolver, &id));
        match diff {
            Ok(diff) => GroupPlan {
                deletions: diff.deletions().map(|r| r.describe(resolver)).collect(),
                additions: diff.additions().map(|r| r.describe(resolver)).collect(),
                ..GroupPlan::new(name, PlanKind::Update)
            },
            Err(e) => GroupPlan::new(name, PlanKind::Failed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::config::{GroupRefSpec, PortSpec, RuleSpec};
    use crate::report::RecordingObserver;
    use crate::rule::LiveHandle;
    use crate::types::{GroupDescriptor, IpPermission};

    /// Lists groups, then fails every permission listing because the
    /// session could not be renewed.
    struct UnrenewableSession(MockBackend);

    fn unrenewable() -> Error {
        Error::Auth(authkit::Error::MfaNotConfigured {
            profile: "default".to_string(),
            account: "no alias".to_string(),
        })
    }

    impl ControlPlane for UnrenewableSession {
        fn list_groups(&self) -> Result<Vec<GroupDescriptor>> {
            self.0.list_groups()
        }

        fn create_group(&self, name: &str, vpc: &str, description: &str) -> Result<GroupDescriptor> {
            self.0.create_group(name, vpc, description)
        }

        fn ingress_permissions(&self, _group_id: &str) -> Result<Vec<IpPermission>> {
            Err(unrenewable())
        }

        fn egress_permissions(&self, _group_id: &str) -> Result<Vec<IpPermission>> {
            Err(unrenewable())
        }

        fn authorize_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<()> {
            self.0.authorize_ingress(group_id, permission)
        }

        fn authorize_egress(&self, group_id: &str, permission: &IpPermission) -> Result<()> {
            self.0.authorize_egress(group_id, permission)
        }

        fn revoke(&self, handle: &LiveHandle) -> Result<()> {
            self.0.revoke(handle)
        }
    }

    fn configs(entries: Vec<(&str, GroupConfig)>) -> GroupConfigs {
        entries
            .into_iter()
            .map(|(name, config)| (name.to_string(), config))
            .collect()
    }

    fn ssh_from(cidr: &str) -> RuleSpec {
        RuleSpec {
            ip_ranges: vec![cidr.to_string()],
            port_range: Some(PortSpec::Number(22)),
            ..Default::default()
        }
    }

    fn with_vpc(config: GroupConfig) -> GroupConfig {
        GroupConfig {
            vpc: Some("vpc-0abc".to_string()),
            ..config
        }
    }

    #[test]
    fn test_creates_missing_groups_before_rules() {
        let backend = MockBackend::new();
        backend.add_group("web");
        let configs = configs(vec![
            (
                "web",
                GroupConfig {
                    inbound: vec![RuleSpec {
                        groups: vec![GroupRefSpec::Plain("db".to_string())],
                        port_range: Some(PortSpec::Number(5432)),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ),
            (
                "db",
                with_vpc(GroupConfig {
                    description: Some("database".to_string()),
                    outbound: vec![RuleSpec {
                        ip_ranges: vec!["0.0.0.0/0".to_string()],
                        protocol: Some("-1".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            ),
        ]);

        let driver = ReconciliationDriver::new(&backend, &configs, "us-east-1");
        let mut observer = RecordingObserver::default();
        let summary = driver.reconcile_all(&mut observer).unwrap();

        let db = backend.group("db").unwrap();
        assert_eq!(db.vpc_id.as_deref(), Some("vpc-0abc"));
        assert_eq!(db.description, "database");
        assert_eq!(observer.events[0], format!("created db {}", db.id));

        // the web rule referencing the new group resolved to its id
        let web = backend.group("web").unwrap();
        assert_eq!(
            web.ip_permissions[0].user_id_group_pairs[0].group_id.as_deref(),
            Some(db.id.as_str())
        );
        // default egress on the new group already matches the config
        assert_eq!(db.ip_permissions_egress.len(), 1);

        assert_eq!(summary.groups_created, 1);
        assert_eq!(summary.groups_reconciled, 2);
        assert_eq!(summary.authorized, 1);
        assert_eq!(summary.revoked, 0);
        assert!(summary.is_success());
        assert_eq!(backend.calls().list_groups, 2);
    }

    #[test]
    fn test_unconfigured_live_group_is_untouched() {
        let backend = MockBackend::new();
        let legacy = backend.add_group("legacy");
        backend.add_permission(
            &legacy,
            Direction::Inbound,
            crate::types::IpPermission {
                ip_protocol: "tcp".to_string(),
                from_port: Some(80),
                to_port: Some(80),
                ..Default::default()
            },
        );
        let configs = GroupConfigs::new();

        let driver = ReconciliationDriver::new(&backend, &configs, "us-east-1");
        let summary = driver
            .reconcile_all(&mut RecordingObserver::default())
            .unwrap();

        assert_eq!(summary.groups_skipped, 1);
        assert_eq!(backend.calls().mutations(), 0);
        assert_eq!(backend.calls().list_groups, 1);
    }

    #[test]
    fn test_other_region_configs_are_ignored() {
        let backend = MockBackend::new();
        let configs = configs(vec![(
            "eu-web",
            with_vpc(GroupConfig {
                region: Some("eu-west-1".to_string()),
                ..Default::default()
            }),
        )]);

        let driver = ReconciliationDriver::new(&backend, &configs, "us-east-1");
        assert!(driver.configured_groups().is_empty());
        let summary = driver
            .reconcile_all(&mut RecordingObserver::default())
            .unwrap();
        assert_eq!(summary.groups_created, 0);
        assert!(backend.calls().create_group.is_empty());
    }

    #[test]
    fn test_missing_vpc_fails_that_group_only() {
        let backend = MockBackend::new();
        backend.add_group("web");
        let configs = configs(vec![
            ("novpc", GroupConfig::default()),
            (
                "web",
                GroupConfig {
                    inbound: vec![ssh_from("10.0.0.0/8")],
                    ..Default::default()
                },
            ),
        ]);

        let driver = ReconciliationDriver::new(&backend, &configs, "us-east-1");
        let mut observer = RecordingObserver::default();
        let summary = driver.reconcile_all(&mut observer).unwrap();

        assert!(observer.events.contains(&"create failed novpc: MissingVpc".to_string()));
        assert!(backend.calls().create_group.is_empty());
        assert_eq!(summary.groups_failed, 1);
        assert_eq!(summary.authorized, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_group_failure_continues_with_next_group() {
        let backend = MockBackend::new();
        let a = backend.add_group("a");
        backend.add_group("b");
        backend.break_group(&a);
        let configs = configs(vec![
            ("a", GroupConfig::default()),
            (
                "b",
                GroupConfig {
                    inbound: vec![ssh_from("10.0.0.0/8")],
                    ..Default::default()
                },
            ),
        ]);

        let driver = ReconciliationDriver::new(&backend, &configs, "us-east-1");
        let mut observer = RecordingObserver::default();
        let summary = driver.reconcile_all(&mut observer).unwrap();

        assert_eq!(summary.groups_failed, 1);
        assert_eq!(summary.groups_reconciled, 1);
        assert_eq!(summary.authorized, 1);
        assert!(observer.events.contains(&"failed a: RequestLimitExceeded".to_string()));
    }

    #[test]
    fn test_fatal_auth_error_aborts_run() {
        let backend = MockBackend::new();
        backend.add_group("a");
        backend.add_group("b");
        let plane = UnrenewableSession(backend.clone());
        let configs = configs(vec![
            ("a", GroupConfig::default()),
            ("b", GroupConfig::default()),
        ]);

        let driver = ReconciliationDriver::new(&plane, &configs, "us-east-1");
        let mut observer = RecordingObserver::default();
        let err = driver.reconcile_all(&mut observer).unwrap_err();

        assert_eq!(err.class(), "MfaNotConfigured");
        assert!(observer.events.contains(&"start a".to_string()));
        assert!(!observer.events.contains(&"start b".to_string()));
        assert_eq!(backend.calls().mutations(), 0);
    }

    #[test]
    fn test_same_name_in_other_vpc_is_left_alone() {
        let backend = MockBackend::new();
        let other = backend.add_group_in_vpc("default", "vpc-a");
        let ours = backend.add_group_in_vpc("default", "vpc-b");
        let configs = configs(vec![(
            "default",
            GroupConfig {
                vpc: Some("vpc-b".to_string()),
                inbound: vec![ssh_from("10.0.0.0/8")],
                ..Default::default()
            },
        )]);

        let driver = ReconciliationDriver::new(&backend, &configs, "us-east-1");
        let summary = driver
            .reconcile_all(&mut RecordingObserver::default())
            .unwrap();

        assert_eq!(summary.groups_created, 0);
        assert_eq!(summary.authorized, 1);
        let calls = backend.calls();
        assert!(calls.create_group.is_empty());
        assert_eq!(calls.authorize.len(), 1);
        assert_eq!(calls.authorize[0].0, ours);
        assert!(backend.ingress_permissions(&other).unwrap().is_empty());
    }

    #[test]
    fn test_plan_makes_no_changes() {
        let backend = MockBackend::new();
        let web = backend.add_group("web");
        backend.add_group("legacy");
        backend.add_permission(
            &web,
            Direction::Inbound,
            crate::types::IpPermission {
                ip_protocol: "tcp".to_string(),
                from_port: Some(80),
                to_port: Some(80),
                ip_ranges: vec![crate::types::IpRange {
                    cidr_ip: "0.0.0.0/0".to_string(),
                    description: None,
                }],
                ..Default::default()
            },
        );
        let configs = configs(vec![
            (
                "web",
                GroupConfig {
                    inbound: vec![ssh_from("10.0.0.0/8")],
                    ..Default::default()
                },
            ),
            (
                "db",
                with_vpc(GroupConfig {
                    inbound: vec![ssh_from("10.1.0.0/16")],
                    ..Default::default()
                }),
            ),
        ]);

        let driver = ReconciliationDriver::new(&backend, &configs, "us-east-1");
        let plans = driver.plan().unwrap();

        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].name, "db");
        assert_eq!(plans[0].kind, PlanKind::Create);
        assert_eq!(plans[0].additions, vec!["inbound tcp port 22 for 10.1.0.0/16"]);

        assert_eq!(plans[1].name, "legacy");
        assert_eq!(plans[1].kind, PlanKind::Unmanaged);
        assert!(!plans[1].has_changes());

        assert_eq!(plans[2].name, "web");
        assert_eq!(plans[2].deletions, vec!["inbound tcp port 80 for 0.0.0.0/0"]);
        assert_eq!(plans[2].additions, vec!["inbound tcp port 22 for 10.0.0.0/8"]);

        assert_eq!(backend.calls().mutations(), 0);
    }
}
