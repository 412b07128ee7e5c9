//! One named security group: desired rules, live rules and the two-phase
//! update that converges them.

use crate::backend::ControlPlane;
use crate::config::GroupConfig;
use crate::diff::{RulesDiff, diff_rules};
use crate::error::{Error, Result};
use crate::report::{GroupReport, ReconcileObserver, RuleAction, RuleOutcome, RuleReport};
use crate::resolver::GroupResolver;
use crate::rule::{LiveHandle, Rule};
use crate::types::Direction;

#[derive(Debug, Clone, Default)]
struct DesiredRules {
    outbound: Vec<Rule>,
    inbound: Vec<Rule>,
}

impl DesiredRules {
    fn get(&self, direction: Direction) -> &[Rule] {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }
}

/// A security group for a single reconciliation pass.
///
/// A group without configuration is not managed: it is never diffed and
/// its live rules are left alone.
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    name: String,
    /// VPC the configuration pins the group to
    vpc: Option<String>,
    desired: Option<DesiredRules>,
}

impl SecurityGroup {
    pub fn new(name: impl Into<String>, config: Option<&GroupConfig>) -> Result<Self> {
        let desired = match config {
            Some(config) => Some(DesiredRules {
                outbound: Rule::from_config(config, Direction::Outbound)?,
                inbound: Rule::from_config(config, Direction::Inbound)?,
            }),
            None => None,
        };
        Ok(Self {
            name: name.into(),
            vpc: config.and_then(|c| c.vpc.clone()),
            desired,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_managed(&self) -> bool {
        self.desired.is_some()
    }

    pub fn desired_rules(&self, direction: Direction) -> &[Rule] {
        self.desired.as_ref().map_or(&[], |d| d.get(direction))
    }

    /// Id of the live group with this name, in the configured VPC if any.
    pub fn group_id(&self, resolver: &mut GroupResolver<'_>) -> Result<String> {
        resolver
            .find(&self.name, self.vpc.as_deref())?
            .map(|group| group.id.clone())
            .ok_or_else(|| Error::UnknownGroup {
                query: self.name.clone(),
            })
    }

    /// Rules currently on the group, fetched fresh.
    pub fn live_rules(
        &self,
        plane: &dyn ControlPlane,
        group_id: &str,
        direction: Direction,
    ) -> Result<Vec<Rule>> {
        let permissions = plane.permissions(group_id, direction)?;
        Ok(Rule::from_permissions(group_id, direction, &permissions))
    }

    /// Diff desired against live rules. Unmanaged groups yield an empty diff.
    pub fn rules_diff(
        &self,
        plane: &dyn ControlPlane,
        resolver: &mut GroupResolver<'_>,
        group_id: &str,
    ) -> Result<RulesDiff> {
        let mut diff = RulesDiff::default();
        if !self.is_managed() {
            return Ok(diff);
        }

        for direction in Direction::ALL {
            let desired = canonical(self.desired_rules(direction), resolver)?;
            let live = canonical(&self.live_rules(plane, group_id, direction)?, resolver)?;
            *diff.get_mut(direction) = diff_rules(&desired, &live);
        }
        Ok(diff)
    }

    /// Converge the live group on the desired rules.
    ///
    /// Deletions are applied first, then the diff is computed again and its
    /// additions applied. Revoking a record that holds several sources drops
    /// all of them, and the second diff puts back the ones still wanted.
    ///
    /// Rule failures land in the report. An `Err` means the group could not
    /// be inspected at all.
    pub fn update_rules(
        &self,
        plane: &dyn ControlPlane,
        resolver: &mut GroupResolver<'_>,
        observer: &mut dyn ReconcileObserver,
    ) -> Result<GroupReport> {
        if !self.is_managed() {
            log::info!("No config for {}, skipping", self.name);
            let reason = "no configuration";
            observer.on_group_skipped(&self.name, reason);
            return Ok(GroupReport::skipped(&self.name, reason));
        }

        let group_id = self.group_id(resolver)?;
        observer.on_group_start(&self.name);
        let mut report = GroupReport::new(&self.name);

        let diff = self.rules_diff(plane, resolver, &group_id)?;
        let mut revoked: Vec<&LiveHandle> = Vec::new();
        for rule in diff.deletions() {
            let handle = rule.handle();
            let result = if handle.is_some_and(|h| revoked.contains(&h)) {
                RuleReport::new(
                    RuleAction::Revoke,
                    rule.describe(resolver),
                    RuleOutcome::Skipped {
                        reason: "removed with a previous rule from the same record".to_string(),
                    },
                )
            } else {
                let result = rule.revoke(plane, resolver);
                if result.outcome == RuleOutcome::Revoked {
                    revoked.extend(handle);
                }
                result
            };
            observer.on_rule(&result);
            report.push(result);
        }

        let diff = if revoked.is_empty() {
            diff
        } else {
            log::debug!("Recomputing diff for {} after revokes", self.name);
            self.rules_diff(plane, resolver, &group_id)?
        };
        for rule in diff.additions() {
            let result = rule.authorize(plane, &group_id, resolver);
            observer.on_rule(&result);
            report.push(result);
        }

        observer.on_group_complete(&report);
        Ok(report)
    }
}

fn canonical(rules: &[Rule], resolver: &mut GroupResolver<'_>) -> Result<Vec<Rule>> {
    rules.iter().map(|rule| rule.canonical(resolver)).collect()
}
