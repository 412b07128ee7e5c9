//! Per-rule and per-group results, and the observer that renders them.

use crate::error::Error;

/// What a rule action attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Authorize,
    Revoke,
}

/// Result of a single authorize or revoke call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Authorized,
    Revoked,
    Failed { class: String, error: String },
    Skipped { reason: String },
}

impl RuleOutcome {
    pub fn failed(error: &Error) -> Self {
        RuleOutcome::Failed {
            class: error.class().to_string(),
            error: error.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RuleOutcome::Failed { .. })
    }
}

/// A rule action together with the rule's human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub action: RuleAction,
    pub description: String,
    pub outcome: RuleOutcome,
}

impl RuleReport {
    pub fn new(action: RuleAction, description: impl Into<String>, outcome: RuleOutcome) -> Self {
        Self {
            action,
            description: description.into(),
            outcome,
        }
    }
}

/// Everything that happened to one group during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub name: String,
    /// Set when the group was not managed (no configuration)
    pub skipped: Option<String>,
    pub rules: Vec<RuleReport>,
}

impl GroupReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skipped: None,
            rules: Vec::new(),
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skipped: Some(reason.into()),
            rules: Vec::new(),
        }
    }

    pub fn push(&mut self, report: RuleReport) {
        self.rules.push(report);
    }

    pub fn count(&self, predicate: impl Fn(&RuleOutcome) -> bool) -> usize {
        self.rules.iter().filter(|r| predicate(&r.outcome)).count()
    }

    pub fn failures(&self) -> usize {
        self.count(RuleOutcome::is_failure)
    }
}

/// Totals across a whole reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub groups_created: usize,
    pub groups_reconciled: usize,
    pub groups_skipped: usize,
    pub groups_failed: usize,
    pub authorized: usize,
    pub revoked: usize,
    pub rules_failed: usize,
    pub rules_skipped: usize,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, report: &GroupReport) {
        if report.skipped.is_some() {
            self.groups_skipped += 1;
            return;
        }
        self.groups_reconciled += 1;
        for rule in &report.rules {
            match rule.outcome {
                RuleOutcome::Authorized => self.authorized += 1,
                RuleOutcome::Revoked => self.revoked += 1,
                RuleOutcome::Failed { .. } => self.rules_failed += 1,
                RuleOutcome::Skipped { .. } => self.rules_skipped += 1,
            }
        }
    }

    pub fn changes(&self) -> usize {
        self.groups_created + self.authorized + self.revoked
    }

    /// No rule or group failed.
    pub fn is_success(&self) -> bool {
        self.rules_failed == 0 && self.groups_failed == 0
    }
}

/// Receives progress while groups are reconciled.
///
/// All methods have empty defaults so observers only implement what they
/// render.
pub trait ReconcileObserver {
    fn on_group_created(&mut self, _name: &str, _id: &str) {}

    fn on_group_create_failed(&mut self, _name: &str, _error: &Error) {}

    fn on_group_start(&mut self, _name: &str) {}

    fn on_group_skipped(&mut self, _name: &str, _reason: &str) {}

    fn on_group_failed(&mut self, _name: &str, _error: &Error) {}

    fn on_rule(&mut self, _report: &RuleReport) {}

    fn on_group_complete(&mut self, _report: &GroupReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl ReconcileObserver for SilentObserver {}

/// Observer that records every event.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingObserver {
    pub events: Vec<String>,
}

#[cfg(test)]
impl ReconcileObserver for RecordingObserver {
    fn on_group_created(&mut self, name: &str, id: &str) {
        self.events.push(format!("created {name} {id}"));
    }

    fn on_group_create_failed(&mut self, name: &str, error: &Error) {
        self.events.push(format!("create failed {name}: {}", error.class()));
    }

    fn on_group_start(&mut self, name: &str) {
        self.events.push(format!("start {name}"));
    }

    fn on_group_skipped(&mut self, name: &str, reason: &str) {
        self.events.push(format!("skipped {name}: {reason}"));
    }

    fn on_group_failed(&mut self, name: &str, error: &Error) {
        self.events.push(format!("failed {name}: {}", error.class()));
    }

    fn on_rule(&mut self, report: &RuleReport) {
        let verb = match &report.outcome {
            RuleOutcome::Authorized => "authorized".to_string(),
            RuleOutcome::Revoked => "revoked".to_string(),
            RuleOutcome::Failed { class, .. } => format!("failed[{class}]"),
            RuleOutcome::Skipped { .. } => "skipped".to_string(),
        };
        self.events.push(format!("{verb} {}", report.description));
    }

    fn on_group_complete(&mut self, report: &GroupReport) {
        self.events.push(format!("complete {}", report.name));
    }
}
