//! Console rendering of reconciliation progress.

use crate::ui;
use colored::Colorize;
use sgkit::{Error, GroupReport, ReconcileObserver, RuleAction, RuleOutcome, RuleReport};

/// Prints each group and rule outcome as it happens.
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    /// Only print failures
    quiet: bool,
}

impl ConsoleObserver {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

/// One line for a rule outcome, without colors.
pub fn outcome_line(report: &RuleReport) -> String {
    match &report.outcome {
        RuleOutcome::Authorized => format!("Authorized: {}", report.description),
        RuleOutcome::Revoked => format!("Revoked: {}", report.description),
        RuleOutcome::Failed { class, error } => {
            let verb = match report.action {
                RuleAction::Authorize => "authorize",
                RuleAction::Revoke => "revoke",
            };
            format!("Failed to {verb} {}: {class} - {error}", report.description)
        }
        RuleOutcome::Skipped { reason } => format!("Skipped {}: {reason}", report.description),
    }
}

impl ReconcileObserver for ConsoleObserver {
    fn on_group_created(&mut self, name: &str, id: &str) {
        if !self.quiet {
            ui::success(&format!("Created group {} ({})", name.bold(), id));
        }
    }

    fn on_group_create_failed(&mut self, name: &str, error: &Error) {
        ui::error(&format!(
            "Failed to create group {}: {} - {}",
            name,
            error.class(),
            error
        ));
    }

    fn on_group_start(&mut self, name: &str) {
        if !self.quiet {
            ui::section(&format!("Group {name}"));
        }
    }

    fn on_group_skipped(&mut self, name: &str, reason: &str) {
        if !self.quiet {
            ui::dim(&format!("Skipping {name}: {reason}"));
        }
    }

    fn on_group_failed(&mut self, name: &str, error: &Error) {
        ui::error(&format!(
            "Failed to reconcile group {}: {} - {}",
            name,
            error.class(),
            error
        ));
    }

    fn on_rule(&mut self, report: &RuleReport) {
        let line = outcome_line(report);
        match &report.outcome {
            RuleOutcome::Authorized | RuleOutcome::Revoked if !self.quiet => {
                ui::success(&line);
            }
            RuleOutcome::Failed { .. } => ui::error(&line),
            RuleOutcome::Skipped { .. } if !self.quiet => ui::dim(&line),
            _ => {}
        }
    }

    fn on_group_complete(&mut self, report: &GroupReport) {
        if self.quiet || report.skipped.is_some() {
            return;
        }
        if report.rules.is_empty() {
            ui::dim("Already in sync");
        } else if report.failures() > 0 {
            ui::warn(&format!(
                "{} with {}",
                ui::plural(report.rules.len(), "rule change"),
                ui::plural(report.failures(), "failure")
            ));
        }
    }
}
