//! `sgczar apply`: create missing groups and converge their rules.

use crate::Context;
use crate::cli::RunArgs;
use crate::commands::RunSetup;
use crate::observer::ConsoleObserver;
use crate::ui;
use anyhow::{Context as AnyhowContext, Result};
use sgkit::{ReconciliationDriver, RunSummary};

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let setup = RunSetup::load(ctx, &args)?;

    if !ctx.quiet {
        ui::header(&format!(
            "Reconciling {} in {}",
            setup.environment,
            setup.region()
        ));
    }

    if setup.configs.names_in_region(setup.region()).is_empty() {
        ui::warn(&format!("No groups configured for {}", setup.region()));
    }

    let backend = setup.connect(args.mfa_token.as_deref())?;
    let driver = ReconciliationDriver::new(&backend, &setup.configs, setup.region());
    let mut observer = ConsoleObserver::new(ctx.quiet);
    let summary = driver
        .reconcile_all(&mut observer)
        .context("Reconciliation aborted")?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    ui::header("Summary");
    for (key, value) in summary_rows(summary) {
        ui::kv(key, &value.to_string());
    }
    println!();

    if !summary.is_success() {
        ui::warn(&format!(
            "Completed with {} and {}",
            ui::plural(summary.rules_failed, "failed rule"),
            ui::plural(summary.groups_failed, "failed group")
        ));
    } else if summary.changes() == 0 {
        ui::success("Everything already in sync");
    } else {
        ui::success(&format!("Applied {}", ui::plural(summary.changes(), "change")));
    }
}

fn summary_rows(summary: &RunSummary) -> Vec<(&'static str, usize)> {
    vec![
        ("Groups created", summary.groups_created),
        ("Groups reconciled", summary.groups_reconciled),
        ("Groups skipped", summary.groups_skipped),
        ("Groups failed", summary.groups_failed),
        ("Rules authorized", summary.authorized),
        ("Rules revoked", summary.revoked),
        ("Rules skipped", summary.rules_skipped),
        ("Rules failed", summary.rules_failed),
    ]
}
