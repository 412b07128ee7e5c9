//! `sgczar diff`: preview what apply would change.

use crate::Context;
use crate::cli::RunArgs;
use crate::commands::RunSetup;
use crate::progress;
use crate::ui;
use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use sgkit::{GroupPlan, PlanKind, ReconciliationDriver};

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let setup = RunSetup::load(ctx, &args)?;
    let backend = setup.connect(args.mfa_token.as_deref())?;
    let driver = ReconciliationDriver::new(&backend, &setup.configs, setup.region());

    let pb = progress::spinner(
        &format!("Listing security groups in {}...", setup.region()),
        ctx.quiet,
    );
    let plans = driver.plan();
    progress::finish_clear(&pb);
    let plans = plans.context("Failed to list security groups")?;

    display_plans(&plans, ctx.quiet);
    Ok(())
}

fn display_plans(plans: &[GroupPlan], quiet: bool) {
    let changed: Vec<&GroupPlan> = plans.iter().filter(|p| p.has_changes()).collect();

    for plan in plans {
        match &plan.kind {
            PlanKind::Failed(error) => {
                ui::error(&format!("Cannot plan {}: {}", plan.name, error));
            }
            PlanKind::Unmanaged if !quiet => {
                ui::dim(&format!("{} has no configuration, skipped", plan.name));
            }
            _ => {}
        }
    }

    if changed.is_empty() {
        println!();
        ui::success("No changes needed");
        return;
    }

    for plan in &changed {
        let title = match plan.kind {
            PlanKind::Create => format!("{} {}", plan.name, "(new)".green()),
            _ => plan.name.clone(),
        };
        ui::section(&title);
        for rule in &plan.deletions {
            ui::removed(rule);
        }
        for rule in &plan.additions {
            ui::added(rule);
        }
    }

    let (created, additions, deletions) = totals(&changed);
    println!();
    println!(
        "{} to create, {} to authorize, {} to revoke",
        ui::plural(created, "group"),
        ui::plural(additions, "rule"),
        ui::plural(deletions, "rule")
    );
}

/// Groups to create, rules to authorize, rules to revoke.
fn totals(plans: &[&GroupPlan]) -> (usize, usize, usize) {
    plans.iter().fold((0, 0, 0), |(created, add, del), plan| {
        (
            created + usize::from(plan.kind == PlanKind::Create),
            add + plan.additions.len(),
            del + plan.deletions.len(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(name: &str, kind: PlanKind, additions: &[&str], deletions: &[&str]) -> GroupPlan {
        GroupPlan {
            name: name.to_string(),
            kind,
            additions: additions.iter().map(ToString::to_string).collect(),
            deletions: deletions.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_totals() {
        let plans = [
            plan("web", PlanKind::Create, &["inbound tcp port 443 for 0.0.0.0/0"], &[]),
            plan(
                "db",
                PlanKind::Update,
                &["inbound tcp port 5432 for sg-0abc"],
                &["inbound tcp port 22 for 0.0.0.0/0", "inbound tcp port 80 for 0.0.0.0/0"],
            ),
        ];
        let refs: Vec<&GroupPlan> = plans.iter().collect();
        assert_eq!(totals(&refs), (1, 2, 2));
    }

    #[test]
    fn test_empty_create_still_counts() {
        let plans = [plan("empty", PlanKind::Create, &[], &[])];
        let refs: Vec<&GroupPlan> = plans.iter().collect();
        assert_eq!(totals(&refs), (1, 0, 0));
    }
}
