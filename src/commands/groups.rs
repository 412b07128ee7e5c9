//! `sgczar groups`: list configured groups without touching AWS.

use crate::Context;
use crate::cli::GroupsArgs;
use crate::config::{ConfigDir, Overrides};
use crate::paths;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use sgkit::{Direction, GroupConfigs};

/// One configured group as listed.
#[derive(Debug, PartialEq, Eq)]
struct GroupRow {
    name: String,
    region: String,
    selected: bool,
    rules: usize,
}

pub fn run(ctx: &Context, args: GroupsArgs) -> Result<()> {
    let config_dir = ConfigDir::open(paths::config_dir(ctx.config_dir.as_deref())?)?;
    let overrides = Overrides {
        region: args.region.clone(),
        ..Default::default()
    };
    let settings = config_dir.settings()?.resolve(&args.environment, &overrides);
    let configs = config_dir.load_groups(&args.environment, &settings.region)?;

    let rows = rows(&configs, &settings.region);
    if rows.is_empty() {
        ui::warn(&format!(
            "No group files in {}",
            config_dir.path().display()
        ));
        return Ok(());
    }

    ui::header(&format!("Configured groups ({})", args.environment));
    for row in &rows {
        let marker = if row.selected {
            "●".green()
        } else {
            "○".dimmed()
        };
        println!(
            "  {} {:<24} {:<16} {}",
            marker,
            row.name,
            row.region,
            ui::plural(row.rules, "rule").dimmed()
        );
    }

    let selected = rows.iter().filter(|r| r.selected).count();
    if !ctx.quiet {
        println!();
        ui::info(&format!(
            "{} of {} in {}",
            selected,
            ui::plural(rows.len(), "group"),
            settings.region
        ));
    }
    Ok(())
}

fn rows(configs: &GroupConfigs, region: &str) -> Vec<GroupRow> {
    configs
        .iter()
        .map(|(name, config)| GroupRow {
            name: name.to_string(),
            region: config.region().to_string(),
            selected: config.region() == region,
            rules: Direction::ALL
                .iter()
                .map(|&dir| config.rules(dir).len())
                .sum(),
        })
        .collect()
}
