use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "sgczar")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative AWS security group rules", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding settings.toml and one <group>.toml per group
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create missing groups and converge every group's rules
    Apply(RunArgs),

    /// Show what apply would change, without changing anything
    Diff(RunArgs),

    /// List configured groups and their regions
    Groups(GroupsArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Environment name, substituted for ${environment} in group files
    pub environment: String,

    /// Region to reconcile (overrides settings.toml)
    #[arg(long)]
    pub region: Option<String>,

    /// AWS profile to use (overrides settings.toml)
    #[arg(long)]
    pub profile: Option<String>,

    /// Six-digit MFA token, for unattended runs
    #[arg(long, env = "SGCZAR_MFA_TOKEN", value_parser = parse_token, hide_env_values = true)]
    pub mfa_token: Option<String>,

    /// Don't use an MFA session even if settings.toml asks for one
    #[arg(long)]
    pub no_mfa: bool,
}

#[derive(Debug, Args)]
pub struct GroupsArgs {
    /// Environment name, substituted for ${environment} in group files
    #[arg(default_value = "default")]
    pub environment: String,

    /// Region to highlight (overrides settings.toml)
    #[arg(long)]
    pub region: Option<String>,
}

fn parse_token(value: &str) -> Result<String, String> {
    if authkit::is_valid_token(value) {
        Ok(value.to_string())
    } else {
        Err("MFA token must be exactly 6 digits".to_string())
    }
}
