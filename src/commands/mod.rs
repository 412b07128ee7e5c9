pub mod apply;
pub mod diff;
pub mod groups;

use crate::Context;
use crate::cli::RunArgs;
use crate::config::{ConfigDir, Overrides};
use crate::paths;
use crate::prompt::Tokens;
use crate::ui;
use anyhow::{Context as AnyhowContext, Result};
use authkit::identity::aws::AwsCliIdentity;
use authkit::{AuthSettings, AwsCli, ClientOptions, CredentialBroker};
use sgkit::{AwsCliBackend, GroupConfigs};

/// Everything a run needs before the first API call.
pub struct RunSetup {
    pub environment: String,
    pub settings: AuthSettings,
    pub configs: GroupConfigs,
}

impl RunSetup {
    /// Resolve the config directory, settings and group files.
    pub fn load(ctx: &Context, args: &RunArgs) -> Result<Self> {
        let config_dir = ConfigDir::open(paths::config_dir(ctx.config_dir.as_deref())?)?;
        let overrides = Overrides {
            region: args.region.clone(),
            profile: args.profile.clone(),
            no_mfa: args.no_mfa,
        };
        let settings = config_dir
            .settings()?
            .resolve(&args.environment, &overrides);
        let configs = config_dir.load_groups(&args.environment, &settings.region)?;

        if ctx.verbose > 0 {
            ui::kv("Config", &config_dir.path().display().to_string());
            ui::kv("Environment", &args.environment);
            ui::kv("Region", &settings.region);
            ui::kv(
                "Profile",
                settings.profile.as_deref().unwrap_or("(default chain)"),
            );
            ui::kv("MFA", if settings.mfa { "on" } else { "off" });
        }

        Ok(Self {
            environment: args.environment.clone(),
            settings,
            configs,
        })
    }

    pub fn region(&self) -> &str {
        &self.settings.region
    }

    /// Authenticate and build the EC2 control plane.
    ///
    /// The first client is built up front. The backend then asks the broker
    /// for a client before every call.
    pub fn connect(&self, mfa_token: Option<&str>) -> Result<AwsCliBackend> {
        let cli = AwsCli::locate()?;
        let identity = AwsCliIdentity::new(cli.clone(), self.settings.region.clone());
        let tokens = Tokens::select(mfa_token)?;
        let mut broker = CredentialBroker::new(self.settings.clone(), cli, identity, tokens);
        broker
            .ec2(&ClientOptions::default())
            .context("Failed to authenticate")?;
        Ok(AwsCliBackend::with_broker(broker))
    }
}
