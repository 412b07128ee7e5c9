//! Identity provider backed by `aws iam` and `aws sts`.

use crate::cli::{AwsCli, ServiceClient};
use crate::error::Result;
use crate::identity::IdentityProvider;
use crate::types::{AuthContext, Credentials, MfaDevice, Service, Session};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserOutput {
    user: User,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct User {
    user_name: String,
}

#[derive(Deserialize)]
struct ListMfaDevicesOutput {
    #[serde(rename = "MFADevices", default)]
    mfa_devices: Vec<MfaDevice>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAccountAliasesOutput {
    #[serde(default)]
    account_aliases: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSessionTokenOutput {
    credentials: Credentials,
}

/// Identity provider that shells out to the aws CLI.
///
/// Clients built here carry the profile only. IAM and STS are global, so
/// the region is just the one the run targets.
#[derive(Debug, Clone)]
pub struct AwsCliIdentity {
    cli: AwsCli,
    region: String,
}

impl AwsCliIdentity {
    pub fn new(cli: AwsCli, region: impl Into<String>) -> Self {
        Self {
            cli,
            region: region.into(),
        }
    }

    fn client(&self, service: Service, profile: Option<&str>) -> ServiceClient {
        let auth = AuthContext::new(self.region.clone(), profile.map(str::to_string));
        ServiceClient::new(self.cli.clone(), service, auth)
    }
}

impl IdentityProvider for AwsCliIdentity {
    fn current_user(&self, profile: Option<&str>) -> Result<String> {
        let output: GetUserOutput = self.client(Service::Iam, profile).run_json("get-user", &[])?;
        Ok(output.user.user_name)
    }

    fn list_mfa_devices(&self, profile: Option<&str>, user: &str) -> Result<Vec<MfaDevice>> {
        let output: ListMfaDevicesOutput = self
            .client(Service::Iam, profile)
            .run_json("list-mfa-devices", &["--user-name", user])?;
        Ok(output.mfa_devices)
    }

    fn account_alias(&self, profile: Option<&str>) -> Result<Option<String>> {
        let output: ListAccountAliasesOutput = self
            .client(Service::Iam, profile)
            .run_json("list-account-aliases", &[])?;
        Ok(output.account_aliases.into_iter().next())
    }

    fn session_token(
        &self,
        profile: Option<&str>,
        serial_number: &str,
        token_code: &str,
        duration_seconds: u32,
    ) -> Result<Session> {
        let duration = duration_seconds.to_string();
        let output: GetSessionTokenOutput = self.client(Service::Sts, profile).run_json(
            "get-session-token",
            &[
                "--serial-number",
                serial_number,
                "--token-code",
                token_code,
                "--duration-seconds",
                &duration,
            ],
        )?;

        Ok(Session {
            profile: profile.map(str::to_string),
            credentials: output.credentials,
        })
    }
}
