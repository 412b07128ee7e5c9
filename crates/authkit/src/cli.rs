//! Thin runner for the `aws` executable.

use crate::error::{Error, Result};
use crate::types::{AuthContext, Service};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Location of the aws CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCli {
    path: PathBuf,
}

impl AwsCli {
    /// Find `aws` in PATH.
    pub fn locate() -> Result<Self> {
        let path = which::which("aws").map_err(|_| Error::CliNotFound)?;
        log::debug!("Using aws CLI at {}", path.display());
        Ok(Self { path })
    }

    /// Use an explicit executable path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the executable.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// An authenticated handle for one service.
///
/// Every call runs `aws <service> <operation> --output json` with the
/// client's region, profile and session credentials attached.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    cli: AwsCli,
    service: Service,
    auth: AuthContext,
}

impl ServiceClient {
    pub fn new(cli: AwsCli, service: Service, auth: AuthContext) -> Self {
        Self { cli, service, auth }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Build the command for an operation without running it.
    pub fn command(&self, operation: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(self.cli.path());
        cmd.arg(self.service.cli_name())
            .arg(operation)
            .args(args)
            .args(["--output", "json"])
            .env("AWS_PAGER", "");
        self.auth.apply(&mut cmd);
        cmd
    }

    /// Run an operation and return its stdout.
    pub fn run(&self, operation: &str, args: &[&str]) -> Result<String> {
        let label = format!("{} {}", self.service, operation);
        log::debug!("Running aws {label}");

        let output = self
            .command(operation, args)
            .output()
            .map_err(|e| Error::CommandFailed {
                message: format!("failed to execute aws {label}: {e}"),
                stderr: String::new(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_cli_output(&stderr, &label));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run an operation and parse its JSON output.
    pub fn run_json<T: DeserializeOwned>(&self, operation: &str, args: &[&str]) -> Result<T> {
        let stdout = self.run(operation, args)?;
        Ok(serde_json::from_str(&stdout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_shape() {
        let client = ServiceClient::new(
            AwsCli::at("/usr/local/bin/aws"),
            Service::Ec2,
            AuthContext::new("us-east-1", None),
        );
        let cmd = client.command("describe-security-groups", &["--group-ids", "sg-1"]);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            [
                "ec2",
                "describe-security-groups",
                "--group-ids",
                "sg-1",
                "--output",
                "json",
                "--region",
                "us-east-1"
            ]
        );
        assert_eq!(cmd.get_program(), "/usr/local/bin/aws");
    }

    #[test]
    fn test_run_missing_executable() {
        let client = ServiceClient::new(
            AwsCli::at("/nonexistent/aws"),
            Service::Sts,
            AuthContext::new("us-east-1", None),
        );
        let err = client.run("get-caller-identity", &[]).unwrap_err();
        assert_eq!(err.class(), "CommandFailed");
    }
}
