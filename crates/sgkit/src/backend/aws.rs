//! Control-plane backed by `aws ec2`.

use super::ControlPlane;
use crate::error::{Error, Result};
use crate::rule::LiveHandle;
use crate::types::{Direction, GroupDescriptor, IpPermission};
use authkit::{ClientOptions, CredentialBroker, IdentityProvider, ServiceClient, TokenSource};
use serde::Deserialize;
use std::sync::{Arc, Mutex};

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecurityGroupsOutput {
    #[serde(default)]
    security_groups: Vec<GroupDescriptor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSecurityGroupOutput {
    group_id: String,
}

/// Hands out an EC2 client whose credentials are valid for the next call.
pub trait Ec2Clients: Send + Sync {
    fn ec2(&self) -> Result<Arc<ServiceClient>>;
}

/// A fixed client, for credentials that never expire.
impl Ec2Clients for Arc<ServiceClient> {
    fn ec2(&self) -> Result<Arc<ServiceClient>> {
        Ok(Arc::clone(self))
    }
}

/// Clients from a broker, which rebuilds them and challenges for MFA
/// again once their session has expired.
impl<I, T> Ec2Clients for Mutex<CredentialBroker<I, T>>
where
    I: IdentityProvider + Send,
    T: TokenSource + Send,
{
    fn ec2(&self) -> Result<Arc<ServiceClient>> {
        let mut broker = self
            .lock()
            .map_err(|_| Error::Other("credential broker lock poisoned".to_string()))?;
        Ok(broker.ec2(&ClientOptions::default())?)
    }
}

/// EC2 security groups through authenticated aws CLI clients.
pub struct AwsCliBackend {
    clients: Box<dyn Ec2Clients>,
}

impl AwsCliBackend {
    pub fn new(clients: impl Ec2Clients + 'static) -> Self {
        Self {
            clients: Box::new(clients),
        }
    }

    /// Backend that asks `broker` for a client before every call.
    pub fn with_broker<I, T>(broker: CredentialBroker<I, T>) -> Self
    where
        I: IdentityProvider + Send + 'static,
        T: TokenSource + Send + 'static,
    {
        Self::new(Mutex::new(broker))
    }

    fn describe_group(&self, group_id: &str) -> Result<GroupDescriptor> {
        let output: DescribeSecurityGroupsOutput = self
            .clients
            .ec2()?
            .run_json("describe-security-groups", &["--group-ids", group_id])
            .map_err(Error::from_cli)?;
        output.security_groups.into_iter().next().ok_or_else(|| {
            Error::provider(
                "InvalidGroup.NotFound",
                format!("The security group '{group_id}' does not exist"),
            )
        })
    }

    fn permission_call(
        &self,
        operation: &str,
        group_id: &str,
        permission: &IpPermission,
    ) -> Result<()> {
        let permissions = serde_json::to_string(&[permission])?;
        log::debug!("{operation} {group_id} {permissions}");
        self.clients
            .ec2()?
            .run(
                operation,
                &["--group-id", group_id, "--ip-permissions", &permissions],
            )
            .map_err(Error::from_cli)?;
        Ok(())
    }
}

impl ControlPlane for AwsCliBackend {
    fn list_groups(&self) -> Result<Vec<GroupDescriptor>> {
        let output: DescribeSecurityGroupsOutput = self
            .clients
            .ec2()?
            .run_json("describe-security-groups", &[])
            .map_err(Error::from_cli)?;
        Ok(output.security_groups)
    }

    fn create_group(&self, name: &str, vpc: &str, description: &str) -> Result<GroupDescriptor> {
        let output: CreateSecurityGroupOutput = self
            .clients
            .ec2()?
            .run_json(
                "create-security-group",
                &[
                    "--group-name",
                    name,
                    "--description",
                    description,
                    "--vpc-id",
                    vpc,
                ],
            )
            .map_err(Error::from_cli)?;

        Ok(GroupDescriptor {
            vpc_id: Some(vpc.to_string()),
            description: description.to_string(),
            ..GroupDescriptor::new(output.group_id, name)
        })
    }

    fn ingress_permissions(&self, group_id: &str) -> Result<Vec<IpPermission>> {
        Ok(self.describe_group(group_id)?.ip_permissions)
    }

    fn egress_permissions(&self, group_id: &str) -> Result<Vec<IpPermission>> {
        Ok(self.describe_group(group_id)?.ip_permissions_egress)
    }

    fn authorize_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<()> {
        self.permission_call("authorize-security-group-ingress", group_id, permission)
    }

    fn authorize_egress(&self, group_id: &str, permission: &IpPermission) -> Result<()> {
        self.permission_call("authorize-security-group-egress", group_id, permission)
    }

    fn revoke(&self, handle: &LiveHandle) -> Result<()> {
        let operation = match handle.direction {
            Direction::Inbound => "revoke-security-group-ingress",
            Direction::Outbound => "revoke-security-group-egress",
        };
        self.permission_call(operation, &handle.group_id, &handle.permission)
    }
}
