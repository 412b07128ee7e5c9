//! Control-plane seam.
//!
//! [`ControlPlane`] is everything the reconciler needs from the remote API.
//! [`aws::AwsCliBackend`] binds it to the aws CLI; [`MockBackend`] keeps
//! groups in memory and mimics how the provider coalesces sources that
//! share protocol and ports into one permission record.

pub mod aws;

use crate::error::{Error, Result};
use crate::rule::LiveHandle;
use crate::types::{Direction, GroupDescriptor, IpPermission, IpRange, Protocol};
use std::sync::{Arc, Mutex};

/// Operations consumed from the security group control-plane.
pub trait ControlPlane: Send + Sync {
    /// Every group visible in the region.
    fn list_groups(&self) -> Result<Vec<GroupDescriptor>>;

    fn create_group(&self, name: &str, vpc: &str, description: &str) -> Result<GroupDescriptor>;

    /// Fresh ingress records for a group.
    fn ingress_permissions(&self, group_id: &str) -> Result<Vec<IpPermission>>;

    /// Fresh egress records for a group.
    fn egress_permissions(&self, group_id: &str) -> Result<Vec<IpPermission>>;

    fn authorize_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<()>;

    fn authorize_egress(&self, group_id: &str, permission: &IpPermission) -> Result<()>;

    /// Revoke the permission a live rule was read from.
    fn revoke(&self, handle: &LiveHandle) -> Result<()>;

    fn permissions(&self, group_id: &str, direction: Direction) -> Result<Vec<IpPermission>> {
        match direction {
            Direction::Inbound => self.ingress_permissions(group_id),
            Direction::Outbound => self.egress_permissions(group_id),
        }
    }
}

/// Calls recorded by [`MockBackend`].
#[derive(Debug, Clone, Default)]
pub struct BackendCalls {
    pub list_groups: usize,
    pub create_group: Vec<String>,
    pub list_permissions: usize,
    pub authorize: Vec<(String, Direction, IpPermission)>,
    pub revoke: Vec<LiveHandle>,
}

impl BackendCalls {
    /// Number of calls that changed remote state.
    pub fn mutations(&self) -> usize {
        self.create_group.len() + self.authorize.len() + self.revoke.len()
    }
}

#[derive(Debug, Default)]
struct MockState {
    groups: Vec<GroupDescriptor>,
    next_id: u32,
    rejected_sources: Vec<String>,
    broken_groups: Vec<String>,
    calls: BackendCalls,
}

impl MockState {
    fn group_mut(&mut self, group_id: &str) -> Result<&mut GroupDescriptor> {
        self.groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| {
                Error::provider(
                    "InvalidGroup.NotFound",
                    format!("The security group '{group_id}' does not exist"),
                )
            })
    }

    fn permissions(&mut self, group_id: &str, direction: Direction) -> Result<Vec<IpPermission>> {
        self.calls.list_permissions += 1;
        if self.broken_groups.iter().any(|g| g == group_id) {
            return Err(Error::provider(
                "RequestLimitExceeded",
                "Request limit exceeded.",
            ));
        }
        Ok(self.group_mut(group_id)?.permissions(direction).to_vec())
    }

    fn authorize(
        &mut self,
        group_id: &str,
        direction: Direction,
        permission: &IpPermission,
    ) -> Result<()> {
        self.calls
            .authorize
            .push((group_id.to_string(), direction, permission.clone()));

        let rejected = sources(permission)
            .into_iter()
            .find(|source| self.rejected_sources.contains(source));
        if let Some(source) = rejected {
            return Err(Error::provider(
                "InvalidPermission.Malformed",
                format!("source {source} rejected"),
            ));
        }

        let group = self.group_mut(group_id)?;
        let records = group.permissions_mut(direction);
        let Some(record) = records.iter_mut().find(|r| r.same_shape(permission)) else {
            records.push(permission.clone());
            return Ok(());
        };

        let existing = sources(record);
        if sources(permission).iter().any(|s| existing.contains(s)) {
            return Err(Error::provider(
                "InvalidPermission.Duplicate",
                "the specified rule already exists",
            ));
        }
        record.ip_ranges.extend(permission.ip_ranges.iter().cloned());
        record.ipv6_ranges.extend(permission.ipv6_ranges.iter().cloned());
        record
            .user_id_group_pairs
            .extend(permission.user_id_group_pairs.iter().cloned());
        Ok(())
    }

    fn revoke(&mut self, handle: &LiveHandle) -> Result<()> {
        self.calls.revoke.push(handle.clone());

        let not_found = || {
            Error::provider(
                "InvalidPermission.NotFound",
                "The specified rule does not exist in this security group.",
            )
        };
        let group = self.group_mut(&handle.group_id)?;
        let records = group.permissions_mut(handle.direction);
        let index = records
            .iter()
            .position(|r| r.same_shape(&handle.permission))
            .ok_or_else(not_found)?;

        let doomed = sources(&handle.permission);
        let record = &mut records[index];
        let before = record.source_count();
        record.ip_ranges.retain(|r| !doomed.contains(&r.cidr_ip));
        record.ipv6_ranges.retain(|r| !doomed.contains(&r.cidr_ipv6));
        record
            .user_id_group_pairs
            .retain(|p| !p.group_id.as_ref().is_some_and(|id| doomed.contains(id)));
        if record.source_count() == before {
            return Err(not_found());
        }
        if record.source_count() == 0 {
            records.remove(index);
        }
        Ok(())
    }
}

/// Source identifiers carried by a permission record.
fn sources(permission: &IpPermission) -> Vec<String> {
    permission
        .ip_ranges
        .iter()
        .map(|r| r.cidr_ip.clone())
        .chain(permission.ipv6_ranges.iter().map(|r| r.cidr_ipv6.clone()))
        .chain(
            permission
                .user_id_group_pairs
                .iter()
                .filter_map(|p| p.group_id.clone()),
        )
        .collect()
}

/// In-memory control-plane for tests.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing group in `vpc-mock` and return its id.
    pub fn add_group(&self, name: &str) -> String {
        self.add_group_in_vpc(name, "vpc-mock")
    }

    /// Register an existing group in a given VPC and return its id.
    pub fn add_group_in_vpc(&self, name: &str, vpc: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("sg-{:08x}", state.next_id);
        let mut group = GroupDescriptor::new(&id, name);
        group.vpc_id = Some(vpc.to_string());
        state.groups.push(group);
        id
    }

    /// Seed a live permission record directly, bypassing coalescing.
    pub fn add_permission(&self, group_id: &str, direction: Direction, permission: IpPermission) {
        let mut state = self.state.lock().unwrap();
        if let Ok(group) = state.group_mut(group_id) {
            group.permissions_mut(direction).push(permission);
        }
    }

    /// Make authorize calls naming `source` fail.
    pub fn reject_source(&self, source: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_sources
            .push(source.to_string());
    }

    /// Make permission listings for `group_id` fail.
    pub fn break_group(&self, group_id: &str) {
        self.state
            .lock()
            .unwrap()
            .broken_groups
            .push(group_id.to_string());
    }

    pub fn group(&self, name: &str) -> Option<GroupDescriptor> {
        let state = self.state.lock().unwrap();
        state.groups.iter().find(|g| g.name == name).cloned()
    }

    pub fn calls(&self) -> BackendCalls {
        self.state.lock().unwrap().calls.clone()
    }
}

impl ControlPlane for MockBackend {
    fn list_groups(&self) -> Result<Vec<GroupDescriptor>> {
        let mut state = self.state.lock().unwrap();
        state.calls.list_groups += 1;
        Ok(state.groups.clone())
    }

    fn create_group(&self, name: &str, vpc: &str, description: &str) -> Result<GroupDescriptor> {
        let mut state = self.state.lock().unwrap();
        state.calls.create_group.push(name.to_string());
        if state
            .groups
            .iter()
            .any(|g| g.name == name && g.vpc_id.as_deref() == Some(vpc))
        {
            return Err(Error::provider(
                "InvalidGroup.Duplicate",
                format!("The security group '{name}' already exists"),
            ));
        }

        state.next_id += 1;
        let mut group = GroupDescriptor::new(format!("sg-{:08x}", state.next_id), name);
        group.vpc_id = Some(vpc.to_string());
        group.description = description.to_string();
        // new VPC groups allow all egress
        group.ip_permissions_egress.push(IpPermission {
            ip_protocol: Protocol::All.as_api_str().to_string(),
            ip_ranges: vec![IpRange {
                cidr_ip: "0.0.0.0/0".to_string(),
                description: None,
            }],
            ..Default::default()
        });
        state.groups.push(group.clone());
        Ok(group)
    }

    fn ingress_permissions(&self, group_id: &str) -> Result<Vec<IpPermission>> {
        self.state
            .lock()
            .unwrap()
            .permissions(group_id, Direction::Inbound)
    }

    fn egress_permissions(&self, group_id: &str) -> Result<Vec<IpPermission>> {
        self.state
            .lock()
            .unwrap()
            .permissions(group_id, Direction::Outbound)
    }

    fn authorize_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .authorize(group_id, Direction::Inbound, permission)
    }

    fn authorize_egress(&self, group_id: &str, permission: &IpPermission) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .authorize(group_id, Direction::Outbound, permission)
    }

    fn revoke(&self, handle: &LiveHandle) -> Result<()> {
        self.state.lock().unwrap().revoke(handle)
    }
}
