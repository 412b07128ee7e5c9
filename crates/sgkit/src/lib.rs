//! # sgkit
//!
//! Declarative security group reconciliation.
//!
//! Desired rules come from typed per-group configuration; live rules come
//! from a [`ControlPlane`]. Each group is converged in two phases: unwanted
//! rules are revoked, the diff is computed again, and the missing rules are
//! authorized.
//!
//! ## Example
//!
//! ```
//! use sgkit::{
//!     ControlPlane, GroupConfig, GroupConfigs, MockBackend, ReconciliationDriver, SilentObserver,
//! };
//!
//! let backend = MockBackend::new();
//! backend.add_group("web");
//!
//! let mut configs = GroupConfigs::new();
//! configs.insert("web", GroupConfig::default());
//!
//! let driver = ReconciliationDriver::new(&backend, &configs, "us-east-1");
//! let summary = driver.reconcile_all(&mut SilentObserver).unwrap();
//! assert!(summary.is_success());
//! assert_eq!(backend.list_groups().unwrap().len(), 1);
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod diff;
pub mod driver;
pub mod error;
pub mod group;
pub mod report;
pub mod resolver;
pub mod rule;
pub mod types;

pub use backend::aws::{AwsCliBackend, Ec2Clients};
pub use backend::{BackendCalls, ControlPlane, MockBackend};
pub use config::{GroupConfig, GroupConfigs, GroupRefSpec, PortSpec, RuleSpec};
pub use diff::{DirectionDiff, RulesDiff, diff_rules};
pub use driver::{GroupPlan, PlanKind, ReconciliationDriver};
pub use error::{Error, Result};
pub use group::SecurityGroup;
pub use report::{
    GroupReport, ReconcileObserver, RuleAction, RuleOutcome, RuleReport, RunSummary,
    SilentObserver,
};
pub use resolver::GroupResolver;
pub use rule::{LiveHandle, Rule};
pub use types::{
    DEFAULT_GROUP_REGION, Direction, GroupDescriptor, GroupRef, IpPermission, PortRange,
    Protocol, Source,
};
