// djdesk-core/src/lib.rs
pub mod bundle;
pub mod dashboard;
pub mod instance;
pub mod interpreter;
pub mod supervisor;

#[cfg(all(test, unix))]
pub(crate) mod test_support;

pub use bundle::{AcquisitionStrategy, BundleArtifact, Bundler, InterpreterSource};
pub use dashboard::{DashboardEvent, DashboardPoller, WorkspaceStatus};
pub use instance::{InstanceGuard, InstanceRole};
pub use supervisor::{Supervisor, SupervisorState};

pub use djdesk_common::{Config, DjdeskError, Result};
