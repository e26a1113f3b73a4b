// djdesk-net/src/lib.rs
pub mod health;
pub mod http;
pub mod inspector;
pub mod validation;

pub use djdesk_common::error::{DjdeskError, Result};
pub use health::{HealthProbe, HttpHealthProbe, ProbeOutcome};
pub use http::fetch_to_cache;
pub use inspector::{InspectorClient, TaskRequest, TaskSubmission};
pub use validation::validate_url;
