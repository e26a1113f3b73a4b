// djdesk-common/src/model/mod.rs
pub mod bundle;
pub mod snapshot;

pub use bundle::{Arch, BundleSpec, Platform};
pub use snapshot::{EntryId, SchemaGraph, StatusSnapshot, TaskEntry};
