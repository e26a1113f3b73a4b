// djdesk-aio/src/lib.rs
//! IO operations for djdesk (filesystem, checksums, archives, processes, git)

pub mod checksum;
pub mod extract;
pub mod fs;
pub mod git2;
pub mod process;

pub use checksum::{sha256_file_async, verify_checksum_async};
pub use extract::extract_archive_async;
pub use self::git2::short_head_revision;
pub use process::{captured_text, ensure_success, run_command_async, status_label};
