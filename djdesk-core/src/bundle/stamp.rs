// djdesk-core/src/bundle/stamp.rs
//! The bundle's `VERSION` file: source revision plus build time.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use djdesk_aio::fs::atomic_write_file;
use djdesk_aio::short_head_revision;
use djdesk_common::error::Result;
use tracing::debug;

pub const UNKNOWN_REVISION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStamp {
    pub revision: String,
    pub built_at: DateTime<Utc>,
}

impl VersionStamp {
    /// Falls back to `unknown` when the project isn't a git checkout.
    pub fn capture(project_root: &Path) -> Self {
        let revision = short_head_revision(project_root).unwrap_or_else(|e| {
            debug!("No source revision for {}: {}", project_root.display(), e);
            UNKNOWN_REVISION.to_string()
        });
        Self {
            revision,
            built_at: Utc::now(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}\nBuilt: {}\n",
            self.revision,
            self.built_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    pub fn parse(text: &str) -> Option<Self> {
        let mut lines = text.lines();
        let revision = lines.next()?.trim();
        let built = lines.next()?.strip_prefix("Built:")?.trim();
        let built_at = DateTime::parse_from_rfc3339(built).ok()?.with_timezone(&Utc);
        if revision.is_empty() {
            return None;
        }
        Some(Self {
            revision: revision.to_string(),
            built_at,
        })
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        atomic_write_file(path, self.render().as_bytes())
    }

    /// Reads a stamp back; `None` for a missing or malformed file.
    pub fn read_from(path: &Path) -> Option<Self> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|text| Self::parse(&text))
    }
}
