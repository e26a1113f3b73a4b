// djdesk-aio/src/extract.rs
// Archive extraction for interpreter downloads.

use std::path::Path;

use djdesk_common::error::{DjdeskError, Result};
use flate2::read::GzDecoder;
use tokio::fs;
use tracing::debug;

/// Extracts a `.tar.gz` / `.tgz` archive into `target_dir`, creating it if needed.
/// Decompression runs on the blocking pool and streams from disk.
pub async fn extract_archive_async(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    debug!(
        "Extracting archive '{}' to '{}'",
        archive_path.display(),
        target_dir.display()
    );

    if !(file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz")) {
        return Err(DjdeskError::Generic(format!(
            "Unsupported archive format: {}",
            archive_path.display()
        )));
    }

    fs::create_dir_all(target_dir).await?;

    let archive_path = archive_path.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive_path)?;
        let decoder = GzDecoder::new(std::io::BufReader::new(file));
        let mut archive = tar::Archive::new(decoder);
        archive.set_preserve_permissions(true);
        archive.unpack(&target_dir).map_err(|e| {
            DjdeskError::Generic(format!(
                "Failed to unpack {}: {e}",
                archive_path.display()
            ))
        })
    })
    .await
    .map_err(|e| DjdeskError::Generic(format!("JoinError in GZipped TAR extraction: {e}")))?
}
