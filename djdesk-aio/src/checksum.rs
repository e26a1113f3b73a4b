// djdesk-aio/src/checksum.rs
use std::path::Path;

use djdesk_common::error::{DjdeskError, Result};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

const READ_CHUNK: usize = 64 * 1024;

/// Streams a file through SHA-256 and returns the lowercase hex digest.
/// The file is never held in memory as a whole.
pub async fn sha256_file_async(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = Vec::with_capacity(READ_CHUNK);
    let mut total_bytes_read: u64 = 0;

    loop {
        buffer.clear();
        match file.read_buf(&mut buffer).await? {
            0 => break,
            n => {
                hasher.update(&buffer[..n]);
                total_bytes_read += n as u64;
            }
        }
    }

    let actual = hex::encode(hasher.finalize());
    debug!(
        "Calculated SHA256 for {}: {} ({} bytes read)",
        path.display(),
        actual,
        total_bytes_read
    );
    Ok(actual)
}

/// Verifies `path` against `expected`; `asset` names the file in the error.
pub async fn verify_checksum_async(path: &Path, asset: &str, expected: &str) -> Result<()> {
    debug!("Verifying checksum for: {}", path.display());
    let actual = sha256_file_async(path).await?;
    debug!("Expected SHA256:   {}", expected);

    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(DjdeskError::ChecksumMismatch {
            asset: asset.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[tokio::test]
    async fn digest_matches_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(sha256_file_async(&path).await.unwrap(), ABC_SHA256);
        verify_checksum_async(&path, "abc.txt", &ABC_SHA256.to_uppercase())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn digest_spans_multiple_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let content = vec![7u8; READ_CHUNK * 3 + 11];
        std::fs::write(&path, &content).unwrap();

        let expected = hex::encode(Sha256::digest(&content));
        assert_eq!(sha256_file_async(&path).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn mismatch_reports_asset_and_both_digests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abd").unwrap();

        match verify_checksum_async(&path, "cpython.tar.gz", ABC_SHA256).await {
            Err(DjdeskError::ChecksumMismatch {
                asset,
                expected,
                actual,
            }) => {
                assert_eq!(asset, "cpython.tar.gz");
                assert_eq!(expected, ABC_SHA256);
                assert_ne!(actual, ABC_SHA256);
            }
            other => panic!("expected ChecksumMismatch, got {other:?}"),
        }
    }
}
