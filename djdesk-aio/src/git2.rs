/*
File: djdesk-aio/src/git2.rs
Purpose: Source revision lookup using git2.
*/
use std::path::Path;

use djdesk_common::error::{DjdeskError, Result};
use git2::Repository;
use tracing::debug;

/// Returns the abbreviated id of the commit `HEAD` points at, discovering the
/// repository from `path` upwards.
pub fn short_head_revision(path: &Path) -> Result<String> {
    let repo = Repository::discover(path)?;
    let commit = repo.head()?.peel_to_commit()?;
    let short = commit.as_object().short_id()?;
    let short = short
        .as_str()
        .ok_or_else(|| DjdeskError::Generic("Revision id is not valid UTF-8".to_string()))?
        .to_string();
    debug!("HEAD of {} is {}", path.display(), short);
    Ok(short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_short_id_of_head_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let signature = git2::Signature::now("djdesk", "djdesk@example.invalid").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let oid = repo
            .commit(Some("HEAD"), &signature, &signature, "init", &tree, &[])
            .unwrap();

        let nested = dir.path().join("src");
        std::fs::create_dir_all(&nested).unwrap();
        let short = short_head_revision(&nested).unwrap();
        assert!(short.len() >= 7);
        assert!(oid.to_string().starts_with(&short));
    }

    #[test]
    fn non_repository_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A bare temp dir may still sit inside some checkout; only assert when it doesn't.
        if Repository::discover(dir.path()).is_err() {
            assert!(short_head_revision(dir.path()).is_err());
        }
    }
}
