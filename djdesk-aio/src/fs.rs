/*
File: djdesk-aio/src/fs.rs
Purpose: Synchronous filesystem primitives used by the bundle pipeline.
*/
use std::fs;
use std::io::{self, Write};
use std::path::Path;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use djdesk_common::error::{DjdeskError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Removes `path` (if present) and creates it again, empty.
pub fn recreate_dir(path: &Path) -> Result<()> {
    debug!("Recreating directory: {}", path.display());
    remove_dir_if_exists(path)?;
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        DjdeskError::from(e)
    })
}

/// Removes a directory tree; a missing directory is not an error.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed directory recursively: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed remove dir_all {}: {}", path.display(), e);
            Err(DjdeskError::from(e))
        }
    }
}

/// Recursively copies `src` into `dst`, skipping any entry for which `skip`
/// returns true (skipped directories are not descended into). Symlinks are
/// recreated as symlinks on Unix.
pub fn copy_tree<F>(src: &Path, dst: &Path, skip: F) -> Result<u64>
where
    F: Fn(&Path) -> bool,
{
    debug!("Copying tree {} -> {}", src.display(), dst.display());
    let mut copied = 0u64;
    fs::create_dir_all(dst)?;

    let walker = WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !skip(entry.path()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            DjdeskError::IoError(format!("Failed to walk {}: {e}", src.display()))
        })?;
        let relative = entry.path().strip_prefix(src).map_err(|e| {
            DjdeskError::IoError(format!("Path {} escaped {}: {e}", entry.path().display(), src.display()))
        })?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target).map_err(|e| {
                error!(
                    "Failed copy {} -> {}: {}",
                    entry.path().display(),
                    target.display(),
                    e
                );
                DjdeskError::from(e)
            })?;
            copied += 1;
        }
    }
    debug!("Copied {} entries into {}", copied, dst.display());
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link_target = fs::read_link(src)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(&link_target, dst).map_err(DjdeskError::from)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst).map(|_| ()).map_err(DjdeskError::from)
}

/// Moves a directory, falling back to copy-then-delete when the rename
/// crosses a filesystem boundary.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    debug!("Moving {} -> {}", src.display(), dst.display());
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(
                "Rename crosses filesystems ({}); copying {} instead",
                e,
                src.display()
            );
            copy_tree(src, dst, |_| false)?;
            if let Err(e) = remove_dir_if_exists(src) {
                warn!("Could not remove {} after copy: {}", src.display(), e);
            }
            Ok(())
        }
        Err(e) => {
            error!("Failed rename {} -> {}: {}", src.display(), dst.display(), e);
            Err(DjdeskError::from(e))
        }
    }
}

#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(windows)]
fn is_cross_device(err: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    err.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_err: &io::Error) -> bool {
    false
}

/// Sets file permissions (Unix only). Mode is standard Unix octal mode.
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    debug!("Setting permissions on {}: {:o}", path.display(), mode);
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
        error!("Failed set permissions on {}: {}", path.display(), e);
        DjdeskError::from(e)
    })
}

#[cfg(not(unix))]
pub fn set_permissions(path: &Path, _mode: u32) -> Result<()> {
    debug!(
        "Skipping permission change on this platform: {}",
        path.display()
    );
    Ok(())
}

/// Writes `content` via a temp file in the same directory and renames it into
/// place, so readers never see a partially written file.
pub fn atomic_write_file(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        DjdeskError::IoError(format!("Cannot get parent directory for {}", path.display()))
    })?;
    fs::create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        path.display(),
        temp_file.path().display()
    );
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(path).map_err(|e| {
        error!(
            "Failed to persist temporary file over {}: {}",
            path.display(),
            e.error
        );
        DjdeskError::from(e.error)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recreate_dir_drops_old_contents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bundle");
        fs::create_dir_all(target.join("stale")).unwrap();
        fs::write(target.join("stale/file"), b"x").unwrap();

        recreate_dir(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);

        // missing directory is fine too
        recreate_dir(&dir.path().join("fresh")).unwrap();
    }

    #[test]
    fn copy_tree_skips_excluded_directories() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("pkg/__pycache__")).unwrap();
        fs::create_dir_all(src.join("pkg/sub")).unwrap();
        fs::write(src.join("pkg/__init__.py"), b"").unwrap();
        fs::write(src.join("pkg/__pycache__/x.pyc"), b"bytecode").unwrap();
        fs::write(src.join("pkg/sub/mod.py"), b"A = 1").unwrap();

        let dst = dir.path().join("dst");
        let copied = copy_tree(&src, &dst, |p| {
            p.file_name().is_some_and(|n| n == "__pycache__")
        })
        .unwrap();

        assert_eq!(copied, 2);
        assert!(dst.join("pkg/__init__.py").is_file());
        assert_eq!(fs::read(dst.join("pkg/sub/mod.py")).unwrap(), b"A = 1");
        assert!(!dst.join("pkg/__pycache__").exists());
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_preserves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("python");
        fs::create_dir_all(src.join("bin")).unwrap();
        fs::write(src.join("bin/python3.14"), b"#!").unwrap();
        std::os::unix::fs::symlink("python3.14", src.join("bin/python3")).unwrap();

        let dst = dir.path().join("copy");
        copy_tree(&src, &dst, |_| false).unwrap();
        let link = fs::read_link(dst.join("bin/python3")).unwrap();
        assert_eq!(link, Path::new("python3.14"));
    }

    #[test]
    fn move_dir_relocates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("scratch/python");
        fs::create_dir_all(src.join("bin")).unwrap();
        fs::write(src.join("bin/python3"), b"#!").unwrap();

        let dst = dir.path().join("bundle/python");
        move_dir(&src, &dst).unwrap();
        assert!(dst.join("bin/python3").is_file());
        assert!(!src.exists());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VERSION");
        atomic_write_file(&path, b"one").unwrap();
        atomic_write_file(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }
}
