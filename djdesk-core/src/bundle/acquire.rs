// djdesk-core/src/bundle/acquire.rs
//! Ways of producing the interpreter root inside a bundle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use djdesk_aio::fs::{move_dir, remove_dir_if_exists, set_permissions};
use djdesk_aio::process::{ensure_success, run_command_async};
use djdesk_aio::{extract_archive_async, verify_checksum_async};
use djdesk_common::config::{HOST_PYTHON_CANDIDATES, PYTHON_VERSION};
use djdesk_common::error::{DjdeskError, Result};
use djdesk_common::{BundleSpec, Config};
use djdesk_net::fetch_to_cache;
use tracing::{debug, info, warn};

use crate::interpreter::{bundled_interpreter, ensure_version, locate_host_python};

/// Top-level directory inside the standalone archives.
const ARCHIVE_ROOT_DIR: &str = "python";

/// User-facing choice of interpreter source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpreterSource {
    #[default]
    Download,
    HostVenv,
}

impl FromStr for InterpreterSource {
    type Err = DjdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "download" => Ok(Self::Download),
            "host-venv" | "venv" => Ok(Self::HostVenv),
            other => Err(DjdeskError::Config(format!(
                "Unknown interpreter source '{other}' (expected 'download' or 'host-venv')"
            ))),
        }
    }
}

impl fmt::Display for InterpreterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Download => "download",
            Self::HostVenv => "host-venv",
        })
    }
}

/// A resolved acquisition plan. Everything that can fail without touching the
/// bundle directory (target lookup, host interpreter discovery) happens while
/// resolving.
#[derive(Debug, Clone)]
pub enum AcquisitionStrategy {
    /// Fetch a pinned standalone build, verify its digest and unpack it.
    PrebuiltDownload { spec: BundleSpec, cache_dir: PathBuf },
    /// Create a virtual environment from an interpreter already on the host.
    HostVenv { host_python: PathBuf },
}

impl AcquisitionStrategy {
    pub async fn resolve(
        source: InterpreterSource,
        spec: &BundleSpec,
        config: &Config,
    ) -> Result<Self> {
        match source {
            InterpreterSource::Download => Ok(Self::PrebuiltDownload {
                spec: spec.clone(),
                cache_dir: config.cache_dir().to_path_buf(),
            }),
            InterpreterSource::HostVenv => {
                let host_python =
                    locate_host_python(config.python_override.as_deref(), HOST_PYTHON_CANDIDATES)
                        .await?;
                Ok(Self::HostVenv { host_python })
            }
        }
    }

    /// Version text the produced interpreter must report. Host environments
    /// are only held to major.minor.
    pub fn expected_version(&self) -> String {
        match self {
            Self::PrebuiltDownload { .. } => PYTHON_VERSION.to_string(),
            Self::HostVenv { .. } => PYTHON_VERSION
                .splitn(3, '.')
                .take(2)
                .collect::<Vec<_>>()
                .join("."),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PrebuiltDownload { .. } => "standalone download",
            Self::HostVenv { .. } => "host virtual environment",
        }
    }

    /// Populates `interpreter_root` and returns the interpreter executable,
    /// already checked against [`Self::expected_version`].
    pub async fn produce(&self, interpreter_root: &Path) -> Result<PathBuf> {
        let python = match self {
            Self::PrebuiltDownload { spec, cache_dir } => {
                produce_from_archive(spec, cache_dir, interpreter_root).await?
            }
            Self::HostVenv { host_python } => {
                produce_venv(host_python, interpreter_root).await?
            }
        };
        ensure_version(&python, &self.expected_version()).await?;
        Ok(python)
    }
}

async fn produce_from_archive(
    spec: &BundleSpec,
    cache_dir: &Path,
    interpreter_root: &Path,
) -> Result<PathBuf> {
    let archive = fetch_to_cache(&spec.asset_name, &spec.download_url(), cache_dir).await?;

    if let Err(e) = verify_checksum_async(&archive, &spec.asset_name, &spec.sha256).await {
        if matches!(e, DjdeskError::ChecksumMismatch { .. }) {
            warn!("Removing corrupt cached archive {}", archive.display());
            if let Err(remove_err) = std::fs::remove_file(&archive) {
                warn!("Could not remove {}: {}", archive.display(), remove_err);
            }
        }
        return Err(e);
    }

    let scratch = tempfile::Builder::new()
        .prefix("djdesk-python-")
        .tempdir()?;
    info!("Extracting {}...", spec.asset_name);
    extract_archive_async(&archive, scratch.path()).await?;

    let extracted = scratch.path().join(ARCHIVE_ROOT_DIR);
    if !extracted.is_dir() {
        return Err(DjdeskError::Generic(format!(
            "Archive {} has no top-level '{}' directory",
            spec.asset_name, ARCHIVE_ROOT_DIR
        )));
    }

    remove_dir_if_exists(interpreter_root)?;
    move_dir(&extracted, interpreter_root)?;

    let python = spec.interpreter_in(interpreter_root);
    if !python.is_file() {
        return Err(DjdeskError::InterpreterNotFound(format!(
            "{} missing after extracting {}",
            python.display(),
            spec.asset_name
        )));
    }
    set_permissions(&python, 0o755)?;
    debug!("Standalone interpreter ready at {}", python.display());
    Ok(python)
}

async fn produce_venv(host_python: &Path, interpreter_root: &Path) -> Result<PathBuf> {
    info!(
        "Creating virtual environment at {} using {}",
        interpreter_root.display(),
        host_python.display()
    );
    remove_dir_if_exists(interpreter_root)?;
    let output = run_command_async(
        host_python,
        vec!["-m".into(), "venv".into(), interpreter_root.as_os_str().to_owned()],
        None,
        None,
    )
    .await?;
    ensure_success("venv", output)?;

    bundled_interpreter(interpreter_root).ok_or_else(|| {
        DjdeskError::InterpreterNotFound(format!(
            "virtual environment at {} has no interpreter",
            interpreter_root.display()
        ))
    })
}
