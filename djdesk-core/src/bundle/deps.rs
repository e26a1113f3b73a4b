// djdesk-core/src/bundle/deps.rs
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;

use djdesk_aio::process::{ensure_success, run_command_async};
use djdesk_common::error::{DjdeskError, Result};
use djdesk_common::Config;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    project: Option<ProjectTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectTable {
    #[serde(default)]
    dependencies: Vec<String>,
}

/// `[project].dependencies` from `pyproject.toml`. A table without the key
/// yields an empty list; a missing file is an error.
pub fn read_project_dependencies(pyproject: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(pyproject).map_err(|e| {
        DjdeskError::Config(format!(
            "Cannot read project metadata {}: {}",
            pyproject.display(),
            e
        ))
    })?;
    let parsed: PyProject = toml::from_str(&text)?;
    let deps: Vec<String> = parsed
        .project
        .unwrap_or_default()
        .dependencies
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();
    debug!("Declared dependencies: {:?}", deps);
    Ok(deps)
}

/// Installs the declared dependencies into the bundle interpreter. Returns
/// how many requirements were passed to pip.
pub async fn install_dependencies(python: &Path, config: &Config) -> Result<usize> {
    let deps = read_project_dependencies(&config.pyproject_path())?;
    if deps.is_empty() {
        info!("No dependencies declared in pyproject.toml; skipping pip install");
        return Ok(0);
    }

    info!("Installing {} dependencies via pip...", deps.len());
    let mut args: Vec<OsString> = ["-m", "pip", "install", "--no-cache-dir"]
        .iter()
        .map(OsString::from)
        .collect();
    args.extend(deps.iter().map(OsString::from));

    let mut envs = HashMap::new();
    envs.insert("PIP_REQUIRE_VIRTUALENV".to_string(), "0".to_string());

    let output = run_command_async(python, args, Some(config.project_root()), Some(envs)).await?;
    ensure_success("pip install", output)?;
    Ok(deps.len())
}
