// djdesk-core/src/bundle/sources.rs
//! Copying the Django project into the bundle and collecting its static files.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;

use djdesk_aio::fs::copy_tree;
use djdesk_aio::process::{ensure_success, run_command_async};
use djdesk_common::config::APP_PACKAGE;
use djdesk_common::error::{DjdeskError, Result};
use djdesk_common::Config;
use tracing::{debug, info};

const BYTECODE_CACHE_DIR: &str = "__pycache__";

fn is_bytecode_cache(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == BYTECODE_CACHE_DIR)
}

/// Copies `src/djdesk` to `<bundle>/src/djdesk` and `manage.py` to the bundle
/// root. Bytecode caches are left behind.
pub fn copy_project_sources(config: &Config) -> Result<u64> {
    let source = config.app_source_dir();
    if !source.is_dir() {
        return Err(DjdeskError::Config(format!(
            "Application package not found at {}",
            source.display()
        )));
    }
    let manage_py = config.manage_py();
    if !manage_py.is_file() {
        return Err(DjdeskError::Config(format!(
            "manage.py not found at {}",
            manage_py.display()
        )));
    }

    info!("Copying Django sources into {}", config.bundle_src_dir().display());
    let target = config.bundle_src_dir().join(APP_PACKAGE);
    let copied = copy_tree(&source, &target, is_bytecode_cache)?;
    std::fs::copy(&manage_py, config.bundle_root().join("manage.py"))?;
    debug!("Copied {} files plus manage.py", copied);
    Ok(copied)
}

/// Runs `collectstatic` from the project checkout with its output redirected
/// into the bundle's static root.
pub async fn collect_static(python: &Path, config: &Config) -> Result<()> {
    let static_root = config.static_root();
    info!("Collecting static files into {}", static_root.display());

    let mut envs = HashMap::new();
    envs.insert(
        "DJANGO_STATIC_ROOT".to_string(),
        static_root.to_string_lossy().into_owned(),
    );
    envs.insert("DJANGO_ENV".to_string(), config.django_env.clone());
    envs.insert(
        "DJANGO_SETTINGS_MODULE".to_string(),
        config.settings_module.clone(),
    );
    envs.insert(
        "PYTHONPATH".to_string(),
        config.python_path_with(&[&config.project_src_dir()]),
    );

    let args: Vec<OsString> = vec![
        config.manage_py().into_os_string(),
        "collectstatic".into(),
        "--no-input".into(),
        "--clear".into(),
    ];
    let output = run_command_async(python, args, Some(config.project_root()), Some(envs)).await?;
    ensure_success("collectstatic", output)?;
    Ok(())
}
