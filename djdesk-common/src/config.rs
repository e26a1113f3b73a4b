// djdesk-common/src/config.rs
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::error::{DjdeskError, Result};

pub const PYTHON_VERSION: &str = "3.14.0";
pub const PYTHON_BUILD_RELEASE: &str = "20251031";
pub const PYTHON_DOWNLOAD_BASE: &str =
    "https://github.com/indygreg/python-build-standalone/releases/download";

pub const DEFAULT_SETTINGS_MODULE: &str = "djdesk.settings.local";
pub const DEFAULT_DJANGO_ENV: &str = "local";
pub const APP_PACKAGE: &str = "djdesk";
pub const LAUNCHER_FILENAME: &str = "run_django.py";

/// Host interpreter names probed in order when `PYTHON` is not set.
pub const HOST_PYTHON_CANDIDATES: &[&str] = &["python3.14", "python3", "python"];

const DEFAULT_BUNDLE_SUBDIR: &str = "desktop/django-bundle";

#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub bundle_root: PathBuf,
    pub cache_root: PathBuf,
    pub state_root: PathBuf,
    pub python_override: Option<String>,
    pub settings_module: String,
    pub django_env: String,
    pub pythonpath: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading djdesk configuration");

        let project_root = match non_empty_var("DJDESK_PROJECT_ROOT") {
            Some(root) => PathBuf::from(root),
            None => env::current_dir().map_err(|e| {
                DjdeskError::Config(format!("Could not determine current directory: {e}"))
            })?,
        };
        debug!("Project root: {}", project_root.display());

        let bundle_root = non_empty_var("DJDESK_BUNDLE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| project_root.join(DEFAULT_BUNDLE_SUBDIR));

        let cache_root = match non_empty_var("DJDESK_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::cache_dir()
                .map(|d| d.join("djdesk").join("python-downloads"))
                .ok_or_else(|| {
                    DjdeskError::Config(
                        "No user cache directory available; set DJDESK_CACHE_DIR".to_string(),
                    )
                })?,
        };

        let state_root = match non_empty_var("DJDESK_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .map(|d| d.join("djdesk"))
                .ok_or_else(|| {
                    DjdeskError::Config(
                        "No user data directory available; set DJDESK_STATE_DIR".to_string(),
                    )
                })?,
        };

        let config = Self {
            project_root,
            bundle_root,
            cache_root,
            state_root,
            python_override: non_empty_var("PYTHON"),
            settings_module: non_empty_var("DJANGO_SETTINGS_MODULE")
                .unwrap_or_else(|| DEFAULT_SETTINGS_MODULE.to_string()),
            django_env: non_empty_var("DJANGO_ENV")
                .unwrap_or_else(|| DEFAULT_DJANGO_ENV.to_string()),
            pythonpath: non_empty_var("PYTHONPATH"),
        };
        config.check_bundle_root()?;
        debug!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    /// Builds a config rooted entirely under `root`; used by tests and tooling
    /// that must not touch the user's directories.
    pub fn rooted_at(root: &Path) -> Self {
        let project_root = root.join("project");
        Self {
            bundle_root: project_root.join(DEFAULT_BUNDLE_SUBDIR),
            project_root,
            cache_root: root.join("cache"),
            state_root: root.join("state"),
            python_override: None,
            settings_module: DEFAULT_SETTINGS_MODULE.to_string(),
            django_env: DEFAULT_DJANGO_ENV.to_string(),
            pythonpath: None,
        }
    }

    /// The bundle directory is wiped on every build, so it must not contain
    /// the project checkout.
    pub fn check_bundle_root(&self) -> Result<()> {
        let project = resolved(&self.project_root);
        let bundle = resolved(&self.bundle_root);
        if project.starts_with(&bundle) {
            return Err(DjdeskError::Config(format!(
                "Bundle directory {} contains the project root {}; set DJDESK_BUNDLE_DIR to a dedicated directory",
                self.bundle_root.display(),
                self.project_root.display()
            )));
        }
        Ok(())
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn bundle_root(&self) -> &Path {
        &self.bundle_root
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_root
    }

    pub fn project_src_dir(&self) -> PathBuf {
        self.project_root.join("src")
    }

    pub fn app_source_dir(&self) -> PathBuf {
        self.project_src_dir().join(APP_PACKAGE)
    }

    pub fn manage_py(&self) -> PathBuf {
        self.project_root.join("manage.py")
    }

    pub fn pyproject_path(&self) -> PathBuf {
        self.project_root.join("pyproject.toml")
    }

    pub fn interpreter_root(&self) -> PathBuf {
        self.bundle_root.join("python")
    }

    pub fn bundle_src_dir(&self) -> PathBuf {
        self.bundle_root.join("src")
    }

    pub fn static_root(&self) -> PathBuf {
        self.bundle_root.join("staticfiles")
    }

    pub fn launcher_path(&self) -> PathBuf {
        self.bundle_root.join(LAUNCHER_FILENAME)
    }

    pub fn version_file(&self) -> PathBuf {
        self.bundle_root.join("VERSION")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.state_root.join("djdesk.lock")
    }

    pub fn instance_file(&self) -> PathBuf {
        self.state_root.join("djdesk.instance")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_root.join("logs")
    }

    /// Joins `paths` with the inherited `PYTHONPATH` (appended last) using the
    /// platform separator.
    pub fn python_path_with(&self, paths: &[&Path]) -> String {
        let mut entries: Vec<PathBuf> = paths.iter().map(|p| p.to_path_buf()).collect();
        if let Some(existing) = &self.pythonpath {
            entries.extend(env::split_paths(existing));
        }
        env::join_paths(entries)
            .map(|joined| joined.to_string_lossy().into_owned())
            .unwrap_or_else(|_| {
                paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(if cfg!(windows) { ";" } else { ":" })
            })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Canonical form when the path exists, otherwise an absolute path with `.`
/// and `..` folded away.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
