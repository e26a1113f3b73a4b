// djdesk-core/src/supervisor/plan.rs
//! Deciding which interpreter runs the server, and with what command line.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use djdesk_common::config::HOST_PYTHON_CANDIDATES;
use djdesk_common::error::Result;
use djdesk_common::Config;
use tracing::debug;

use crate::interpreter::{bundled_interpreter, is_virtual_env, locate_host_python};

pub const LOOPBACK_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// The bundle's own interpreter runs the bundle launcher.
    Bundled,
    /// A host interpreter runs `manage.py` from the project checkout.
    System,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bundled => "bundled",
            Self::System => "system",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInterpreter {
    pub path: PathBuf,
    pub mode: RunMode,
}

/// Bundled mode needs both the bundle interpreter and the launcher; otherwise
/// a host interpreter is located the same way the bundler does it.
pub async fn resolve_interpreter(config: &Config) -> Result<ResolvedInterpreter> {
    if config.launcher_path().is_file() {
        if let Some(path) = bundled_interpreter(&config.interpreter_root()) {
            return Ok(ResolvedInterpreter {
                path,
                mode: RunMode::Bundled,
            });
        }
    }
    debug!("No complete bundle at {}", config.bundle_root().display());
    let path = locate_host_python(config.python_override.as_deref(), HOST_PYTHON_CANDIDATES).await?;
    Ok(ResolvedInterpreter {
        path,
        mode: RunMode::System,
    })
}

/// Everything needed to spawn the server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    /// Overlaid on the inherited environment.
    pub env: HashMap<String, String>,
    pub mode: RunMode,
    pub port: u16,
}

impl LaunchPlan {
    pub fn new(config: &Config, interpreter: &ResolvedInterpreter, port: u16) -> Self {
        let mut env = HashMap::new();
        env.insert("DJANGO_ENV".to_string(), config.django_env.clone());
        env.insert(
            "DJANGO_SETTINGS_MODULE".to_string(),
            config.settings_module.clone(),
        );

        let (args, cwd): (Vec<OsString>, PathBuf) = match interpreter.mode {
            RunMode::Bundled => {
                let interpreter_root = config.interpreter_root();
                if !is_virtual_env(&interpreter_root) {
                    env.insert(
                        "PYTHONHOME".to_string(),
                        interpreter_root.to_string_lossy().into_owned(),
                    );
                }
                (
                    vec![
                        config.launcher_path().into_os_string(),
                        "--host".into(),
                        LOOPBACK_HOST.into(),
                        "--port".into(),
                        port.to_string().into(),
                    ],
                    config.bundle_root().to_path_buf(),
                )
            }
            RunMode::System => (
                vec![
                    config.manage_py().into_os_string(),
                    "runserver".into(),
                    format!("{LOOPBACK_HOST}:{port}").into(),
                    "--noreload".into(),
                ],
                config.project_root().to_path_buf(),
            ),
        };

        Self {
            program: interpreter.path.clone(),
            args,
            cwd,
            env,
            mode: interpreter.mode,
            port,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{LOOPBACK_HOST}:{}/", self.port)
    }
}
