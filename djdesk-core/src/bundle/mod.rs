// djdesk-core/src/bundle/mod.rs
//! Builds the self-contained `django-bundle` directory: interpreter,
//! dependencies, application sources, static files, launcher and version
//! stamp.

pub mod acquire;
pub mod deps;
pub mod launcher;
pub mod sources;
pub mod stamp;
pub mod verify;

use std::path::PathBuf;

use djdesk_aio::fs::{recreate_dir, remove_dir_if_exists};
use djdesk_common::error::{DjdeskError, Result};
use djdesk_common::model::{Arch, Platform};
use djdesk_common::{BundleSpec, Config};
use tracing::{debug, error, info, warn};

pub use acquire::{AcquisitionStrategy, InterpreterSource};
pub use stamp::VersionStamp;

/// What a successful build leaves behind.
#[derive(Debug, Clone)]
pub struct BundleArtifact {
    pub root: PathBuf,
    pub python: PathBuf,
    pub django_version: String,
    pub dependency_count: usize,
    pub stamp: VersionStamp,
}

#[derive(Debug)]
pub struct Bundler {
    config: Config,
    spec: BundleSpec,
    strategy: AcquisitionStrategy,
}

impl Bundler {
    /// Resolves the target and acquisition strategy without touching disk.
    /// Unsupported targets, cross-platform requests and a missing host
    /// interpreter all fail here.
    pub async fn plan(
        config: Config,
        platform: &str,
        arch: &str,
        source: InterpreterSource,
    ) -> Result<Self> {
        config.check_bundle_root()?;
        let spec = BundleSpec::resolve(platform, arch)?;
        let host = (Platform::host(), Arch::host());
        if host != (Some(spec.platform), Some(spec.arch)) {
            // Later stages execute the bundled interpreter.
            return Err(DjdeskError::Config(format!(
                "Cannot build a {}/{} bundle on a {}/{} host",
                spec.platform,
                spec.arch,
                std::env::consts::OS,
                std::env::consts::ARCH
            )));
        }
        let strategy = AcquisitionStrategy::resolve(source, &spec, &config).await?;
        debug!(
            "Planned bundle for {}/{} via {}",
            spec.platform,
            spec.arch,
            strategy.label()
        );
        Ok(Self {
            config,
            spec,
            strategy,
        })
    }

    /// Builds with an already-resolved strategy for the host target.
    pub fn with_strategy(config: Config, spec: BundleSpec, strategy: AcquisitionStrategy) -> Self {
        Self {
            config,
            spec,
            strategy,
        }
    }

    /// Runs every stage in order. Any failure removes the bundle directory so
    /// a half-built bundle is never left for the supervisor to find.
    pub async fn build(&self) -> Result<BundleArtifact> {
        match self.run_stages().await {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                error!("Bundle build failed: {}", e);
                if let Err(cleanup) = remove_dir_if_exists(self.config.bundle_root()) {
                    warn!(
                        "Could not remove partial bundle {}: {}",
                        self.config.bundle_root().display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_stages(&self) -> Result<BundleArtifact> {
        let config = &self.config;
        let root = config.bundle_root().to_path_buf();

        info!("Preparing bundle directory {}", root.display());
        recreate_dir(&root)?;

        info!(
            "Acquiring Python {} for {}/{} ({})",
            self.strategy.expected_version(),
            self.spec.platform,
            self.spec.arch,
            self.strategy.label()
        );
        let python = self.strategy.produce(&config.interpreter_root()).await?;

        let dependency_count = deps::install_dependencies(&python, config).await?;
        sources::copy_project_sources(config)?;
        sources::collect_static(&python, config).await?;

        info!("Writing bundle launcher script...");
        launcher::write_launcher(&config.launcher_path())?;

        let stamp = VersionStamp::capture(config.project_root());
        stamp.write_to(&config.version_file())?;

        let django_version = verify::verify_bundle(&python, config).await?;

        Ok(BundleArtifact {
            root,
            python,
            django_version,
            dependency_count,
            stamp,
        })
    }
}
