// djdesk/src/cli/bundle.rs
use clap::Args;
use colored::Colorize;
use djdesk_common::error::Result;
use djdesk_common::model::{Arch, Platform};
use djdesk_common::Config;
use djdesk_core::{Bundler, InterpreterSource};
use tracing::debug;

#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Target platform (darwin, linux, win32); defaults to the host
    #[arg(long)]
    pub platform: Option<String>,

    /// Target architecture (x64, arm64); defaults to the host
    #[arg(long)]
    pub arch: Option<String>,

    /// Where the bundled interpreter comes from
    #[arg(long, default_value = "download", value_name = "download|host-venv")]
    pub interpreter: InterpreterSource,
}

impl BundleArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let platform = self
            .platform
            .clone()
            .or_else(|| Platform::host().map(|p| p.as_str().to_string()))
            .unwrap_or_else(|| std::env::consts::OS.to_string());
        let arch = self
            .arch
            .clone()
            .or_else(|| Arch::host().map(|a| a.as_str().to_string()))
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());
        debug!("Bundling for {}/{} via {}", platform, arch, self.interpreter);

        let bundler = Bundler::plan(config.clone(), &platform, &arch, self.interpreter).await?;
        let artifact = bundler.build().await?;

        println!(
            "{} Django {} at {} (revision {})",
            "Bundled".green().bold(),
            artifact.django_version,
            artifact.root.display(),
            artifact.stamp.revision
        );
        println!("django-bundle ready.");
        Ok(())
    }
}
