// djdesk/src/cli/launch.rs
use clap::Args;
use djdesk_common::error::Result;
use djdesk_common::Config;
use djdesk_core::bundle::VersionStamp;
use djdesk_core::instance::{self, InstanceRole};
use djdesk_core::supervisor::{BrowserWindow, HealthPolicy, Supervisor, TokioClock, DEFAULT_PORT};
use djdesk_net::HttpHealthProbe;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Port to try first; a free one is picked if it is taken
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl LaunchArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let mut guard = match instance::acquire(&config.lock_file(), &config.instance_file()).await? {
            InstanceRole::Secondary => return Ok(()),
            InstanceRole::Primary(guard) => guard,
        };
        // Only one receiver exists per guard.
        let focus_requests = guard
            .take_focus_requests()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);

        match VersionStamp::read_from(&config.version_file()) {
            Some(stamp) => info!(
                "Bundle revision {} built {}",
                stamp.revision,
                stamp.built_at.to_rfc3339()
            ),
            None => debug!("No bundle version stamp at {}", config.version_file().display()),
        }

        let policy = HealthPolicy::default();
        let probe = HttpHealthProbe::new(policy.per_attempt_timeout)?;
        let mut supervisor = Supervisor::new(
            config.clone(),
            probe,
            TokioClock,
            BrowserWindow::default(),
        )
        .with_policy(policy)
        .with_preferred_port(self.port);

        supervisor.start().await?;
        let result = supervisor.run(focus_requests, quit_signal()).await;
        drop(guard);
        result
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix. Stands in for the user closing
/// the app.
async fn quit_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                debug!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Quit requested");
}
