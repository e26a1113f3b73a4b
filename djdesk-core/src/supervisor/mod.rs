// djdesk-core/src/supervisor/mod.rs
//! Runs the Django server for the lifetime of the desktop session.
//!
//! ```text
//! Idle -> ResolvingInterpreter -> AllocatingPort -> Spawning -> WaitingForHealth -> Ready
//!                 any failure before Ready -> Aborted
//!                 Ready -> ShuttingDown -> Terminated
//! ```

pub mod health;
pub mod plan;
pub mod port;
pub mod process;
pub mod window;

use std::fmt;
use std::future::Future;

use djdesk_common::error::{DjdeskError, Result};
use djdesk_common::Config;
use djdesk_net::HealthProbe;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub use health::{wait_for_health, Clock, HealthPolicy, HealthReport, TokioClock};
pub use plan::{resolve_interpreter, LaunchPlan, ResolvedInterpreter, RunMode};
pub use port::{allocate_port, DEFAULT_PORT};
pub use process::{log_output, OutputStream, ServerEvent, ServerProcess};
pub use window::{AppWindow, BrowserWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    ResolvingInterpreter,
    AllocatingPort,
    Spawning,
    WaitingForHealth,
    Ready,
    ShuttingDown,
    Terminated,
    Aborted,
}

impl SupervisorState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Terminated | Self::Aborted)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a ready session ended.
enum SessionEnd {
    Quit,
    ServerGone(Option<i32>),
}

pub struct Supervisor<P, C, W> {
    config: Config,
    policy: HealthPolicy,
    preferred_port: u16,
    probe: P,
    clock: C,
    window: W,
    state: SupervisorState,
    server: Option<ServerProcess>,
    events: Option<mpsc::UnboundedReceiver<ServerEvent>>,
    plan: Option<LaunchPlan>,
}

impl<P, C, W> Supervisor<P, C, W>
where
    P: HealthProbe,
    C: Clock,
    W: AppWindow,
{
    pub fn new(config: Config, probe: P, clock: C, window: W) -> Self {
        Self {
            config,
            policy: HealthPolicy::default(),
            preferred_port: DEFAULT_PORT,
            probe,
            clock,
            window,
            state: SupervisorState::Idle,
            server: None,
            events: None,
            plan: None,
        }
    }

    pub fn with_policy(mut self, policy: HealthPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_preferred_port(mut self, port: u16) -> Self {
        self.preferred_port = port;
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn plan(&self) -> Option<&LaunchPlan> {
        self.plan.as_ref()
    }

    pub fn server_pid(&self) -> Option<u32> {
        self.server.as_ref().and_then(ServerProcess::pid)
    }

    fn transition(&mut self, next: SupervisorState) {
        debug!("Supervisor {} -> {}", self.state, next);
        self.state = next;
    }

    /// Brings the server up and opens the window. On failure the server, if
    /// any, is terminated and the supervisor ends in `Aborted`.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SupervisorState::Idle {
            return Err(DjdeskError::Generic(format!(
                "Supervisor cannot start from state {}",
                self.state
            )));
        }
        match self.bring_up().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Error starting Django: {}", e);
                self.abort();
                Err(e)
            }
        }
    }

    async fn bring_up(&mut self) -> Result<()> {
        self.transition(SupervisorState::ResolvingInterpreter);
        let interpreter = resolve_interpreter(&self.config).await?;
        info!(
            "Using {} Python: {}",
            interpreter.mode,
            interpreter.path.display()
        );

        self.transition(SupervisorState::AllocatingPort);
        let port = allocate_port(self.preferred_port)?;
        info!("Starting Django on port {}...", port);

        self.transition(SupervisorState::Spawning);
        let plan = LaunchPlan::new(&self.config, &interpreter, port);
        let (server, mut events) = ServerProcess::spawn(&plan)?;
        self.server = Some(server);
        let url = plan.base_url();
        self.plan = Some(plan);

        self.transition(SupervisorState::WaitingForHealth);
        let outcome = {
            let health = wait_for_health(&self.probe, &self.clock, &url, &self.policy);
            tokio::pin!(health);
            loop {
                tokio::select! {
                    result = &mut health => break result,
                    Some(event) = events.recv() => {
                        if let Some(code) = relay(&event) {
                            break Err(DjdeskError::PrematureExit(code));
                        }
                    }
                }
            }
        };
        self.events = Some(events);
        outcome?;

        self.window.open(&url)?;
        self.transition(SupervisorState::Ready);
        Ok(())
    }

    /// Serves a ready session until `quit` resolves or the server dies.
    /// Each message on `focus_requests` raises the window.
    pub async fn run<Q>(
        &mut self,
        mut focus_requests: mpsc::UnboundedReceiver<()>,
        quit: Q,
    ) -> Result<()>
    where
        Q: Future<Output = ()>,
    {
        if self.state != SupervisorState::Ready {
            return Err(DjdeskError::Generic(format!(
                "Supervisor cannot run from state {}",
                self.state
            )));
        }
        let mut events = self.events.take().ok_or_else(|| {
            DjdeskError::Generic("Server event stream missing".to_string())
        })?;
        tokio::pin!(quit);
        let mut focus_open = true;

        let end = loop {
            tokio::select! {
                _ = &mut quit => break SessionEnd::Quit,
                request = focus_requests.recv(), if focus_open => match request {
                    Some(()) => {
                        if let Err(e) = self.window.focus() {
                            warn!("Could not focus window: {}", e);
                        }
                    }
                    None => focus_open = false,
                },
                event = events.recv() => match event {
                    Some(ServerEvent::Exited { code }) => {
                        info!("Django process exited with code {:?}", code);
                        break SessionEnd::ServerGone(code);
                    }
                    Some(event) => {
                        relay(&event);
                    }
                    None => break SessionEnd::ServerGone(None),
                },
            }
        };

        match end {
            SessionEnd::Quit => {
                self.shutdown();
                Ok(())
            }
            SessionEnd::ServerGone(Some(code)) if code != 0 => {
                error!("Django exited unexpectedly; quitting");
                self.server = None;
                self.transition(SupervisorState::Terminated);
                Err(DjdeskError::ServerExited(code))
            }
            SessionEnd::ServerGone(_) => {
                warn!("Django server stopped; ending session");
                self.server = None;
                self.transition(SupervisorState::Terminated);
                Ok(())
            }
        }
    }

    /// Sends the server a termination request without waiting for it to exit.
    pub fn shutdown(&mut self) {
        if self.state.is_final() {
            return;
        }
        self.transition(SupervisorState::ShuttingDown);
        if let Some(server) = self.server.as_mut() {
            info!("Shutting down Django server...");
            server.terminate();
        }
        self.transition(SupervisorState::Terminated);
    }

    fn abort(&mut self) {
        if let Some(server) = self.server.as_mut() {
            info!("Terminating Django process...");
            server.terminate();
        }
        self.transition(SupervisorState::Aborted);
    }
}

/// Logs one server event; returns the exit code when it reports a failure.
fn relay(event: &ServerEvent) -> Option<i32> {
    match event {
        ServerEvent::Output { stream, line } => {
            log_output(*stream, line);
            None
        }
        ServerEvent::Exited { code } => {
            info!("Django process exited with code {:?}", code);
            event.failure_code()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::health::testing::{ManualClock, ScriptedProbe};
    use super::window::RecordingWindow;
    use super::*;
    use crate::test_support::{process_running, wait_for_exit, write_script};
    use std::time::Duration;

    /// A config whose "system python" is a shell script; the script receives
    /// the manage.py command line and does whatever `body` says.
    fn config_with_server(dir: &std::path::Path, body: &str) -> Config {
        let mut config = Config::rooted_at(dir);
        let fake = dir.join("server-python");
        write_script(&fake, body);
        config.python_override = Some(fake.to_string_lossy().into_owned());
        std::fs::create_dir_all(config.project_root()).unwrap();
        config
    }

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn multi_thread_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn wait_until_dead(pid: u32) -> bool {
        for _ in 0..100 {
            if !process_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn becomes_ready_then_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_server(dir.path(), "exec sleep 30");
        let window = RecordingWindow::default();
        let calls = window.calls.clone();
        let mut supervisor = Supervisor::new(config, ScriptedProbe::ready_on(3), ManualClock::default(), window)
            .with_preferred_port(free_port());

        supervisor.start().await.unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Ready);
        let plan = supervisor.plan().unwrap().clone();
        assert_eq!(plan.mode, RunMode::System);
        assert_eq!(*calls.lock().unwrap(), vec![format!("open {}", plan.base_url())]);

        let pid = supervisor.server_pid().unwrap();
        let (focus_tx, focus_rx) = mpsc::unbounded_channel();
        focus_tx.send(()).unwrap();
        let quit = tokio::time::sleep(Duration::from_millis(200));
        supervisor.run(focus_rx, quit).await.unwrap();

        assert_eq!(supervisor.state(), SupervisorState::Terminated);
        assert_eq!(calls.lock().unwrap().last().unwrap(), "focus");
        assert!(wait_until_dead(pid).await, "server should have been terminated");
    }

    #[tokio::test]
    async fn health_timeout_aborts_and_kills_server() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_server(dir.path(), "exec sleep 30");
        let window = RecordingWindow::default();
        let calls = window.calls.clone();
        let policy = HealthPolicy {
            max_attempts: 3,
            ..HealthPolicy::default()
        };
        let mut supervisor = Supervisor::new(config, ScriptedProbe::never(), ManualClock::default(), window)
            .with_policy(policy)
            .with_preferred_port(free_port());

        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, DjdeskError::HealthCheckTimeout { attempts: 3, .. }), "{err:?}");
        assert_eq!(supervisor.state(), SupervisorState::Aborted);
        assert!(calls.lock().unwrap().is_empty(), "no window for a failed start");
        let pid = supervisor.server_pid().unwrap();
        assert!(wait_until_dead(pid).await);
    }

    #[test]
    fn abort_stops_server_even_when_runtime_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_server(dir.path(), "exec sleep 30");
        let runtime = multi_thread_runtime();
        let pid = runtime.block_on(async {
            let policy = HealthPolicy {
                max_attempts: 2,
                ..HealthPolicy::default()
            };
            let mut supervisor = Supervisor::new(
                config,
                ScriptedProbe::never(),
                ManualClock::default(),
                RecordingWindow::default(),
            )
            .with_policy(policy)
            .with_preferred_port(free_port());
            supervisor.start().await.unwrap_err();
            supervisor.server_pid().unwrap()
        });
        drop(runtime);

        assert!(wait_for_exit(pid), "server pid {pid} survived an aborted start");
    }

    #[test]
    fn quit_stops_server_even_when_runtime_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_server(dir.path(), "exec sleep 30");
        let runtime = multi_thread_runtime();
        let pid = runtime.block_on(async {
            let mut supervisor = Supervisor::new(
                config,
                ScriptedProbe::ready_on(1),
                ManualClock::default(),
                RecordingWindow::default(),
            )
            .with_preferred_port(free_port());
            supervisor.start().await.unwrap();
            let pid = supervisor.server_pid().unwrap();
            let (_focus_tx, focus_rx) = mpsc::unbounded_channel();
            supervisor.run(focus_rx, async {}).await.unwrap();
            assert_eq!(supervisor.state(), SupervisorState::Terminated);
            pid
        });
        drop(runtime);

        assert!(wait_for_exit(pid), "server pid {pid} survived quit");
    }

    #[tokio::test]
    async fn early_nonzero_exit_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_server(dir.path(), "echo 'ImportError: settings' >&2; exit 4");
        let policy = HealthPolicy {
            settle: Duration::from_millis(20),
            interval: Duration::from_millis(20),
            max_attempts: 500,
            per_attempt_timeout: Duration::from_millis(20),
        };
        let mut supervisor =
            Supervisor::new(config, ScriptedProbe::never(), TokioClock, RecordingWindow::default())
                .with_policy(policy)
                .with_preferred_port(free_port());

        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, DjdeskError::PrematureExit(4)), "{err:?}");
        assert_eq!(supervisor.state(), SupervisorState::Aborted);
    }

    #[tokio::test]
    async fn missing_interpreter_aborts_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::rooted_at(dir.path());
        config.python_override = Some(dir.path().join("absent-python").to_string_lossy().into_owned());
        let mut supervisor = Supervisor::new(
            config,
            ScriptedProbe::ready_on(1),
            ManualClock::default(),
            RecordingWindow::default(),
        );

        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, DjdeskError::SpawnFailed(_)), "{err:?}");
        assert_eq!(supervisor.state(), SupervisorState::Aborted);
        assert!(supervisor.server_pid().is_none());
    }

    #[tokio::test]
    async fn crash_after_ready_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_server(dir.path(), "sleep 0.3; exit 9");
        let mut supervisor = Supervisor::new(
            config,
            ScriptedProbe::ready_on(1),
            ManualClock::default(),
            RecordingWindow::default(),
        )
        .with_preferred_port(free_port());

        supervisor.start().await.unwrap();
        let (_focus_tx, focus_rx) = mpsc::unbounded_channel();
        let err = supervisor
            .run(focus_rx, std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, DjdeskError::ServerExited(9)));
        assert_eq!(supervisor.state(), SupervisorState::Terminated);
    }
}
