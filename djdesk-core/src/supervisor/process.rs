// djdesk-core/src/supervisor/process.rs
//! The running server subprocess. Output lines and the final exit are
//! delivered as [`ServerEvent`]s on a channel so the supervisor can react to
//! them while it polls for readiness.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use djdesk_common::error::{DjdeskError, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::plan::LaunchPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Output { stream: OutputStream, line: String },
    /// `code` is `None` when the process was ended by a signal.
    Exited { code: Option<i32> },
}

impl ServerEvent {
    /// Exit codes that mean the server failed rather than being stopped.
    pub fn failure_code(&self) -> Option<i32> {
        match self {
            Self::Exited { code: Some(code) } if *code != 0 => Some(*code),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ServerProcess {
    pid: Option<u32>,
    #[cfg_attr(not(unix), allow(dead_code))]
    reaped: Arc<AtomicBool>,
    terminate_tx: Option<oneshot::Sender<()>>,
}

impl ServerProcess {
    pub fn spawn(plan: &LaunchPlan) -> Result<(Self, mpsc::UnboundedReceiver<ServerEvent>)> {
        debug!(
            "Spawning {} {:?} in {}",
            plan.program.display(),
            plan.args,
            plan.cwd.display()
        );
        let mut command = Command::new(&plan.program);
        command
            .args(&plan.args)
            .current_dir(&plan.cwd)
            .envs(&plan.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Without signals the watcher stops the child; a dropped runtime must
        // not leave it running.
        #[cfg(not(unix))]
        command.kill_on_drop(true);
        let mut child = command.spawn().map_err(|e| {
            DjdeskError::SpawnFailed(format!("{}: {}", plan.program.display(), e))
        })?;

        let pid = child.id();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(relay_lines(stdout, OutputStream::Stdout, events_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(relay_lines(stderr, OutputStream::Stderr, events_tx.clone()));
        }

        let reaped = Arc::new(AtomicBool::new(false));
        let (terminate_tx, terminate_rx) = oneshot::channel();
        tokio::spawn(watch_exit(child, terminate_rx, reaped.clone(), events_tx));

        info!("Server process started (pid {:?})", pid);
        Ok((
            Self {
                pid,
                reaped,
                terminate_tx: Some(terminate_tx),
            },
            events_rx,
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Signals the server to stop before returning, without waiting for it
    /// to exit. Repeated calls are harmless.
    pub fn terminate(&mut self) {
        let Some(tx) = self.terminate_tx.take() else {
            return;
        };
        debug!("Terminating pid {:?}", self.pid);
        #[cfg(unix)]
        {
            drop(tx);
            self.send_sigterm();
        }
        #[cfg(not(unix))]
        {
            // The watcher is gone once the process has exited on its own.
            let _ = tx.send(());
        }
    }

    #[cfg(unix)]
    fn send_sigterm(&self) {
        if self.reaped.load(Ordering::SeqCst) {
            debug!("Server process already reaped");
            return;
        }
        let Some(pid) = self.pid else {
            return;
        };
        // SAFETY: plain kill(2) on a pid we spawned and have not yet reaped.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            warn!(
                "SIGTERM to pid {} failed: {}",
                pid,
                std::io::Error::last_os_error()
            );
        }
    }
}

async fn relay_lines<R>(reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<ServerEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(ServerEvent::Output { stream, line }).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped reading server {:?}: {}", stream, e);
                break;
            }
        }
    }
}

/// Reaps the child and reports its exit. On Unix the stop signal is sent by
/// [`ServerProcess::terminate`] itself, so `terminate_rx` only fires elsewhere.
async fn watch_exit(
    mut child: Child,
    terminate_rx: oneshot::Receiver<()>,
    reaped: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<ServerEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = terminate_rx => {
            if let Err(e) = child.start_kill() {
                warn!("Failed to stop server process: {}", e);
            }
            child.wait().await
        }
    };
    reaped.store(true, Ordering::SeqCst);
    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            error!("Failed to wait for server process: {}", e);
            None
        }
    };
    let _ = tx.send(ServerEvent::Exited { code });
}

/// Forwards a server line to the log: stdout as info, stderr as error.
pub fn log_output(stream: OutputStream, line: &str) {
    match stream {
        OutputStream::Stdout => info!(target: "djdesk::server", "Django: {}", line),
        OutputStream::Stderr => error!(target: "djdesk::server", "Django: {}", line),
    }
}
