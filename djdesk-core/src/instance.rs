// djdesk-core/src/instance.rs
//! Single-instance guard.
//!
//! The first process takes an exclusive lock on `djdesk.lock` and listens on
//! a loopback control port recorded in `djdesk.instance`. Later processes
//! fail to take the lock, send `focus` to that port and exit.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Duration;

use djdesk_aio::fs::atomic_write_file;
use djdesk_common::error::{DjdeskError, Result};
use fs2::FileExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const FOCUS_COMMAND: &str = "focus";
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub enum InstanceRole {
    Primary(InstanceGuard),
    /// Another instance holds the lock and has been asked to focus.
    Secondary,
}

/// Held by the primary instance for as long as it runs.
#[derive(Debug)]
pub struct InstanceGuard {
    _lock: File,
    focus_rx: Option<mpsc::UnboundedReceiver<()>>,
    listener: JoinHandle<()>,
    port: u16,
}

impl InstanceGuard {
    /// Focus requests from later instances. Can be taken once.
    pub fn take_focus_requests(&mut self) -> Option<mpsc::UnboundedReceiver<()>> {
        self.focus_rx.take()
    }

    pub fn control_port(&self) -> u16 {
        self.port
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

pub async fn acquire(lock_path: &Path, instance_path: &Path) -> Result<InstanceRole> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| {
            DjdeskError::InstanceLock(format!("cannot open {}: {}", lock_path.display(), e))
        })?;

    match lock.try_lock_exclusive() {
        Ok(()) => {
            let guard = become_primary(lock, instance_path).await?;
            debug!("Primary instance; control port {}", guard.port);
            Ok(InstanceRole::Primary(guard))
        }
        Err(e) if is_contended(&e) => {
            info!("Another instance is already running. Exiting...");
            if let Err(notify_err) = notify_primary(instance_path).await {
                warn!("Could not ask the running instance to focus: {}", notify_err);
            }
            Ok(InstanceRole::Secondary)
        }
        Err(e) => Err(DjdeskError::InstanceLock(format!(
            "cannot lock {}: {}",
            lock_path.display(),
            e
        ))),
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

async fn become_primary(lock: File, instance_path: &Path) -> Result<InstanceGuard> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let port = listener.local_addr()?.port();
    atomic_write_file(instance_path, format!("{port}\n").as_bytes())?;

    let (focus_tx, focus_rx) = mpsc::unbounded_channel();
    let listener = tokio::spawn(accept_focus_requests(listener, focus_tx));
    Ok(InstanceGuard {
        _lock: lock,
        focus_rx: Some(focus_rx),
        listener,
        port,
    })
}

async fn accept_focus_requests(listener: TcpListener, focus_tx: mpsc::UnboundedSender<()>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Control socket accept failed: {}", e);
                continue;
            }
        };
        let mut line = String::new();
        let read = tokio::time::timeout(
            NOTIFY_TIMEOUT,
            BufReader::new(stream).read_line(&mut line),
        )
        .await;
        match read {
            Ok(Ok(_)) if line.trim() == FOCUS_COMMAND => {
                debug!("Focus requested by {}", peer);
                if focus_tx.send(()).is_err() {
                    break;
                }
            }
            Ok(Ok(_)) => debug!("Ignoring control message {:?} from {}", line.trim(), peer),
            Ok(Err(e)) => debug!("Control read from {} failed: {}", peer, e),
            Err(_) => debug!("Control client {} went quiet", peer),
        }
    }
}

async fn notify_primary(instance_path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(instance_path)?;
    let port: u16 = text.trim().parse().map_err(|_| {
        DjdeskError::InstanceLock(format!(
            "{} does not hold a port number",
            instance_path.display()
        ))
    })?;
    let mut stream = tokio::time::timeout(NOTIFY_TIMEOUT, TcpStream::connect(("127.0.0.1", port)))
        .await
        .map_err(|_| DjdeskError::InstanceLock(format!("control port {port} did not answer")))??;
    stream
        .write_all(format!("{FOCUS_COMMAND}\n").as_bytes())
        .await?;
    stream.shutdown().await?;
    Ok(())
}
