// djdesk-core/src/supervisor/port.rs
use std::net::{Ipv4Addr, TcpListener};

use djdesk_common::error::{DjdeskError, Result};
use tracing::debug;

pub const DEFAULT_PORT: u16 = 8000;

/// Returns `preferred` when it can be bound on loopback, otherwise any free
/// port the OS hands out. The probe socket is closed before returning.
pub fn allocate_port(preferred: u16) -> Result<u16> {
    if let Ok(listener) = TcpListener::bind((Ipv4Addr::LOCALHOST, preferred)) {
        let port = listener.local_addr()?.port();
        debug!("Preferred port {} is free", port);
        return Ok(port);
    }
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(|e| {
        DjdeskError::IoError(format!("No free loopback port available: {e}"))
    })?;
    let port = listener.local_addr()?.port();
    debug!("Port {} busy; using {}", preferred, port);
    Ok(port)
}
