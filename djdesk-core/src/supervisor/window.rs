// djdesk-core/src/supervisor/window.rs
use djdesk_common::error::{DjdeskError, Result};
use tracing::{debug, info};

/// The surface that shows the running application.
pub trait AppWindow {
    fn open(&mut self, url: &str) -> Result<()>;
    /// Brings an already opened window forward. A no-op before `open`.
    fn focus(&mut self) -> Result<()>;
}

/// Shows the application in the user's default browser. Focusing re-opens the
/// URL, which raises the existing tab in most browsers.
#[derive(Debug, Default)]
pub struct BrowserWindow {
    url: Option<String>,
}

impl BrowserWindow {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl AppWindow for BrowserWindow {
    fn open(&mut self, url: &str) -> Result<()> {
        info!("Opening {}", url);
        open::that(url)
            .map_err(|e| DjdeskError::Generic(format!("Failed to open {url} in a browser: {e}")))?;
        self.url = Some(url.to_string());
        Ok(())
    }

    fn focus(&mut self) -> Result<()> {
        match self.url.as_deref() {
            Some(url) => {
                debug!("Focusing {}", url);
                open::that(url).map_err(|e| {
                    DjdeskError::Generic(format!("Failed to focus {url} in a browser: {e}"))
                })
            }
            None => Ok(()),
        }
    }
}

/// Window that only records what it was asked to do.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingWindow {
    pub calls: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl AppWindow for RecordingWindow {
    fn open(&mut self, url: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("open {url}"));
        Ok(())
    }

    fn focus(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("focus".to_string());
        Ok(())
    }
}
