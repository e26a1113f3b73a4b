// djdesk-net/src/http.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use djdesk_common::error::{DjdeskError, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::validation::validate_url;

const DOWNLOAD_TIMEOUT_SECS: u64 = 600;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;
pub(crate) const USER_AGENT_STRING: &str = concat!("djdesk/", env!("CARGO_PKG_VERSION"));

/// Returns `cache_dir/<asset_name>`, downloading it from `url` first unless a
/// cached copy already exists. Integrity is the caller's concern.
pub async fn fetch_to_cache(asset_name: &str, url: &str, cache_dir: &Path) -> Result<PathBuf> {
    let cache_path = cache_dir.join(asset_name);
    debug!("Target cache path: {}", cache_path.display());

    if cache_path.is_file() {
        info!("Reusing cached archive {}", cache_path.display());
        return Ok(cache_path);
    }

    fs::create_dir_all(cache_dir).map_err(|e| {
        DjdeskError::IoError(format!(
            "Failed to create cache directory {}: {}",
            cache_dir.display(),
            e
        ))
    })?;
    validate_url(url)?;

    info!("Downloading {}...", asset_name);
    let client = build_http_client()?;
    download_to_path(&client, asset_name, url, &cache_path)
        .await
        .inspect_err(|e| error!("Download failed from {}: {}", url, e))?;
    Ok(cache_path)
}

fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| DjdeskError::HttpError(format!("Failed to build HTTP client: {e}")))
}

/// Streams the response body into a hidden temp file next to `final_path`
/// and renames it into place only once the body is complete.
async fn download_to_path(
    client: &Client,
    asset_name: &str,
    url: &str,
    final_path: &Path,
) -> Result<()> {
    let temp_path = final_path.with_file_name(format!(".{asset_name}.download"));
    debug!("Downloading to temporary path: {}", temp_path.display());
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path) {
            tracing::warn!(
                "Could not remove existing temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }

    let response = client.get(url).send().await.map_err(|e| {
        DjdeskError::DownloadError(
            asset_name.to_string(),
            url.to_string(),
            format!("HTTP request failed: {e}"),
        )
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, response.url());

    if !status.is_success() {
        let reason = match status {
            StatusCode::NOT_FOUND => "Resource not found (404)".to_string(),
            StatusCode::FORBIDDEN => "Access forbidden (403)".to_string(),
            other => format!("HTTP status {other}"),
        };
        return Err(DjdeskError::DownloadError(
            asset_name.to_string(),
            url.to_string(),
            reason,
        ));
    }

    let progress = download_progress(response.content_length(), asset_name);
    let mut temp_file = TokioFile::create(&temp_path).await.map_err(|e| {
        DjdeskError::IoError(format!(
            "Failed to create temp file {}: {}",
            temp_path.display(),
            e
        ))
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            DjdeskError::DownloadError(
                asset_name.to_string(),
                url.to_string(),
                format!("Failed to read response body: {e}"),
            )
        })?;
        temp_file.write_all(&chunk).await.map_err(|e| {
            DjdeskError::IoError(format!(
                "Failed to write download stream to {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        progress.inc(chunk.len() as u64);
    }
    temp_file.flush().await?;
    temp_file.sync_all().await?;
    drop(temp_file);
    progress.finish_and_clear();

    fs::rename(&temp_path, final_path).map_err(|e| {
        DjdeskError::IoError(format!(
            "Failed to move temp file {} to {}: {}",
            temp_path.display(),
            final_path.display(),
            e
        ))
    })?;
    debug!("Moved download to final location: {}", final_path.display());
    Ok(())
}

fn download_progress(total: Option<u64>, asset_name: &str) -> ProgressBar {
    match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::with_template(
                "{msg} [{bar:30}] {bytes}/{total_bytes} ({eta})",
            ) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar.set_message(asset_name.to_string());
            bar
        }
        None => ProgressBar::new_spinner().with_message(asset_name.to_string()),
    }
}
