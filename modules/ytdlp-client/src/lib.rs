pub mod error;

pub use error::{Result, YtDlpError};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use curefact_common::MediaReference;

/// Fixed argv passed to yt-dlp ahead of the target URL. The URL is always a
/// positional argument after `--`, never interpolated into a shell string.
const YTDLP_ARGS: &[&str] = &["-j", "-f", "best[ext=mp4]/best", "--no-playlist", "--no-warnings", "--"];

const YTDLP_RELEASE_BASE: &str = "https://github.com/yt-dlp/yt-dlp/releases/latest/download";

/// Resolves a social-media post URL to a direct media URL plus any headers
/// the origin CDN requires.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, source_url: &str) -> anyhow::Result<MediaReference>;
}

/// Bundled-binary path, memoized process-wide. The first caller performs the
/// download-if-missing bootstrap; concurrent callers await the same in-flight
/// attempt instead of racing duplicate downloads.
static BUNDLED_BIN: OnceCell<Option<PathBuf>> = OnceCell::const_new();

pub struct YtDlpResolver {
    bin_dir: PathBuf,
}

impl YtDlpResolver {
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self { bin_dir: bin_dir.into() }
    }

    /// Resolve a post URL to its direct media URL. Every invocation is a
    /// fresh subprocess call; results are single-use and never cached.
    pub async fn resolve_media(&self, source_url: &str) -> Result<MediaReference> {
        let stdout = match self.bundled_binary().await {
            Some(bin) => match run_ytdlp(bin, source_url).await {
                Ok(stdout) => stdout,
                Err(e) => {
                    warn!(error = %e, "Bundled yt-dlp failed, falling back to system binary");
                    run_ytdlp(Path::new("yt-dlp"), source_url).await?
                }
            },
            None => run_ytdlp(Path::new("yt-dlp"), source_url).await?,
        };

        let (direct_url, http_headers) = parse_output(&stdout)?;
        info!(source_url, direct_url = %direct_url, "Resolved media URL");

        Ok(MediaReference {
            source_url: source_url.to_string(),
            direct_url,
            http_headers,
        })
    }

    async fn bundled_binary(&self) -> Option<&Path> {
        let bin_dir = self.bin_dir.clone();
        BUNDLED_BIN
            .get_or_init(|| async move {
                match bootstrap_binary(&bin_dir).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(error = %e, "yt-dlp bootstrap failed, relying on system binary");
                        None
                    }
                }
            })
            .await
            .as_deref()
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, source_url: &str) -> anyhow::Result<MediaReference> {
        Ok(self.resolve_media(source_url).await?)
    }
}

/// Ensure the bundled binary exists under `bin_dir`, downloading the platform
/// release asset if it is missing.
async fn bootstrap_binary(bin_dir: &Path) -> anyhow::Result<PathBuf> {
    let path = bin_dir.join(binary_name());
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(path);
    }

    tokio::fs::create_dir_all(bin_dir)
        .await
        .context("Failed to create yt-dlp bin directory")?;

    let url = format!("{}/{}", YTDLP_RELEASE_BASE, release_asset());
    info!(%url, "Downloading yt-dlp release");

    let resp = reqwest::get(&url)
        .await
        .context("yt-dlp download request failed")?;
    if !resp.status().is_success() {
        anyhow::bail!("yt-dlp download failed with status {}", resp.status());
    }
    let bytes = resp.bytes().await.context("yt-dlp download body read failed")?;

    tokio::fs::write(&path, &bytes)
        .await
        .context("Failed to write yt-dlp binary")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .await
            .context("Failed to mark yt-dlp executable")?;
    }

    info!(path = %path.display(), "yt-dlp binary installed");
    Ok(path)
}

fn binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

fn release_asset() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "yt-dlp_macos"
    } else {
        "yt-dlp"
    }
}

/// Run yt-dlp and return its stdout. Non-zero exit surfaces captured stderr.
async fn run_ytdlp(bin: &Path, url: &str) -> Result<String> {
    debug!(bin = %bin.display(), url, "yt-dlp attempt");

    let output = tokio::process::Command::new(bin)
        .args(YTDLP_ARGS)
        .arg(url)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| YtDlpError::Exec {
            bin: bin.display().to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            return Err(YtDlpError::Failed(format!(
                "{} exited with {}",
                bin.display(),
                output.status
            )));
        }
        return Err(YtDlpError::Failed(stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse yt-dlp's one-JSON-object-per-line stdout: take the first non-empty
/// line, require a string `url` field, pass through `http_headers`.
fn parse_output(stdout: &str) -> Result<(String, HashMap<String, String>)> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| YtDlpError::Parse("No output from yt-dlp".to_string()))?;

    let info: serde_json::Value =
        serde_json::from_str(line).map_err(|e| YtDlpError::Parse(e.to_string()))?;

    let url = info
        .get("url")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| YtDlpError::Parse("No URL found in yt-dlp output".to_string()))?
        .to_string();

    let headers = info
        .get("http_headers")
        .and_then(serde_json::Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Ok((url, headers))
}
