use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{with_timeout, Error, Result};
use crate::types::VideoId;

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// A uniquely named temp directory, removed with everything in it on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `<tmp>/lingochunk-<prefix>-<pid>-<nanos>-<seq>`.
    pub fn create(prefix: &str) -> Result<Self> {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "lingochunk-{prefix}-{}-{nanos}-{seq}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to clean up temp dir");
            }
        }
    }
}

/// Audio track of a video on local disk. Deleted when dropped.
#[derive(Debug)]
pub struct DownloadedAudio {
    path: PathBuf,
    _scratch: ScratchDir,
}

impl DownloadedAudio {
    /// `path` must live inside `scratch`.
    pub fn new(scratch: ScratchDir, path: PathBuf) -> Self {
        Self {
            path,
            _scratch: scratch,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fetches the full audio track of a video.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn download(&self, video_id: &VideoId) -> Result<DownloadedAudio>;
}

/// Audio download through yt-dlp.
///
/// # Security
/// - Video ids are validated to `[A-Za-z0-9_-]` before reaching here
/// - Arguments are passed to yt-dlp via `.arg()` (no shell expansion)
/// - `--no-exec` prevents yt-dlp from running post-processing commands
/// - Downloaded file path is validated to be inside the scratch dir
pub struct YtDlpAudio {
    base_url: String,
    timeout: Duration,
}

impl YtDlpAudio {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AudioSource for YtDlpAudio {
    async fn download(&self, video_id: &VideoId) -> Result<DownloadedAudio> {
        let url = video_url(&self.base_url, video_id)?;
        info!(%url, "downloading audio");

        let scratch = ScratchDir::create("audio")?;
        let output_template = scratch
            .path()
            .join("%(id)s.%(ext)s")
            .to_str()
            .ok_or_else(|| Error::Download("temp directory path contains invalid UTF-8".into()))?
            .to_string();

        let output = run_ytdlp(
            &[
                "--extract-audio",
                "--audio-format",
                "wav",
                "--audio-quality",
                "0",
                "--no-playlist",
                "--no-exec",
                "--output",
                &output_template,
                "--print",
                "after_move:filepath",
                &url,
            ],
            self.timeout,
            "audio download",
        )
        .await?;

        if !output.status.success() {
            return Err(classify_failure(video_id, &output, Error::Download));
        }

        let printed = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let audio_path = if printed.is_empty() {
            find_audio_file(scratch.path())?
        } else {
            let candidate = PathBuf::from(printed.lines().last().unwrap_or_default());
            validate_path_in_dir(&candidate, scratch.path())?;
            candidate
        };

        if !audio_path.exists() {
            return Err(Error::Download(format!(
                "downloaded file not found at {}",
                audio_path.display()
            )));
        }

        debug!(path = %audio_path.display(), "audio downloaded");
        Ok(DownloadedAudio::new(scratch, audio_path))
    }
}

/// Build the page URL yt-dlp is pointed at.
pub(crate) fn video_url(base_url: &str, video_id: &VideoId) -> Result<String> {
    let url = format!("{base_url}{video_id}");
    validate_url(&url)?;
    Ok(url)
}

/// Rejects anything that isn't http:// or https://.
fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::Download(format!(
            "invalid URL (must start with http:// or https://): {trimmed}"
        )))
    }
}

/// Run yt-dlp with `args`, bounded by `limit`.
pub(crate) async fn run_ytdlp(
    args: &[&str],
    limit: Duration,
    operation: &'static str,
) -> Result<Output> {
    let mut cmd = tokio::process::Command::new("yt-dlp");
    cmd.args(args).kill_on_drop(true);

    with_timeout(operation, limit, async {
        cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::YtDlpNotFound,
            _ => Error::Io(e),
        })
    })
    .await
}

/// Turn a failed yt-dlp run into an error, recognizing missing videos.
pub(crate) fn classify_failure(
    video_id: &VideoId,
    output: &Output,
    otherwise: fn(String) -> Error,
) -> Error {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lowered = stderr.to_lowercase();
    if lowered.contains("video unavailable")
        || lowered.contains("private video")
        || lowered.contains("is not a valid url")
        || lowered.contains("incomplete youtube id")
    {
        return Error::VideoUnavailable {
            video_id: video_id.to_string(),
        };
    }
    // Limit error message length to avoid dumping huge stderr
    let stderr_truncated: String = stderr.chars().take(1000).collect();
    otherwise(format!("yt-dlp failed: {stderr_truncated}"))
}

/// Normalize a path by resolving `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Validate that a path is inside the expected directory (prevents path traversal).
fn validate_path_in_dir(path: &Path, expected_dir: &Path) -> Result<()> {
    let canonical_dir = expected_dir
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(expected_dir));
    let canonical_path = path
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(path));

    if canonical_path.starts_with(&canonical_dir) {
        Ok(())
    } else {
        warn!(
            path = %path.display(),
            expected_dir = %expected_dir.display(),
            "downloaded file path outside expected directory"
        );
        Err(Error::Download(
            "downloaded file path is outside the scratch directory".into(),
        ))
    }
}

/// First audio file in `dir`, by name.
fn find_audio_file(dir: &Path) -> Result<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| matches!(ext, "wav" | "mp3" | "ogg" | "m4a" | "opus" | "flac" | "webm"))
        })
        .collect();
    found.sort();
    found
        .into_iter()
        .next()
        .ok_or_else(|| Error::Download("no audio file found after download".into()))
}
