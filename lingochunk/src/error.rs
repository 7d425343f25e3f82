use std::fmt;
use std::path::PathBuf;

/// Coarse classification of an [`Error`], used for fallback decisions and
/// for mapping failures onto response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something malformed (bad video id, bad offset, ...).
    Validation,
    /// The requested video does not exist or is not reachable.
    NotFound,
    /// An external collaborator failed or answered with garbage.
    Upstream,
    /// An external collaborator did not answer in time.
    Timeout,
    /// Local failure: disk, model file, serialization of our own state.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors that can occur in lingochunk.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid video id: \"{0}\"")]
    InvalidVideoId(String),

    #[error("invalid start_time: \"{0}\" (expected a non-negative whole number of seconds)")]
    InvalidStartTime(String),

    #[error("invalid language code: \"{0}\"")]
    InvalidLanguage(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("video not found: {video_id}")]
    VideoUnavailable { video_id: String },

    #[error("no English captions for video {video_id}")]
    CaptionsUnavailable { video_id: String },

    #[error("caption retrieval error: {0}")]
    Captions(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("yt-dlp not found, install with: pip install yt-dlp")]
    YtDlpNotFound,

    #[error("audio decoding error: {0}")]
    AudioDecode(String),

    #[error("audio file not found: {path}")]
    AudioNotFound { path: PathBuf },

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("whisper error: {0}")]
    Whisper(#[from] whisper_rs::WhisperError),

    #[error("model error: {0}")]
    Model(String),

    #[error("model not found: {path}")]
    ModelNotFound { path: PathBuf },

    #[error("model download failed: {0}")]
    ModelDownload(String),

    #[error("sentence segmentation error: {0}")]
    Segmentation(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("chunk store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidVideoId(_)
            | Error::InvalidStartTime(_)
            | Error::InvalidLanguage(_)
            | Error::InvalidRequest(_) => ErrorKind::Validation,

            Error::VideoUnavailable { .. } => ErrorKind::NotFound,

            Error::CaptionsUnavailable { .. }
            | Error::Captions(_)
            | Error::Download(_)
            | Error::YtDlpNotFound
            | Error::AudioDecode(_)
            | Error::Transcription(_)
            | Error::Whisper(_)
            | Error::Segmentation(_)
            | Error::Translation(_) => ErrorKind::Upstream,

            Error::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            Error::Http(_) => ErrorKind::Upstream,

            Error::Timeout { .. } => ErrorKind::Timeout,

            Error::AudioNotFound { .. }
            | Error::Model(_)
            | Error::ModelNotFound { .. }
            | Error::ModelDownload(_)
            | Error::Store(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::Internal,
        }
    }

    /// Whether a secondary strategy may be tried after this failure.
    ///
    /// Only failures of the collaborator itself qualify; bad input and local
    /// faults would fail the alternate path the same way.
    pub fn allows_fallback(&self) -> bool {
        matches!(self.kind(), ErrorKind::Upstream | ErrorKind::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Run `fut`, converting an elapsed deadline into [`Error::Timeout`].
pub(crate) async fn with_timeout<T, F>(
    operation: &'static str,
    limit: std::time::Duration,
    fut: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout {
            operation,
            secs: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display_invalid_video_id() {
        let e = Error::InvalidVideoId("../etc".into());
        assert_eq!(e.to_string(), "invalid video id: \"../etc\"");
    }

    #[test]
    fn test_error_display_audio_not_found() {
        let e = Error::AudioNotFound {
            path: PathBuf::from("/tmp/audio.wav"),
        };
        assert!(e.to_string().contains("/tmp/audio.wav"));
    }

    #[test]
    fn test_error_display_timeout() {
        let e = Error::Timeout {
            operation: "translation",
            secs: 30,
        };
        assert_eq!(e.to_string(), "translation timed out after 30s");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::InvalidStartTime("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            Error::VideoUnavailable { video_id: "abc".into() }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(Error::Translation("boom".into()).kind(), ErrorKind::Upstream);
        assert_eq!(Error::Store("disk full".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_fallback_is_narrow() {
        assert!(Error::CaptionsUnavailable { video_id: "abc".into() }.allows_fallback());
        assert!(Error::Segmentation("model crashed".into()).allows_fallback());
        assert!(Error::Timeout { operation: "captions", secs: 1 }.allows_fallback());
        assert!(!Error::InvalidVideoId("a b".into()).allows_fallback());
        assert!(!Error::VideoUnavailable { video_id: "abc".into() }.allows_fallback());
        assert!(!Error::Store("disk full".into()).allows_fallback());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert_eq!(e.kind(), ErrorKind::Internal);
        assert!(e.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<String>("invalid json").unwrap_err();
        let e: Error = json_err.into();
        assert!(matches!(e, Error::Json(_)));
    }

    #[tokio::test]
    async fn test_with_timeout_elapsed() {
        let res: Result<()> = with_timeout("slow thing", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(res, Err(Error::Timeout { operation: "slow thing", .. })));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result() {
        let res = with_timeout("fast thing", Duration::from_secs(5), async { Ok(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
