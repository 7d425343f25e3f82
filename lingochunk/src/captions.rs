use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::download::{classify_failure, run_ytdlp, video_url, ScratchDir};
use crate::error::{Error, Result};
use crate::types::VideoId;

/// Source of an existing English caption track.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// All caption fragments, in track order, joined by single spaces.
    async fn english_captions(&self, video_id: &VideoId) -> Result<String>;
}

/// Captions fetched with yt-dlp as `json3`, manual track preferred over
/// auto-generated.
pub struct YtDlpCaptions {
    base_url: String,
    timeout: Duration,
}

impl YtDlpCaptions {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CaptionSource for YtDlpCaptions {
    async fn english_captions(&self, video_id: &VideoId) -> Result<String> {
        let url = video_url(&self.base_url, video_id)?;
        info!(%url, "fetching captions");

        let scratch = ScratchDir::create("captions")?;
        let output_template = scratch
            .path()
            .join("%(id)s.%(ext)s")
            .to_str()
            .ok_or_else(|| Error::Captions("temp directory path contains invalid UTF-8".into()))?
            .to_string();

        let output = run_ytdlp(
            &[
                "--skip-download",
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs",
                "en",
                "--sub-format",
                "json3",
                "--no-playlist",
                "--no-exec",
                "--output",
                &output_template,
                &url,
            ],
            self.timeout,
            "caption fetch",
        )
        .await?;

        if !output.status.success() {
            return Err(classify_failure(video_id, &output, Error::Captions));
        }

        let track = find_track(scratch.path())?.ok_or_else(|| Error::CaptionsUnavailable {
            video_id: video_id.to_string(),
        })?;
        let raw = std::fs::read(&track)?;
        let text = parse_json3(&raw)?;
        debug!(chars = text.len(), "captions parsed");
        Ok(text)
    }
}

#[derive(Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
struct Json3Event {
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Join caption events into one line of text.
///
/// Each event's fragments form one caption entry; entries are joined with a
/// single space and line breaks inside an entry become spaces.
fn parse_json3(raw: &[u8]) -> Result<String> {
    let track: Json3 = serde_json::from_slice(raw)
        .map_err(|e| Error::Captions(format!("unreadable caption track: {e}")))?;

    let entries: Vec<String> = track
        .events
        .iter()
        .map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|entry| !entry.is_empty())
        .collect();

    Ok(entries.join(" "))
}

fn find_track(dir: &Path) -> Result<Option<PathBuf>> {
    let mut tracks: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json3"))
        .collect();
    tracks.sort();
    Ok(tracks.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json3_joins_events_in_order() {
        let raw = br#"{
            "wireMagic": "pb3",
            "events": [
                {"tStartMs": 0, "dDurationMs": 1000, "segs": [{"utf8": "hello"}, {"utf8": " there"}]},
                {"tStartMs": 900, "aAppend": 1, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 1000, "segs": [{"utf8": "how are\nyou"}]},
                {"tStartMs": 2000}
            ]
        }"#;
        assert_eq!(parse_json3(raw).unwrap(), "hello there how are you");
    }

    #[test]
    fn test_parse_json3_empty_track() {
        assert_eq!(parse_json3(br#"{"events": []}"#).unwrap(), "");
        assert_eq!(parse_json3(br#"{}"#).unwrap(), "");
    }

    #[test]
    fn test_parse_json3_garbage() {
        let err = parse_json3(b"<html>").unwrap_err();
        assert!(matches!(err, Error::Captions(_)));
        assert!(err.allows_fallback());
    }

    #[test]
    fn test_find_track() {
        let scratch = ScratchDir::create("test").unwrap();
        assert!(find_track(scratch.path()).unwrap().is_none());
        std::fs::write(scratch.path().join("abc.en.json3"), b"{}").unwrap();
        assert_eq!(
            find_track(scratch.path()).unwrap(),
            Some(scratch.path().join("abc.en.json3"))
        );
    }
}
