use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum accepted video id length. Real ids are 11 characters.
const MAX_VIDEO_ID_LEN: usize = 64;

/// Opaque identifier of a remotely hosted video.
///
/// Restricted to `[A-Za-z0-9_-]` so it can be spliced into a URL handed to
/// yt-dlp without any quoting concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: &str) -> Result<Self> {
        let valid = !id.is_empty()
            && id.len() <= MAX_VIDEO_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(id.to_string()))
        } else {
            Err(Error::InvalidVideoId(id.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse the `start_time` request parameter into whole seconds.
///
/// Absent means 0. Leading zeros and surrounding whitespace are accepted so
/// that `"0"`, `"00"` and an omitted value all land on the same cache key;
/// anything else (negative, fractional, non-numeric) is rejected.
pub fn parse_start_time(raw: Option<&str>) -> Result<u64> {
    let Some(raw) = raw else {
        return Ok(0);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidStartTime(raw.to_string()));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| Error::InvalidStartTime(raw.to_string()))
}

/// Composite identity of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub video_id: VideoId,
    pub start_time: u64,
}

impl ChunkKey {
    pub fn new(video_id: VideoId, start_time: u64) -> Self {
        Self {
            video_id,
            start_time,
        }
    }

    /// Storage key, `"{video_id}_{start_time}"`.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.video_id, self.start_time)
    }
}

/// A trimmed, non-empty sentence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sentence(String);

impl Sentence {
    /// Trim `text`; `None` if nothing is left.
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sentence's original text, phonetic approximation and translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub original: String,
    pub pronunciation: String,
    pub translated: String,
}

/// Ordered sentence records for one `(video_id, start_time)` window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chunk(pub Vec<SentenceRecord>);

impl Chunk {
    pub fn records(&self) -> &[SentenceRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A validated language code such as `"en"`, `"hi"` or `"zh-Hans"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();
        let mut parts = code.split('-');
        let primary_ok = parts
            .next()
            .is_some_and(|p| (2..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()));
        let subtags_ok = parts.all(|p| {
            (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric())
        });
        if primary_ok && subtags_ok && code.len() <= 12 {
            Ok(Self(code.to_string()))
        } else {
            Err(Error::InvalidLanguage(code.to_string()))
        }
    }

    /// Unchecked; only for the crate's own defaults.
    pub(crate) fn builtin(code: &'static str) -> Self {
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_accepts_youtube_ids() {
        assert!(VideoId::new("dQw4w9WgXcQ").is_ok());
        assert!(VideoId::new("abc123").is_ok());
        assert!(VideoId::new("a-b_c").is_ok());
    }

    #[test]
    fn test_video_id_rejects_injection() {
        assert!(VideoId::new("").is_err());
        assert!(VideoId::new("abc&list=1").is_err());
        assert!(VideoId::new("$(whoami)").is_err());
        assert!(VideoId::new("../../etc/passwd").is_err());
        assert!(VideoId::new(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_start_time_canonical_forms() {
        assert_eq!(parse_start_time(None).unwrap(), 0);
        assert_eq!(parse_start_time(Some("0")).unwrap(), 0);
        assert_eq!(parse_start_time(Some("000")).unwrap(), 0);
        assert_eq!(parse_start_time(Some("")).unwrap(), 0);
        assert_eq!(parse_start_time(Some(" 90 ")).unwrap(), 90);
    }

    #[test]
    fn test_start_time_rejects_garbage() {
        for raw in ["-5", "1.5", "abc", "+3", "1e3"] {
            let err = parse_start_time(Some(raw)).unwrap_err();
            assert!(matches!(err, Error::InvalidStartTime(_)), "{raw}");
        }
    }

    #[test]
    fn test_chunk_key_format() {
        let key = ChunkKey::new(VideoId::new("abc123").unwrap(), 0);
        assert_eq!(key.storage_key(), "abc123_0");
        let key = ChunkKey::new(VideoId::new("a_b").unwrap(), 120);
        assert_eq!(key.to_string(), "a_b_120");
    }

    #[test]
    fn test_sentence_trims_and_rejects_blank() {
        assert_eq!(Sentence::new("  hi there \n").unwrap().as_str(), "hi there");
        assert!(Sentence::new("   \t").is_none());
    }

    #[test]
    fn test_chunk_json_shape() {
        let chunk = Chunk(vec![SentenceRecord {
            original: "hello".into(),
            pronunciation: "हेलो".into(),
            translated: "नमस्ते".into(),
        }]);
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"original": "hello", "pronunciation": "हेलो", "translated": "नमस्ते"}])
        );
    }

    #[test]
    fn test_language_codes() {
        assert!(LanguageCode::new("hi").is_ok());
        assert!(LanguageCode::new("zh-Hans").is_ok());
        assert!(LanguageCode::new("pt-BR").is_ok());
        assert!(LanguageCode::new("").is_err());
        assert!(LanguageCode::new("h").is_err());
        assert!(LanguageCode::new("hindi language").is_err());
        assert!(LanguageCode::new("en-").is_err());
    }
}
