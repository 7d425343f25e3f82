use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};
use crate::types::Sentence;

/// A statistical sentence splitter suited to unpunctuated, run-on speech.
#[async_trait]
pub trait SentenceModel: Send + Sync {
    /// Split `text` into raw sentence strings, in source order.
    async fn split(&self, text: &str) -> Result<Vec<String>>;
}

#[derive(Serialize)]
struct SplitRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SplitResponse {
    sentences: Vec<String>,
}

/// Sentence model served over HTTP: `POST {"text"}` answering `{"sentences": [...]}`.
pub struct HttpSentenceModel {
    client: reqwest::Client,
    url: String,
}

impl HttpSentenceModel {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SentenceModel for HttpSentenceModel {
    async fn split(&self, text: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .post(&self.url)
            .json(&SplitRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(300).collect();
            return Err(Error::Segmentation(format!("{status}: {body}")));
        }

        let parsed: SplitResponse = response
            .json()
            .await
            .map_err(|e| Error::Segmentation(format!("malformed response: {e}")))?;
        Ok(parsed.sentences)
    }
}

/// Splits transcripts into sentences.
///
/// The model result is cleaned: blanks dropped, each sentence trimmed, later
/// duplicates removed. When the model fails (or none is configured) Unicode
/// sentence boundaries are used instead, and that result is trimmed but NOT
/// de-duplicated.
#[derive(Clone, Default)]
pub struct SentenceSegmenter {
    model: Option<Arc<dyn SentenceModel>>,
}

impl SentenceSegmenter {
    pub fn new(model: Option<Arc<dyn SentenceModel>>) -> Self {
        Self { model }
    }

    pub fn boundaries_only() -> Self {
        Self { model: None }
    }

    pub async fn segment(&self, text: &str) -> Result<Vec<Sentence>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        if let Some(model) = &self.model {
            match model.split(text).await {
                Ok(raw) => {
                    let sentences = dedup(raw);
                    debug!(count = sentences.len(), "sentence model split");
                    return Ok(sentences);
                }
                Err(e) if e.allows_fallback() => {
                    warn!(error = %e, "sentence model failed, falling back to boundary rules");
                }
                Err(e) => return Err(e),
            }
        }

        let sentences = split_boundaries(text);
        debug!(count = sentences.len(), "boundary split");
        Ok(sentences)
    }
}

/// UAX #29 sentence boundaries, trimmed, blanks dropped.
pub fn split_boundaries(text: &str) -> Vec<Sentence> {
    text.split_sentence_bounds().filter_map(Sentence::new).collect()
}

fn dedup(raw: Vec<String>) -> Vec<Sentence> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|s| Sentence::new(s))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl SentenceModel for Fixed {
        async fn split(&self, _text: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct Failing {
        calls: AtomicUsize,
        error: fn() -> Error,
    }

    #[async_trait]
    impl SentenceModel for Failing {
        async fn split(&self, _text: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }
    }

    fn texts(sentences: &[Sentence]) -> Vec<&str> {
        sentences.iter().map(Sentence::as_str).collect()
    }

    #[tokio::test]
    async fn test_model_result_trimmed_and_deduplicated() {
        let seg = SentenceSegmenter::new(Some(Arc::new(Fixed(vec![
            " hello there ",
            "",
            "how are you",
            "   ",
            "hello there",
            "bye",
        ]))));
        let out = seg.segment("whatever").await.unwrap();
        assert_eq!(texts(&out), ["hello there", "how are you", "bye"]);
    }

    #[tokio::test]
    async fn test_segmentation_is_deterministic() {
        let seg = SentenceSegmenter::new(Some(Arc::new(Fixed(vec!["a b", "c d", "a b"]))));
        let first = seg.segment("text").await.unwrap();
        let second = seg.segment("text").await.unwrap();
        assert_eq!(first, second);
        let unique: HashSet<_> = first.iter().collect();
        assert_eq!(unique.len(), first.len());
    }

    #[tokio::test]
    async fn test_upstream_failure_falls_back_without_dedup() {
        let model = Arc::new(Failing {
            calls: AtomicUsize::new(0),
            error: || Error::Segmentation("model offline".into()),
        });
        let seg = SentenceSegmenter::new(Some(model.clone()));
        let out = seg.segment("Go home. Go home. Then rest.").await.unwrap();
        assert_eq!(texts(&out), ["Go home.", "Go home.", "Then rest."]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_failure_is_not_masked() {
        let model = Arc::new(Failing {
            calls: AtomicUsize::new(0),
            error: || Error::Store("unexpected".into()),
        });
        let seg = SentenceSegmenter::new(Some(model));
        let err = seg.segment("Some text.").await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn test_boundaries_only() {
        let seg = SentenceSegmenter::boundaries_only();
        let out = seg.segment("hello how are you doing today").await.unwrap();
        assert_eq!(texts(&out), ["hello how are you doing today"]);
    }

    #[tokio::test]
    async fn test_blank_text_yields_nothing() {
        let seg = SentenceSegmenter::new(Some(Arc::new(Fixed(vec!["should not be used"]))));
        assert!(seg.segment("  \n ").await.unwrap().is_empty());
    }

    #[test]
    fn test_split_boundaries_trims() {
        let out = split_boundaries("  First one.  Second one?\nThird! ");
        assert_eq!(texts(&out), ["First one.", "Second one?", "Third!"]);
    }
}
