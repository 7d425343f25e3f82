use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::LanguageCode;

/// Translates a single sentence. No retries, no caching.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        sentence: &str,
        target: &LanguageCode,
        source: &LanguageCode,
    ) -> Result<String>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

/// Client for a LibreTranslate-compatible endpoint.
pub struct LibreTranslate {
    client: reqwest::Client,
    url: String,
}

impl LibreTranslate {
    /// `client` should carry the request timeout; `url` is the full endpoint.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Translator for LibreTranslate {
    async fn translate(
        &self,
        sentence: &str,
        target: &LanguageCode,
        source: &LanguageCode,
    ) -> Result<String> {
        debug!(%source, %target, chars = sentence.len(), "translating");

        let response = self
            .client
            .post(&self.url)
            .json(&TranslateRequest {
                q: sentence,
                source: source.as_str(),
                target: target.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(300).collect();
            return Err(Error::Translation(format!("{status}: {body}")));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| Error::Translation(format!("malformed response: {e}")))?;

        parsed
            .translated_text
            .ok_or_else(|| Error::Translation("response has no translatedText field".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/translate")
    }

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::new(code).unwrap()
    }

    #[tokio::test]
    async fn test_sends_language_pair_and_reads_translated_text() {
        let app = Router::new().route(
            "/translate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["source"], "en");
                assert_eq!(body["target"], "hi");
                Json(json!({"translatedText": format!("<{}>", body["q"].as_str().unwrap())}))
            }),
        );
        let url = serve(app).await;
        let tr = LibreTranslate::new(reqwest::Client::new(), url);
        let out = tr.translate("good morning", &lang("hi"), &lang("en")).await.unwrap();
        assert_eq!(out, "<good morning>");
    }

    #[tokio::test]
    async fn test_missing_field_is_an_error() {
        let app = Router::new().route("/translate", post(|| async { Json(json!({"other": 1})) }));
        let url = serve(app).await;
        let tr = LibreTranslate::new(reqwest::Client::new(), url);
        let err = tr.translate("hi", &lang("hi"), &lang("en")).await.unwrap_err();
        assert!(matches!(err, Error::Translation(_)));
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let app = Router::new().route(
            "/translate",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let url = serve(app).await;
        let tr = LibreTranslate::new(reqwest::Client::new(), url);
        let err = tr.translate("hi", &lang("hi"), &lang("en")).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let app = Router::new().route(
            "/translate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"translatedText": "late"}))
            }),
        );
        let url = serve(app).await;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let tr = LibreTranslate::new(client, url);
        let err = tr.translate("hi", &lang("hi"), &lang("en")).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Timeout);
    }
}
