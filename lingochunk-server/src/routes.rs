use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lingochunk::{parse_start_time, ChunkPipeline, Error, ErrorKind, LanguageCode, VideoId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChunkPipeline>,
}

pub fn router(pipeline: Arc<ChunkPipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/get_transcript", get(get_transcript))
        .route("/split_sentences", post(split_sentences))
        .route("/translate", post(translate))
        .route("/pronunciation", post(pronunciation))
        .route("/get_chunk", get(get_chunk))
        .with_state(AppState { pipeline })
}

/// Library error rendered as `{"error", "kind"}` with a matching status.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(%kind, error = %self.0, "request failed");
        (
            status,
            Json(json!({"error": self.0.to_string(), "kind": kind.as_str()})),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// `Json` body whose rejections are reported as validation errors.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(Error::InvalidRequest(rejection.body_text()))),
        }
    }
}

fn video_id(raw: Option<&str>) -> Result<VideoId, ApiError> {
    let raw = raw.ok_or_else(|| Error::InvalidRequest("missing video_id".into()))?;
    Ok(VideoId::new(raw)?)
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    field.ok_or_else(|| ApiError(Error::InvalidRequest(format!("missing {name}"))))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "cached_chunks": state.pipeline.store().len()}))
}

#[derive(Deserialize)]
pub struct TranscriptQuery {
    video_id: Option<String>,
}

#[derive(Serialize)]
struct TranscriptResponse {
    transcript: String,
}

async fn get_transcript(
    State(state): State<AppState>,
    Query(q): Query<TranscriptQuery>,
) -> ApiResult<TranscriptResponse> {
    let id = video_id(q.video_id.as_deref())?;
    let transcript = state.pipeline.transcript(&id).await?;
    Ok(Json(TranscriptResponse { transcript }))
}

#[derive(Deserialize)]
pub struct SplitBody {
    text: Option<String>,
}

#[derive(Serialize)]
struct SplitResponse {
    sentences: Vec<String>,
}

async fn split_sentences(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SplitBody>,
) -> ApiResult<SplitResponse> {
    let text = required(body.text, "text")?;
    let sentences = state
        .pipeline
        .split_sentences(&text)
        .await?
        .into_iter()
        .map(|s| s.into_string())
        .collect();
    Ok(Json(SplitResponse { sentences }))
}

#[derive(Deserialize)]
pub struct TranslateBody {
    sentence: Option<String>,
    lang: Option<String>,
}

#[derive(Serialize)]
struct TranslateResponse {
    translated: String,
}

async fn translate(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TranslateBody>,
) -> ApiResult<TranslateResponse> {
    let sentence = required(body.sentence, "sentence")?;
    let target = body.lang.as_deref().map(LanguageCode::new).transpose()?;
    let translated = state.pipeline.translate(&sentence, target.as_ref()).await?;
    Ok(Json(TranslateResponse { translated }))
}

#[derive(Deserialize)]
pub struct PronunciationBody {
    sentence: Option<String>,
}

#[derive(Serialize)]
struct PronunciationResponse {
    pronunciation: String,
}

async fn pronunciation(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PronunciationBody>,
) -> ApiResult<PronunciationResponse> {
    let sentence = body.sentence.unwrap_or_default();
    Ok(Json(PronunciationResponse {
        pronunciation: state.pipeline.pronounce(&sentence),
    }))
}

#[derive(Deserialize)]
pub struct ChunkQuery {
    video_id: Option<String>,
    start_time: Option<String>,
}

async fn get_chunk(
    State(state): State<AppState>,
    Query(q): Query<ChunkQuery>,
) -> ApiResult<lingochunk::Chunk> {
    let id = video_id(q.video_id.as_deref())?;
    let start_time = parse_start_time(q.start_time.as_deref())?;
    let chunk = state.pipeline.get_chunk(&id, start_time).await?;
    Ok(Json(chunk))
}
