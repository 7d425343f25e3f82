use std::sync::Arc;

use tracing::{info, warn};

use crate::captions::CaptionSource;
use crate::download::AudioSource;
use crate::error::Result;
use crate::transcribe::SpeechRecognizer;
use crate::types::VideoId;

/// Obtains English transcript text for a video.
///
/// Whole-video requests try the caption track first and fall back to
/// download-and-transcribe. Windowed requests always transcribe, because
/// caption tracks cannot be windowed; the window is only a decoding hint
/// and the whole audio track is still transcribed.
#[derive(Clone)]
pub struct TranscriptAcquirer {
    captions: Arc<dyn CaptionSource>,
    audio: Arc<dyn AudioSource>,
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl TranscriptAcquirer {
    pub fn new(
        captions: Arc<dyn CaptionSource>,
        audio: Arc<dyn AudioSource>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Self {
        Self {
            captions,
            audio,
            recognizer,
        }
    }

    /// Transcript of the whole video.
    pub async fn acquire(&self, video_id: &VideoId) -> Result<String> {
        match self.captions.english_captions(video_id).await {
            Ok(text) => {
                info!(%video_id, source = "captions", chars = text.len(), "transcript acquired");
                Ok(text)
            }
            Err(e) if e.allows_fallback() => {
                warn!(%video_id, error = %e, "captions unavailable, transcribing audio");
                self.transcribe_audio(video_id, None).await
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort transcript anchored near `start_time` seconds.
    pub async fn acquire_window(&self, video_id: &VideoId, start_time: u64) -> Result<String> {
        let hint = window_hint(start_time);
        self.transcribe_audio(video_id, Some(&hint)).await
    }

    async fn transcribe_audio(&self, video_id: &VideoId, hint: Option<&str>) -> Result<String> {
        // Dropping `audio` deletes the download, whatever the outcome below.
        let audio = self.audio.download(video_id).await?;
        let text = self.recognizer.transcribe(audio.path(), hint).await?;
        info!(%video_id, source = "speech", chars = text.len(), "transcript acquired");
        Ok(text)
    }
}

/// Decoding prompt for a windowed transcription.
pub fn window_hint(start_time: u64) -> String {
    format!("Start at {start_time} seconds")
}
