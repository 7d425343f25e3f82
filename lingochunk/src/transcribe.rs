use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio;
use crate::config::TranscribeOptions;
use crate::error::{with_timeout, Error, Result};

/// Speech-to-text over a local audio file.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Full recognized text of `audio`. `prompt` biases decoding only; it
    /// does not seek or truncate.
    async fn transcribe(&self, audio: &Path, prompt: Option<&str>) -> Result<String>;
}

/// whisper.cpp recognizer. The model is loaded once and shared; each call
/// gets its own decoder state.
pub struct WhisperRecognizer {
    ctx: Arc<WhisperContext>,
    options: TranscribeOptions,
    timeout: Duration,
}

impl WhisperRecognizer {
    pub fn load(model_path: &Path, options: TranscribeOptions, timeout: Duration) -> Result<Self> {
        info!(model = %model_path.display(), "loading whisper model");

        let mut ctx_params = WhisperContextParameters::new();
        ctx_params.use_gpu(options.gpu);
        ctx_params.gpu_device(options.gpu_device as i32);

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| Error::Model("model path contains invalid UTF-8".into()))?,
            ctx_params,
        )?;

        Ok(Self {
            ctx: Arc::new(ctx),
            options,
            timeout,
        })
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    async fn transcribe(&self, audio: &Path, prompt: Option<&str>) -> Result<String> {
        let ctx = self.ctx.clone();
        let options = self.options.clone();
        let prompt = prompt.map(str::to_owned);
        decode_then_infer(self.timeout, audio::load_audio(audio), move |samples| {
            run_whisper(&ctx, &samples, &options, prompt.as_deref())
        })
        .await
    }
}

/// Run `decode` and then `infer` under a single deadline of `limit`.
///
/// whisper.cpp cannot be interrupted: once the deadline passes the caller
/// gets [`Error::Timeout`], but an inference already running keeps its
/// blocking thread until it finishes on its own.
async fn decode_then_infer<D, F>(limit: Duration, decode: D, infer: F) -> Result<String>
where
    D: Future<Output = Result<Vec<f32>>>,
    F: FnOnce(Vec<f32>) -> Result<String> + Send + 'static,
{
    with_timeout("transcription", limit, async {
        let samples = decode.await?;
        tokio::task::spawn_blocking(move || infer(samples))
            .await
            .map_err(|e| Error::Transcription(format!("inference task failed: {e}")))?
    })
    .await
}

/// Samples must be 16kHz mono f32.
fn run_whisper(
    ctx: &WhisperContext,
    samples: &[f32],
    options: &TranscribeOptions,
    prompt: Option<&str>,
) -> Result<String> {
    let mut state = ctx.create_state()?;

    let mut params = match options.beam_size {
        Some(beam_size) => FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: beam_size as i32,
            patience: -1.0,
        }),
        None => FullParams::new(SamplingStrategy::Greedy { best_of: 5 }),
    };

    params.set_language(Some(&options.language));
    if let Some(prompt) = prompt {
        params.set_initial_prompt(prompt);
    }
    if let Some(n) = options.n_threads {
        params.set_n_threads(n as i32);
    }

    // Disable stderr printing from whisper.cpp
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    info!(samples = samples.len(), "running transcription");
    state.full(params, samples)?;

    let num_segments = state.full_n_segments();
    debug!(num_segments, "transcription complete");

    let mut texts = Vec::with_capacity(num_segments.max(0) as usize);
    for i in 0..num_segments {
        let segment = state
            .get_segment(i)
            .ok_or_else(|| Error::Transcription(format!("segment {i} not found")))?;
        let text = segment
            .to_str_lossy()
            .map_err(|e| Error::Transcription(format!("segment text error: {e}")))?;
        texts.push(text.into_owned());
    }

    Ok(join_segments(texts))
}

/// Trimmed segment texts joined by single spaces.
fn join_segments(texts: impl IntoIterator<Item = String>) -> String {
    texts
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_segments() {
        let texts = vec![
            " hello how are you".to_string(),
            "   ".to_string(),
            " doing today ".to_string(),
        ];
        assert_eq!(join_segments(texts), "hello how are you doing today");
    }

    #[test]
    fn test_join_segments_empty() {
        assert_eq!(join_segments(Vec::new()), "");
    }

    #[tokio::test]
    async fn test_decode_and_inference_share_one_deadline() {
        let decode = async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok(vec![0.0; 16])
        };
        let res = decode_then_infer(Duration::from_millis(250), decode, |_| {
            std::thread::sleep(Duration::from_millis(150));
            Ok("late".to_string())
        })
        .await;
        assert!(matches!(
            res,
            Err(Error::Timeout {
                operation: "transcription",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_decode_then_infer_passes_samples() {
        let res = decode_then_infer(
            Duration::from_secs(5),
            async { Ok(vec![0.5; 3]) },
            |samples| Ok(format!("{} samples", samples.len())),
        )
        .await;
        assert_eq!(res.unwrap(), "3 samples");
    }

    #[tokio::test]
    async fn test_decode_failure_skips_inference() {
        let res = decode_then_infer(
            Duration::from_secs(5),
            async { Err(Error::AudioDecode("ffmpeg failed".into())) },
            |_| panic!("inference must not run"),
        )
        .await;
        assert!(matches!(res, Err(Error::AudioDecode(_))));
    }

    #[test]
    fn test_load_missing_model_fails() {
        let res = WhisperRecognizer::load(
            Path::new("/nonexistent/ggml-base.bin"),
            TranscribeOptions::default(),
            Duration::from_secs(1),
        );
        assert!(res.is_err());
    }
}
