use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Target sample rate for whisper.cpp.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Longest audio accepted (8 hours). 8 hours at 16kHz mono f32 is ~1.8 GB.
const MAX_AUDIO_DURATION_SECS: u64 = 8 * 3600;

/// Decode an audio file to 16kHz mono f32 samples ready for whisper.
///
/// ffmpeg handles decoding, resampling, and channel mixing in one shot, so
/// any container yt-dlp hands back is accepted. ffmpeg stops one second past
/// [`MAX_AUDIO_DURATION_SECS`], so longer inputs are rejected without being
/// held in memory in full. The caller owns the deadline.
pub async fn load_audio(path: &Path) -> Result<Vec<f32>> {
    info!(path = %path.display(), "decoding audio");

    if !path.exists() {
        return Err(Error::AudioNotFound {
            path: path.to_path_buf(),
        });
    }

    let samples = decode_with_ffmpeg(path).await?;
    check_duration(samples.len())?;

    let duration = samples.len() as f64 / WHISPER_SAMPLE_RATE as f64;
    debug!(
        samples = samples.len(),
        duration_secs = format!("{duration:.1}"),
        "decoded audio"
    );
    Ok(samples)
}

fn check_duration(n_samples: usize) -> Result<()> {
    let max_samples = MAX_AUDIO_DURATION_SECS * WHISPER_SAMPLE_RATE as u64;
    if n_samples as u64 > max_samples {
        return Err(Error::AudioDecode(format!(
            "audio too long, maximum supported duration is {MAX_AUDIO_DURATION_SECS}s"
        )));
    }
    Ok(())
}

async fn decode_with_ffmpeg(path: &Path) -> Result<Vec<f32>> {
    let output = tokio::process::Command::new("ffmpeg")
        .args(["-nostdin", "-threads", "0", "-i"])
        .arg(path)
        .args([
            "-f",
            "s16le",
            "-ac",
            "1",
            "-acodec",
            "pcm_s16le",
            "-ar",
            &WHISPER_SAMPLE_RATE.to_string(),
            "-t",
            &(MAX_AUDIO_DURATION_SECS + 1).to_string(),
            "-",
        ])
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::AudioDecode("ffmpeg not found, install with: apt install ffmpeg".into())
            } else {
                Error::AudioDecode(format!("failed to run ffmpeg: {e}"))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr: String = stderr.chars().take(1000).collect();
        return Err(Error::AudioDecode(format!("ffmpeg failed: {stderr}")));
    }

    if output.stdout.is_empty() {
        return Err(Error::AudioDecode("ffmpeg produced no output".into()));
    }

    Ok(pcm_s16le_to_f32(&output.stdout))
}

/// Signed 16-bit little-endian PCM to f32 in [-1.0, 1.0). A trailing odd byte is ignored.
fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}
