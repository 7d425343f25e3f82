use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::types::LanguageCode;

/// Whisper model sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Model {
    Tiny,
    TinyEn,
    Base,
    BaseEn,
    Small,
    SmallEn,
    Medium,
    MediumEn,
    LargeV3,
    LargeV3Turbo,
    /// User-provided .ggml file path.
    Custom(PathBuf),
}

impl Model {
    /// Model filename as used by HuggingFace / whisper.cpp.
    pub fn filename(&self) -> String {
        match self {
            Model::Custom(path) => path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom-model".into()),
            named => format!("ggml-{}.bin", named.name()),
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        match self {
            Model::Tiny => "tiny",
            Model::TinyEn => "tiny.en",
            Model::Base => "base",
            Model::BaseEn => "base.en",
            Model::Small => "small",
            Model::SmallEn => "small.en",
            Model::Medium => "medium",
            Model::MediumEn => "medium.en",
            Model::LargeV3 => "large-v3",
            Model::LargeV3Turbo => "large-v3-turbo",
            Model::Custom(_) => "custom",
        }
    }

    /// Parse a model name, or treat anything ending in `.bin` as a custom path.
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "tiny" => Some(Model::Tiny),
            "tiny.en" => Some(Model::TinyEn),
            "base" => Some(Model::Base),
            "base.en" => Some(Model::BaseEn),
            "small" => Some(Model::Small),
            "small.en" => Some(Model::SmallEn),
            "medium" => Some(Model::Medium),
            "medium.en" => Some(Model::MediumEn),
            "large-v3" => Some(Model::LargeV3),
            "large-v3-turbo" => Some(Model::LargeV3Turbo),
            other if other.ends_with(".bin") => Some(Model::Custom(PathBuf::from(other))),
            _ => None,
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Base
    }
}

/// Speech recognition settings.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    pub model: Model,
    /// Spoken language of the videos, passed to whisper.
    pub language: String,
    pub n_threads: Option<u32>,
    pub gpu: bool,
    pub gpu_device: u32,
    pub beam_size: Option<u32>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            model: Model::Base,
            language: "en".into(),
            n_threads: None,
            gpu: true,
            gpu_device: 0,
            beam_size: None,
            cache_dir: None,
        }
    }
}

impl TranscribeOptions {
    /// Resolve the model cache directory, defaulting to ~/.cache/lingochunk/models.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("lingochunk")
                .join("models")
        })
    }
}

/// Deadlines for calls leaving the process.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Translation and segmentation requests.
    pub http: Duration,
    /// Caption fetch and audio download (yt-dlp).
    pub download: Duration,
    /// Audio decoding plus whisper inference, as one shared budget.
    pub transcription: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http: Duration::from_secs(30),
            download: Duration::from_secs(300),
            transcription: Duration::from_secs(1800),
        }
    }
}

/// Everything needed to assemble a [`ChunkPipeline`](crate::ChunkPipeline).
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source_lang: LanguageCode,
    pub target_lang: LanguageCode,
    /// LibreTranslate-compatible endpoint (`POST {q, source, target}`).
    pub translate_url: String,
    /// Sentence segmentation service; `None` uses boundary rules only.
    pub segmenter_url: Option<String>,
    /// Snapshot file of the chunk cache.
    pub store_path: PathBuf,
    /// JSON object of `word -> spelling`; `None` uses the built-in table.
    pub pronunciation_table: Option<PathBuf>,
    /// Prefix the video id is appended to when handing a URL to yt-dlp.
    pub video_base_url: String,
    pub timeouts: Timeouts,
    pub transcribe: TranscribeOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            source_lang: LanguageCode::builtin("en"),
            target_lang: LanguageCode::builtin("hi"),
            translate_url: "http://localhost:5001/translate".into(),
            segmenter_url: None,
            store_path: PathBuf::from("chunks.json"),
            pronunciation_table: None,
            video_base_url: "https://www.youtube.com/watch?v=".into(),
            timeouts: Timeouts::default(),
            transcribe: TranscribeOptions::default(),
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_lang(mut self, code: &str) -> Result<Self> {
        self.source_lang = LanguageCode::new(code)?;
        Ok(self)
    }

    pub fn target_lang(mut self, code: &str) -> Result<Self> {
        self.target_lang = LanguageCode::new(code)?;
        Ok(self)
    }

    pub fn translate_url(mut self, url: impl Into<String>) -> Self {
        self.translate_url = url.into();
        self
    }

    pub fn segmenter_url(mut self, url: Option<String>) -> Self {
        self.segmenter_url = url;
        self
    }

    pub fn store_path(mut self, path: PathBuf) -> Self {
        self.store_path = path;
        self
    }

    pub fn pronunciation_table(mut self, path: Option<PathBuf>) -> Self {
        self.pronunciation_table = path;
        self
    }

    pub fn video_base_url(mut self, base: impl Into<String>) -> Self {
        self.video_base_url = base.into();
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn transcribe(mut self, transcribe: TranscribeOptions) -> Self {
        self.transcribe = transcribe;
        self
    }
}
