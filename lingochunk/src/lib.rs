//! Video in, sentence-by-sentence study material out.
//!
//! **lingochunk** turns a spoken-English video into ordered
//! `{original, pronunciation, translated}` records for language learners.
//! Transcripts come from the caption track or, failing that, from yt-dlp +
//! whisper.cpp; they are split into sentences, translated through a
//! LibreTranslate-compatible endpoint, given a rough phonetic spelling, and
//! cached per `(video_id, start_time)` in a JSON snapshot.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> lingochunk::Result<()> {
//! use lingochunk::{ChunkPipeline, PipelineOptions, VideoId};
//!
//! let options = PipelineOptions::new()
//!     .translate_url("http://localhost:5001/translate")
//!     .target_lang("hi")?;
//! let pipeline = ChunkPipeline::from_options(&options).await?;
//!
//! let chunk = pipeline.get_chunk(&VideoId::new("dQw4w9WgXcQ")?, 0).await?;
//! for record in chunk.records() {
//!     println!("{} | {} | {}", record.original, record.pronunciation, record.translated);
//! }
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub(crate) mod audio;
pub mod captions;
pub mod config;
pub mod download;
pub mod error;
pub mod flight;
pub mod model;
pub mod phonetic;
pub mod pipeline;
pub mod segment;
pub mod store;
pub mod transcribe;
pub mod translate;
pub mod types;

pub use acquire::TranscriptAcquirer;
pub use captions::CaptionSource;
pub use config::{Model, PipelineOptions, Timeouts, TranscribeOptions};
pub use download::{AudioSource, DownloadedAudio, ScratchDir};
pub use error::{Error, ErrorKind, Result};
pub use phonetic::{phoneticize, PronunciationTable};
pub use pipeline::ChunkPipeline;
pub use segment::{SentenceModel, SentenceSegmenter};
pub use store::ChunkStore;
pub use transcribe::SpeechRecognizer;
pub use translate::Translator;
pub use types::{parse_start_time, Chunk, ChunkKey, LanguageCode, Sentence, SentenceRecord, VideoId};
