use std::sync::Arc;

use tracing::{debug, info};

use crate::acquire::TranscriptAcquirer;
use crate::captions::YtDlpCaptions;
use crate::config::PipelineOptions;
use crate::download::YtDlpAudio;
use crate::error::{Error, Result};
use crate::flight::SingleFlight;
use crate::model;
use crate::phonetic::PronunciationTable;
use crate::segment::{HttpSentenceModel, SentenceModel, SentenceSegmenter};
use crate::store::ChunkStore;
use crate::transcribe::WhisperRecognizer;
use crate::translate::{LibreTranslate, Translator};
use crate::types::{Chunk, ChunkKey, LanguageCode, Sentence, SentenceRecord, VideoId};

/// Turns `(video_id, start_time)` into a cached [`Chunk`].
///
/// Lookup, acquisition, segmentation and per-sentence enrichment run strictly
/// in that order. A chunk is stored only once every sentence is translated,
/// and concurrent requests for one key share a single computation.
pub struct ChunkPipeline {
    acquirer: TranscriptAcquirer,
    segmenter: SentenceSegmenter,
    translator: Arc<dyn Translator>,
    pronunciation: PronunciationTable,
    store: ChunkStore,
    flights: SingleFlight,
    source_lang: LanguageCode,
    target_lang: LanguageCode,
}

impl ChunkPipeline {
    pub fn new(
        acquirer: TranscriptAcquirer,
        segmenter: SentenceSegmenter,
        translator: Arc<dyn Translator>,
        pronunciation: PronunciationTable,
        store: ChunkStore,
        source_lang: LanguageCode,
        target_lang: LanguageCode,
    ) -> Self {
        Self {
            acquirer,
            segmenter,
            translator,
            pronunciation,
            store,
            flights: SingleFlight::new(),
            source_lang,
            target_lang,
        }
    }

    /// Wire up the production collaborators: yt-dlp, whisper.cpp, an HTTP
    /// segmentation model (if configured) and LibreTranslate.
    pub async fn from_options(options: &PipelineOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeouts.http)
            .build()?;

        let model_path =
            model::ensure_model(&options.transcribe.model, &options.transcribe.resolve_cache_dir())
                .await?;
        let recognizer = WhisperRecognizer::load(
            &model_path,
            options.transcribe.clone(),
            options.timeouts.transcription,
        )?;

        let acquirer = TranscriptAcquirer::new(
            Arc::new(YtDlpCaptions::new(
                options.video_base_url.clone(),
                options.timeouts.download,
            )),
            Arc::new(YtDlpAudio::new(
                options.video_base_url.clone(),
                options.timeouts.download,
            )),
            Arc::new(recognizer),
        );

        let sentence_model = options.segmenter_url.as_ref().map(|url| {
            Arc::new(HttpSentenceModel::new(http.clone(), url.clone())) as Arc<dyn SentenceModel>
        });

        let pronunciation = match &options.pronunciation_table {
            Some(path) => PronunciationTable::load(path)?,
            None => PronunciationTable::builtin(),
        };

        let store = ChunkStore::open(options.store_path.clone()).await?;

        Ok(Self::new(
            acquirer,
            SentenceSegmenter::new(sentence_model),
            Arc::new(LibreTranslate::new(http, options.translate_url.clone())),
            pronunciation,
            store,
            options.source_lang.clone(),
            options.target_lang.clone(),
        ))
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn target_lang(&self) -> &LanguageCode {
        &self.target_lang
    }

    /// Whole-video transcript, captions first.
    pub async fn transcript(&self, video_id: &VideoId) -> Result<String> {
        self.acquirer.acquire(video_id).await
    }

    pub async fn split_sentences(&self, text: &str) -> Result<Vec<Sentence>> {
        self.segmenter.segment(text).await
    }

    /// Translate one sentence into `target`, or the configured target language.
    pub async fn translate(&self, sentence: &str, target: Option<&LanguageCode>) -> Result<String> {
        let target = target.unwrap_or(&self.target_lang);
        self.translator
            .translate(sentence, target, &self.source_lang)
            .await
    }

    pub fn pronounce(&self, sentence: &str) -> String {
        self.pronunciation.phoneticize(sentence)
    }

    /// The chunk for `(video_id, start_time)`, computed at most once.
    pub async fn get_chunk(&self, video_id: &VideoId, start_time: u64) -> Result<Chunk> {
        let key = ChunkKey::new(video_id.clone(), start_time);
        if let Some(chunk) = self.store.get(&key) {
            debug!(%key, "chunk cache hit");
            return Ok(chunk);
        }

        let _flight = self.flights.acquire(&key.storage_key()).await;
        // Another request may have finished this key while we waited.
        if let Some(chunk) = self.store.get(&key) {
            debug!(%key, "chunk computed by concurrent request");
            return Ok(chunk);
        }

        info!(%key, "chunk cache miss, computing");
        let chunk = self.compute(&key).await?;
        self.store.put(&key, chunk.clone()).await?;
        info!(%key, sentences = chunk.len(), "chunk stored");
        Ok(chunk)
    }

    async fn compute(&self, key: &ChunkKey) -> Result<Chunk> {
        let transcript = self
            .acquirer
            .acquire_window(&key.video_id, key.start_time)
            .await?;
        let sentences = self.segmenter.segment(&transcript).await?;
        debug!(%key, sentences = sentences.len(), "transcript segmented");

        // One sentence at a time; record order must match segmentation order.
        let mut records = Vec::with_capacity(sentences.len());
        for (index, sentence) in sentences.into_iter().enumerate() {
            let translated = self
                .translator
                .translate(sentence.as_str(), &self.target_lang, &self.source_lang)
                .await
                .map_err(|e| annotate(e, index))?;
            let pronunciation = self.pronunciation.phoneticize(sentence.as_str());
            records.push(SentenceRecord {
                original: sentence.into_string(),
                pronunciation,
                translated,
            });
        }
        Ok(Chunk(records))
    }
}

fn annotate(err: Error, index: usize) -> Error {
    match err {
        Error::Translation(msg) => Error::Translation(format!("sentence {}: {msg}", index + 1)),
        other => other,
    }
}
