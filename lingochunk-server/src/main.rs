use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lingochunk::{ChunkPipeline, Model, PipelineOptions, Timeouts, TranscribeOptions};
use tracing::{info, warn};

mod routes;

#[derive(Parser)]
#[command(
    name = "lingochunk-server",
    about = "Serve translated, phoneticized sentence chunks of videos over HTTP"
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "LINGOCHUNK_BIND", default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// LibreTranslate-compatible translate endpoint, e.g. http://localhost:5001/translate.
    #[arg(long, env = "LINGOCHUNK_TRANSLATE_URL")]
    translate_url: String,

    /// Sentence segmentation service (boundary rules only when unset).
    #[arg(long, env = "LINGOCHUNK_SEGMENTER_URL")]
    segmenter_url: Option<String>,

    /// Chunk cache snapshot file.
    #[arg(long, env = "LINGOCHUNK_STORE_PATH", default_value = "chunks.json")]
    store_path: PathBuf,

    /// JSON word -> pronunciation table replacing the built-in one.
    #[arg(long, env = "LINGOCHUNK_PRONUNCIATION_TABLE")]
    pronunciation_table: Option<PathBuf>,

    /// Language chunks are translated into.
    #[arg(long, env = "LINGOCHUNK_TARGET_LANG", default_value = "hi")]
    target_lang: String,

    /// Spoken language of the videos.
    #[arg(long, env = "LINGOCHUNK_SOURCE_LANG", default_value = "en")]
    source_lang: String,

    /// Whisper model name, or a path to a .bin file.
    #[arg(short, long, env = "LINGOCHUNK_MODEL", default_value = "base")]
    model: String,

    /// Model cache directory.
    #[arg(long, env = "LINGOCHUNK_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Disable GPU acceleration.
    #[arg(long, env = "LINGOCHUNK_NO_GPU")]
    no_gpu: bool,

    /// GPU device ID.
    #[arg(long, env = "LINGOCHUNK_GPU_DEVICE", default_value = "0")]
    gpu_device: u32,

    /// Number of threads (default: auto).
    #[arg(long, env = "LINGOCHUNK_THREADS")]
    threads: Option<u32>,

    /// Beam search size (default: greedy).
    #[arg(long, env = "LINGOCHUNK_BEAM_SIZE")]
    beam_size: Option<u32>,

    /// Seconds allowed per translation or segmentation request.
    #[arg(long, env = "LINGOCHUNK_HTTP_TIMEOUT", default_value = "30")]
    http_timeout: u64,

    /// Seconds allowed per yt-dlp invocation.
    #[arg(long, env = "LINGOCHUNK_DOWNLOAD_TIMEOUT", default_value = "300")]
    download_timeout: u64,

    /// Seconds allowed for decoding plus transcription of one video.
    #[arg(long, env = "LINGOCHUNK_TRANSCRIBE_TIMEOUT", default_value = "1800")]
    transcribe_timeout: u64,

    /// URL prefix the video id is appended to.
    #[arg(
        long,
        env = "LINGOCHUNK_VIDEO_BASE_URL",
        default_value = "https://www.youtube.com/watch?v="
    )]
    video_base_url: String,
}

impl Cli {
    fn options(self) -> Result<PipelineOptions, String> {
        let model = match Model::parse_name(&self.model) {
            Some(m) => m,
            None => {
                let path = PathBuf::from(&self.model);
                if path.exists() {
                    Model::Custom(path)
                } else {
                    return Err(format!(
                        "unknown model: {} (use a model name or a path to a .bin file)",
                        self.model
                    ));
                }
            }
        };

        let transcribe = TranscribeOptions {
            model,
            language: self.source_lang.clone(),
            n_threads: self.threads,
            gpu: !self.no_gpu,
            gpu_device: self.gpu_device,
            beam_size: self.beam_size,
            cache_dir: self.cache_dir,
        };

        let timeouts = Timeouts {
            http: Duration::from_secs(self.http_timeout),
            download: Duration::from_secs(self.download_timeout),
            transcription: Duration::from_secs(self.transcribe_timeout),
        };

        let options = PipelineOptions::new()
            .source_lang(&self.source_lang)
            .and_then(|o| o.target_lang(&self.target_lang))
            .map_err(|e| e.to_string())?;

        Ok(options
            .translate_url(self.translate_url)
            .segmenter_url(self.segmenter_url)
            .store_path(self.store_path)
            .pronunciation_table(self.pronunciation_table)
            .video_base_url(self.video_base_url)
            .timeouts(timeouts)
            .transcribe(transcribe))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "lingochunk=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let bind = cli.bind;
    let options = match cli.options() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let pipeline = match ChunkPipeline::from_options(&options).await {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    info!(
        cached_chunks = pipeline.store().len(),
        store = %options.store_path.display(),
        target = %pipeline.target_lang(),
        "pipeline ready"
    );

    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error binding {bind}: {e}");
            std::process::exit(1);
        }
    };
    info!(%bind, "listening");

    if let Err(e) = axum::serve(listener, routes::router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
    info!("shut down");
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
