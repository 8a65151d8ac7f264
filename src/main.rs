use std::{path::Path, sync::Arc, time::Duration};

use axum::{
  headers::ContentType, response::IntoResponse, routing::get, Router,
  TypedHeader,
};
use tokio::sync::Semaphore;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod downloader;
mod error;
mod extractor;
mod format;
mod info;
mod job;
mod muxer;
mod progress;
mod transfer_store;
mod util;

pub use error::{Error, Result};

use config::Config;
use downloader::Downloader;
use extractor::{Extractor, Ytdlp};
use muxer::{Ffmpeg, Muxer};
use transfer_store::{TransferStore, TransferStoreRef};

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<Config>,
  pub extractor: Arc<dyn Extractor>,
  pub downloader: Arc<Downloader>,
  pub transfers: Arc<TransferStoreRef>,
  // limits how many download jobs run at a time
  pub jobs: Arc<Semaphore>,
}

impl AppState {
  fn new(
    config: Config,
    extractor: Arc<dyn Extractor>,
    muxer: Arc<dyn Muxer>,
  ) -> Self {
    let downloader = Downloader::new(
      extractor.clone(),
      muxer,
      &config.scratch_dir,
      config.stream_mode,
    );
    let transfers =
      TransferStore::new(config.transfer_ttl, config.transfer_capacity).spawn();
    let jobs = Semaphore::new(config.ytdlp_concurrency);

    Self {
      config: Arc::new(config),
      extractor,
      downloader: Arc::new(downloader),
      transfers: Arc::new(transfers),
      jobs: Arc::new(jobs),
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let config = Config::from_env()?;
  reset_scratch_dir(&config.scratch_dir)?;

  let extractor = Ytdlp::new(&config.ytdlp_path, config.ytdlp_proxy.clone());
  let muxer = Ffmpeg::new(
    &config.ffmpeg_path,
    config.mux_video_codec.clone(),
    config.mux_audio_codec.clone(),
  );
  let state = AppState::new(config, Arc::new(extractor), Arc::new(muxer));

  Toplevel::new(|s| async move {
    s.start(SubsystemBuilder::new("http", |subsys| serve(subsys, state)));
  })
  .catch_signals()
  .handle_shutdown_requests(Duration::from_secs(5))
  .await
  .map_err(|e| Error::Server(e.to_string()))
}

fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(homepage))
    .route("/health", get(health))
    .route("/api/info", get(info::get_info))
    .route("/api/download", get(job::start_download))
    .route("/api/file/:token", get(job::get_file))
    .with_state(state)
}

async fn serve(subsys: SubsystemHandle, state: AppState) -> Result<()> {
  let addr = state.config.bind_addr;
  let app = router(state);

  info!("Listening on http://{addr}");

  axum::Server::try_bind(&addr)
    .map_err(|e| Error::Server(format!("failed to bind {addr}: {e}")))?
    .serve(app.into_make_service())
    .with_graceful_shutdown(subsys.on_shutdown_requested())
    .await
    .map_err(|e| Error::Server(e.to_string()))
}

// job directories left by a previous run are never collected otherwise
fn reset_scratch_dir(dir: &Path) -> Result<()> {
  std::fs::create_dir_all(dir)?;

  for entry in std::fs::read_dir(dir)?.flatten() {
    let path = entry.path();
    let name = entry.file_name();
    if !path.is_dir() || !util::is_token(&name.to_string_lossy()) {
      continue;
    }
    if let Err(e) = std::fs::remove_dir_all(&path) {
      warn!("failed to clear {}: {e}", path.display());
    }
  }

  Ok(())
}

pub const HOMEPAGE_HTML: &str = include_str!("../html/homepage.html");

async fn homepage() -> impl IntoResponse {
  (
    TypedHeader::<ContentType>(ContentType::html()),
    HOMEPAGE_HTML,
  )
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}
