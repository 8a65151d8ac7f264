//! Runs one download job: fetch the chosen streams into a private scratch
//! directory, merge them when they were fetched separately, then load the
//! result into memory and clean up.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
  extractor::{Downloaded, Extractor, FetchRequest},
  format::QualityKey,
  muxer::Muxer,
  progress::{ProgressEvent, ProgressReporter},
  transfer_store::{Transfer, VIDEO_MIME_TYPE},
  util::{random_token, sanitize_file_stem},
  Error, Result,
};

const BEST_AUDIO: &str = "bestaudio";
const MERGED_EXT: &str = "mp4";
const PARTS_DIR: &str = "parts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
  /// yt-dlp fetches and merges `video+audio` itself.
  Combined,
  /// Video and audio are fetched one after the other and merged by the
  /// muxer.
  Separate,
}

impl StreamMode {
  pub fn quality_key(self) -> QualityKey {
    match self {
      StreamMode::Combined => QualityKey::Height,
      StreamMode::Separate => QualityKey::Label,
    }
  }
}

/// The quality option the user picked.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectedFormat {
  pub format_id: String,
  pub audio_format_id: Option<String>,
  pub ext: Option<String>,
}

impl SelectedFormat {
  fn audio_format(&self) -> &str {
    self
      .audio_format_id
      .as_deref()
      .filter(|id| !id.is_empty())
      .unwrap_or(BEST_AUDIO)
  }

  /// `video+audio`, falling back to whatever yt-dlp considers best.
  pub fn combined_format(&self) -> String {
    format!("{}+{}/best", self.format_id, self.audio_format())
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadJob {
  pub url: String,
  #[serde(flatten)]
  pub format: SelectedFormat,
}

pub struct Downloader {
  extractor: Arc<dyn Extractor>,
  muxer: Arc<dyn Muxer>,
  scratch_dir: PathBuf,
  mode: StreamMode,
}

impl Downloader {
  pub fn new(
    extractor: Arc<dyn Extractor>,
    muxer: Arc<dyn Muxer>,
    scratch_dir: impl AsRef<Path>,
    mode: StreamMode,
  ) -> Self {
    Self {
      extractor,
      muxer,
      scratch_dir: scratch_dir.as_ref().to_owned(),
      mode,
    }
  }

  pub async fn download(
    &self,
    job: &DownloadJob,
    progress: &dyn ProgressReporter,
  ) -> Result<Transfer> {
    let job_dir = self.scratch_dir.join(random_token());
    tokio::fs::create_dir_all(&job_dir).await?;
    info!(
      "downloading {} ({}, {}) into {}",
      job.url,
      job.format.format_id,
      job.format.ext.as_deref().unwrap_or("?"),
      job_dir.display()
    );

    let result = self.run(job, &job_dir, progress).await;
    match &result {
      Err(Error::Mux(_)) => {
        warn!("merge failed, leaving {} in place", job_dir.display())
      }
      _ => remove_dir(&job_dir, progress).await,
    }
    result
  }

  async fn run(
    &self,
    job: &DownloadJob,
    job_dir: &Path,
    progress: &dyn ProgressReporter,
  ) -> Result<Transfer> {
    let path = match self.mode {
      StreamMode::Combined => {
        self.fetch_combined(job, job_dir, progress).await?
      }
      StreamMode::Separate => {
        self.fetch_separate(job, job_dir, progress).await?
      }
    };

    into_transfer(&path, progress).await
  }

  async fn fetch_combined(
    &self,
    job: &DownloadJob,
    job_dir: &Path,
    progress: &dyn ProgressReporter,
  ) -> Result<PathBuf> {
    let request = FetchRequest {
      url: job.url.clone(),
      format: job.format.combined_format(),
      output_template: job_dir.join("%(title)s.%(ext)s"),
    };

    let Downloaded { path, .. } =
      self.extractor.download(&request, progress).await?;
    Ok(path)
  }

  async fn fetch_separate(
    &self,
    job: &DownloadJob,
    job_dir: &Path,
    progress: &dyn ProgressReporter,
  ) -> Result<PathBuf> {
    // intermediates live apart from the merged file, whatever the title is
    let parts_dir = job_dir.join(PARTS_DIR);
    tokio::fs::create_dir_all(&parts_dir).await?;

    let video_request = FetchRequest {
      url: job.url.clone(),
      format: job.format.format_id.clone(),
      output_template: parts_dir.join("video.%(ext)s"),
    };
    let video = self.extractor.download(&video_request, progress).await?;

    let audio_request = FetchRequest {
      url: job.url.clone(),
      format: job.format.audio_format().to_string(),
      output_template: parts_dir.join("audio.%(ext)s"),
    };
    let audio = self.extractor.download(&audio_request, progress).await?;

    let file_name = format!("{}.{MERGED_EXT}", sanitize_file_stem(&video.title));
    let dest = job_dir.join(file_name);

    // intermediates stay on disk when merging fails
    self.muxer.mux(&video.path, &audio.path, &dest).await?;

    remove_file(&video.path, progress).await;
    remove_file(&audio.path, progress).await;

    Ok(dest)
  }
}

/// Loads the finished file into memory and deletes the on-disk copy.
async fn into_transfer(
  path: &Path,
  progress: &dyn ProgressReporter,
) -> Result<Transfer> {
  if !tokio::fs::try_exists(path).await.unwrap_or(false) {
    return Err(Error::MissingOutput(path.to_owned()));
  }

  let data = tokio::fs::read(path).await?;
  let file_name = path
    .file_name()
    .map(|s| s.to_string_lossy().into_owned())
    .ok_or_else(|| Error::MissingOutput(path.to_owned()))?;

  remove_file(path, progress).await;

  Ok(Transfer {
    file_name,
    mime_type: VIDEO_MIME_TYPE,
    data: Bytes::from(data),
  })
}

async fn remove_file(path: &Path, progress: &dyn ProgressReporter) {
  if let Err(e) = tokio::fs::remove_file(path).await {
    warn!("failed to delete {}: {e}", path.display());
    progress.report(ProgressEvent::warning(format!(
      "Error cleaning up file: {e}"
    )));
  }
}

async fn remove_dir(path: &Path, progress: &dyn ProgressReporter) {
  if let Err(e) = tokio::fs::remove_dir_all(path).await {
    warn!("failed to delete {}: {e}", path.display());
    progress.report(ProgressEvent::warning(format!(
      "Error cleaning up scratch directory: {e}"
    )));
  }
}
