mod ytdlp;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{info::RawInfo, progress::ProgressReporter, Result};

pub use ytdlp::Ytdlp;

/// What to fetch and where to put it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
  pub url: String,
  /// A yt-dlp format expression, e.g. `137+140/best`.
  pub format: String,
  /// A yt-dlp output template, e.g. `dir/%(title)s.%(ext)s`.
  pub output_template: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Downloaded {
  pub path: PathBuf,
  pub title: String,
}

#[async_trait]
pub trait Extractor: Send + Sync {
  /// Describes the source without downloading any media.
  async fn fetch_info(&self, url: &str) -> Result<RawInfo>;

  async fn download(
    &self,
    request: &FetchRequest,
    progress: &dyn ProgressReporter,
  ) -> Result<Downloaded>;
}
