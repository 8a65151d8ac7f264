use std::path::PathBuf;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("IO error: {0}")]
  IO(#[from] std::io::Error),

  #[error("failed to parse extractor output: {0}")]
  Json(#[from] serde_json::Error),

  #[error("{0}")]
  Extraction(String),

  #[error("{0}")]
  Download(String),

  #[error("failed to merge audio and video: {0}")]
  Mux(String),

  #[error("downloaded file not found: {}", .0.display())]
  MissingOutput(PathBuf),

  #[error("invalid progress report: {0}")]
  Progress(String),

  #[error("invalid configuration for {0}: {1}")]
  Config(&'static str, String),

  #[error("file not found or already downloaded")]
  TransferNotFound,

  #[error("transfer store is not running")]
  TransferStore,

  #[error("server error: {0}")]
  Server(String),
}

impl Error {
  /// Text shown to the user when a download job fails.
  ///
  /// Download failures are not distinguished on the page; the detailed
  /// error is only logged.
  pub fn download_message(&self) -> String {
    "Download failed. Please try again.".to_string()
  }

  pub fn info_message(&self) -> String {
    format!("Error fetching video information: {self}")
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::TransferNotFound => StatusCode::NOT_FOUND,
      Error::Extraction(_) | Error::Download(_) | Error::Mux(_) => {
        StatusCode::BAD_GATEWAY
      }
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, self.to_string()).into_response()
  }
}
