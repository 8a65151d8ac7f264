use std::convert::Infallible;

use axum::{
  extract::{Path, Query, State},
  http::header,
  response::{
    sse::{Event, KeepAlive, Sse},
    IntoResponse,
  },
};
use futures::Stream;
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

use crate::{
  downloader::DownloadJob,
  progress::{ProgressEvent, ProgressReporter},
  util::attachment_disposition,
  AppState, Error, Result,
};

/// Everything the page hears about one download job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
  Progress(ProgressEvent),
  Ready { token: String, file_name: String },
  Failed { message: String },
}

impl JobEvent {
  fn name(&self) -> &'static str {
    match self {
      JobEvent::Progress(_) => "progress",
      JobEvent::Ready { .. } => "ready",
      JobEvent::Failed { .. } => "failed",
    }
  }

  fn payload(&self) -> serde_json::Value {
    match self {
      JobEvent::Progress(event) => {
        let mut payload = json!(event);
        payload["text"] = json!(event.status_text());
        payload
      }
      JobEvent::Ready { token, file_name } => {
        json!({ "token": token, "file_name": file_name })
      }
      JobEvent::Failed { message } => json!({ "message": message }),
    }
  }

  fn into_sse(self) -> Event {
    Event::default()
      .event(self.name())
      .data(self.payload().to_string())
  }
}

impl ProgressReporter for UnboundedSender<JobEvent> {
  fn report(&self, event: ProgressEvent) {
    // the page going away only means nobody is watching anymore
    self.send(JobEvent::Progress(event)).ok();
  }
}

/// Starts a download and streams its progress as server-sent events.
///
/// The stream ends with exactly one `ready` or `failed` event.
pub async fn start_download(
  State(state): State<AppState>,
  Query(job): Query<DownloadJob>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
  let (tx, rx) = mpsc::unbounded_channel();
  tokio::spawn(run_job(state, job, tx));

  let stream = futures::stream::unfold(rx, |mut rx| async move {
    let event = rx.recv().await?;
    Some((Ok(event.into_sse()), rx))
  });

  Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn run_job(
  state: AppState,
  job: DownloadJob,
  tx: UnboundedSender<JobEvent>,
) {
  let event = match download(&state, &job, &tx).await {
    Ok(event) => event,
    Err(e) => {
      warn!("download of {} failed: {e}", job.url);
      JobEvent::Failed {
        message: e.download_message(),
      }
    }
  };

  tx.send(event).ok();
}

async fn download(
  state: &AppState,
  job: &DownloadJob,
  tx: &UnboundedSender<JobEvent>,
) -> Result<JobEvent> {
  // one job per permit; later jobs wait here
  let _permit = state
    .jobs
    .acquire()
    .await
    .map_err(|_| Error::Download("download queue is closed".to_string()))?;

  let transfer = state.downloader.download(job, tx).await?;
  let file_name = transfer.file_name.clone();
  info!("{} ready as {file_name} ({} bytes)", job.url, transfer.data.len());

  let token = state.transfers.insert(transfer).await?;
  Ok(JobEvent::Ready { token, file_name })
}

/// Hands out a finished file once.
pub async fn get_file(
  State(state): State<AppState>,
  Path(token): Path<String>,
) -> Result<impl IntoResponse> {
  let transfer = state.transfers.take(&token).await?;

  let headers = [
    (header::CONTENT_TYPE, transfer.mime_type.to_string()),
    (
      header::CONTENT_DISPOSITION,
      attachment_disposition(&transfer.file_name),
    ),
  ];

  Ok((headers, transfer.data))
}
