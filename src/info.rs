use axum::{
  extract::{Query, State},
  http::StatusCode,
  Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  extractor::Extractor,
  format::{quality_options, QualityOption, RawFormat},
  util::{format_duration, group_thousands},
  AppState, Result,
};

/// The metadata document printed by `yt-dlp -J`, reduced to what the page
/// shows. Every field may be missing or null.
#[derive(Debug, Default, Deserialize)]
pub struct RawInfo {
  pub title: Option<String>,
  pub thumbnail: Option<String>,
  pub duration: Option<f64>,
  pub view_count: Option<u64>,
  pub like_count: Option<u64>,
  pub channel: Option<String>,
  pub upload_date: Option<String>,
  pub description: Option<String>,
  pub formats: Option<Vec<RawFormat>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoInfo {
  pub title: String,
  pub thumbnail: Option<String>,
  pub duration: String,
  pub view_count: u64,
  pub like_count: u64,
  pub channel: String,
  pub upload_date: String,
  pub description: String,
  #[serde(skip)]
  pub formats: Vec<RawFormat>,
}

impl From<RawInfo> for VideoInfo {
  fn from(raw: RawInfo) -> Self {
    // fractional seconds are dropped
    let duration = raw.duration.filter(|d| *d > 0.0).unwrap_or(0.0) as u64;

    Self {
      title: raw.title.unwrap_or_else(|| "Unknown Title".to_string()),
      thumbnail: raw.thumbnail,
      duration: format_duration(duration),
      view_count: raw.view_count.unwrap_or(0),
      like_count: raw.like_count.unwrap_or(0),
      channel: raw.channel.unwrap_or_else(|| "Unknown Channel".to_string()),
      upload_date: raw
        .upload_date
        .unwrap_or_else(|| "Unknown Date".to_string()),
      description: raw
        .description
        .unwrap_or_else(|| "No description available".to_string()),
      formats: raw.formats.unwrap_or_default(),
    }
  }
}

impl VideoInfo {
  pub fn views_display(&self) -> String {
    group_thousands(self.view_count)
  }

  /// Zero likes usually means the count is hidden, so nothing is shown.
  pub fn likes_display(&self) -> Option<String> {
    (self.like_count > 0).then(|| group_thousands(self.like_count))
  }
}

pub async fn fetch_video_info(
  extractor: &dyn Extractor,
  url: &str,
) -> Result<VideoInfo> {
  let raw = extractor.fetch_info(url).await?;
  Ok(raw.into())
}

#[derive(Deserialize)]
pub struct InfoReq {
  url: String,
}

#[derive(Serialize)]
pub struct InfoResp {
  #[serde(flatten)]
  info: VideoInfo,
  views_display: String,
  likes_display: Option<String>,
  options: Vec<QualityOption>,
}

pub async fn get_info(
  State(state): State<AppState>,
  Query(req): Query<InfoReq>,
) -> Result<Json<InfoResp>, (StatusCode, String)> {
  let info = match fetch_video_info(&*state.extractor, &req.url).await {
    Ok(info) => info,
    Err(e) => {
      warn!("failed to fetch info for {}: {e}", req.url);
      return Err((StatusCode::BAD_GATEWAY, e.info_message()));
    }
  };

  let options = quality_options(&info.formats, state.config.quality_key());
  info!(
    "{}: {} formats, {} quality options",
    req.url,
    info.formats.len(),
    options.len()
  );

  Ok(Json(InfoResp {
    views_display: info.views_display(),
    likes_display: info.likes_display(),
    options,
    info,
  }))
}
