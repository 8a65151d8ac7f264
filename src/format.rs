//! Turns the raw format list reported by yt-dlp into the quality options
//! offered on the page.
//!
//! A source usually offers many encodings of the same resolution. Only
//! the largest encoding per key is kept, and every option is paired with
//! the single best audio-only stream so the downloader can request
//! `video+audio`.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

const NONE_CODEC: &str = "none";
const DEFAULT_EXT: &str = "mp4";

/// One encoding variant as reported by the extractor.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFormat {
  #[serde(default)]
  pub format_id: String,
  pub height: Option<u32>,
  pub vcodec: Option<String>,
  pub acodec: Option<String>,
  pub ext: Option<String>,
  pub filesize: Option<u64>,
}

impl RawFormat {
  /// Carries audio and no usable video stream.
  pub fn is_audio_only(&self) -> bool {
    let has_audio = matches!(&self.acodec, Some(a) if a != NONE_CODEC);
    let no_video = match &self.vcodec {
      None => true,
      Some(v) => v == NONE_CODEC,
    };
    has_audio && no_video
  }

  /// Carries a usable video stream with a known height.
  pub fn is_video_bearing(&self) -> bool {
    let has_height = matches!(self.height, Some(h) if h > 0);
    let has_video =
      matches!(&self.vcodec, Some(v) if !v.is_empty() && v != NONE_CODEC);
    has_height && has_video
  }

  // missing sizes compete as zero
  fn size(&self) -> u64 {
    self.filesize.unwrap_or(0)
  }

  fn ext(&self) -> &str {
    self.ext.as_deref().unwrap_or(DEFAULT_EXT)
  }
}

/// How video-bearing formats are grouped before picking one per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityKey {
  /// One option per height.
  Height,
  /// One option per rendered label, i.e. per (height, extension).
  Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityOption {
  pub height: u32,
  pub format_id: String,
  pub label: String,
  pub video_ext: String,
  pub audio_format_id: Option<String>,
}

/// The audio-only format with the largest file size. Ties keep the first.
pub fn best_audio(formats: &[RawFormat]) -> Option<&RawFormat> {
  let mut best: Option<&RawFormat> = None;
  for format in formats.iter().filter(|f| f.is_audio_only()) {
    match best {
      Some(b) if format.size() <= b.size() => {}
      _ => best = Some(format),
    }
  }
  best
}

/// Deduplicated quality options, highest resolution first.
///
/// An empty result means the source has no compatible video formats;
/// it is not an error.
pub fn quality_options(
  formats: &[RawFormat],
  key: QualityKey,
) -> Vec<QualityOption> {
  let audio_format_id = best_audio(formats).map(|f| f.format_id.clone());

  let mut retained: HashMap<(u32, &str), &RawFormat> = HashMap::new();
  for format in formats.iter().filter(|f| f.is_video_bearing()) {
    let height = format.height.unwrap_or_default();
    let group = match key {
      QualityKey::Height => (height, ""),
      QualityKey::Label => (height, format.ext()),
    };

    match retained.get(&group) {
      Some(kept) if format.size() <= kept.size() => {}
      _ => {
        retained.insert(group, format);
      }
    }
  }

  retained
    .into_iter()
    .sorted_by(|((ha, ea), _), ((hb, eb), _)| hb.cmp(ha).then(ea.cmp(eb)))
    .map(|((height, _), format)| QualityOption {
      height,
      format_id: format.format_id.clone(),
      label: format!("{height}p ({})", format.ext()),
      video_ext: format.ext().to_string(),
      audio_format_id: audio_format_id.clone(),
    })
    .collect()
}
