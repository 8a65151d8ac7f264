use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// A progress update emitted while a download job runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
  Downloading { percent: f64 },
  Finished,
  Warning { message: String },
}

impl ProgressEvent {
  pub fn warning(message: impl Into<String>) -> Self {
    ProgressEvent::Warning {
      message: message.into(),
    }
  }

  pub fn status_text(&self) -> String {
    match self {
      ProgressEvent::Downloading { percent } => {
        format!("Downloading: {percent:.1}%")
      }
      ProgressEvent::Finished => {
        "Download completed! Processing video...".to_string()
      }
      ProgressEvent::Warning { message } => message.clone(),
    }
  }
}

/// Receives progress from a running download.
///
/// Called from the extractor's output loop, possibly many times per
/// second. Implementations must not block.
pub trait ProgressReporter: Send + Sync {
  fn report(&self, event: ProgressEvent);
}

/// The progress dictionary yt-dlp renders through `%(progress)j`.
#[derive(Debug, Default, Deserialize)]
pub struct RawProgress {
  pub status: String,
  #[serde(rename = "_percent_str")]
  pub percent_str: Option<String>,
  pub percentage: Option<Value>,
  pub downloaded_bytes: Option<f64>,
  pub total_bytes: Option<f64>,
  pub total_bytes_estimate: Option<f64>,
}

impl RawProgress {
  /// `Ok(None)` for statuses that carry nothing to show.
  pub fn to_event(&self) -> Result<Option<ProgressEvent>> {
    match self.status.as_str() {
      "downloading" => {
        let percent = self.percent()?;
        Ok(Some(ProgressEvent::Downloading { percent }))
      }
      "finished" => Ok(Some(ProgressEvent::Finished)),
      _ => Ok(None),
    }
  }

  fn percent(&self) -> Result<f64> {
    if let Some(percent_str) = &self.percent_str {
      return parse_percent(percent_str);
    }

    if let Some(percentage) = &self.percentage {
      return match percentage {
        Value::Number(n) => n
          .as_f64()
          .ok_or_else(|| Error::Progress(format!("bad percentage {n}"))),
        Value::String(s) => parse_percent(s),
        other => Err(Error::Progress(format!("bad percentage {other}"))),
      };
    }

    let downloaded = self.downloaded_bytes.unwrap_or(0.0);
    let total = self
      .total_bytes
      .filter(|t| *t != 0.0)
      .or(self.total_bytes_estimate)
      .unwrap_or(0.0);

    if total == 0.0 {
      return Ok(0.0);
    }

    Ok(downloaded / total * 100.0)
  }
}

static ANSI_ESCAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").unwrap()
});

pub fn strip_ansi_codes(text: &str) -> String {
  ANSI_ESCAPE_REGEX.replace_all(text, "").into_owned()
}

/// Parses strings such as `" 45.0%"`, possibly wrapped in color codes.
pub fn parse_percent(text: &str) -> Result<f64> {
  let stripped = strip_ansi_codes(text);
  let number = stripped.trim().replace('%', "");
  number
    .trim()
    .parse::<f64>()
    .map_err(|_| Error::Progress(format!("unparsable percentage {text:?}")))
}

/// Parses one progress dictionary and forwards the result.
///
/// A malformed report becomes a warning; the download keeps going and
/// the last shown percentage stays in place.
pub fn report_raw(json: &str, reporter: &dyn ProgressReporter) {
  let parsed = serde_json::from_str::<RawProgress>(json)
    .map_err(Error::from)
    .and_then(|raw| raw.to_event());

  match parsed {
    Ok(Some(event)) => reporter.report(event),
    Ok(None) => {}
    Err(e) => {
      tracing::debug!("bad progress line {json:?}: {e}");
      reporter.report(ProgressEvent::warning(format!(
        "Progress update error: {e}"
      )));
    }
  }
}

#[cfg(test)]
pub mod test {
  use std::sync::Mutex;

  use super::*;

  /// Keeps every reported event for inspection.
  #[derive(Default)]
  pub struct Recorder(pub Mutex<Vec<ProgressEvent>>);

  impl ProgressReporter for Recorder {
    fn report(&self, event: ProgressEvent) {
      self.0.lock().unwrap().push(event);
    }
  }

  impl Recorder {
    pub fn events(&self) -> Vec<ProgressEvent> {
      self.0.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
      self
        .events()
        .into_iter()
        .filter_map(|e| match e {
          ProgressEvent::Warning { message } => Some(message),
          _ => None,
        })
        .collect()
    }
  }

  fn event(json: &str) -> Result<Option<ProgressEvent>> {
    serde_json::from_str::<RawProgress>(json).unwrap().to_event()
  }

  #[test]
  fn test_zero_total_yields_zero() {
    let e = event(
      r#"{"status": "downloading", "downloaded_bytes": 50, "total_bytes": 0}"#,
    );
    assert_eq!(e.unwrap(), Some(ProgressEvent::Downloading { percent: 0.0 }));

    let e = event(r#"{"status": "downloading", "downloaded_bytes": 50}"#);
    assert_eq!(e.unwrap(), Some(ProgressEvent::Downloading { percent: 0.0 }));

    let e = event(
      r#"{"status": "downloading", "downloaded_bytes": 50,
          "total_bytes": null, "total_bytes_estimate": null}"#,
    );
    assert_eq!(e.unwrap(), Some(ProgressEvent::Downloading { percent: 0.0 }));
  }

  #[test]
  fn test_byte_counters() {
    let e = event(
      r#"{"status": "downloading", "downloaded_bytes": 25, "total_bytes": 200}"#,
    );
    assert_eq!(
      e.unwrap(),
      Some(ProgressEvent::Downloading { percent: 12.5 })
    );

    // a zero total falls through to the estimate
    let e = event(
      r#"{"status": "downloading", "downloaded_bytes": 50,
          "total_bytes": 0, "total_bytes_estimate": 100}"#,
    );
    assert_eq!(
      e.unwrap(),
      Some(ProgressEvent::Downloading { percent: 50.0 })
    );
  }

  #[test]
  fn test_percent_string_with_color_codes() {
    let json = serde_json::json!({
      "status": "downloading",
      "_percent_str": "\u{1b}[0;94m 45.0%\u{1b}[0m",
      "downloaded_bytes": 1,
      "total_bytes": 1000,
    })
    .to_string();

    let e = event(&json).unwrap();
    assert_eq!(e, Some(ProgressEvent::Downloading { percent: 45.0 }));
  }

  #[test]
  fn test_percentage_field() {
    let e = event(r#"{"status": "downloading", "percentage": 33.5}"#);
    assert_eq!(
      e.unwrap(),
      Some(ProgressEvent::Downloading { percent: 33.5 })
    );

    let e = event(r#"{"status": "downloading", "percentage": "12"}"#);
    assert_eq!(
      e.unwrap(),
      Some(ProgressEvent::Downloading { percent: 12.0 })
    );
  }

  #[test]
  fn test_other_statuses() {
    assert_eq!(
      event(r#"{"status": "finished"}"#).unwrap(),
      Some(ProgressEvent::Finished)
    );
    assert_eq!(event(r#"{"status": "error"}"#).unwrap(), None);
  }

  #[test]
  fn test_malformed_report_becomes_warning() {
    let recorder = Recorder::default();

    report_raw(
      r#"{"status": "downloading", "_percent_str": "N/A"}"#,
      &recorder,
    );
    report_raw("not json", &recorder);
    report_raw(
      r#"{"status": "downloading", "_percent_str": "10.0%"}"#,
      &recorder,
    );

    let events = recorder.events();
    assert_eq!(events.len(), 3);
    assert_eq!(recorder.warnings().len(), 2);
    assert!(recorder.warnings()[0].starts_with("Progress update error"));
    assert_eq!(events[2], ProgressEvent::Downloading { percent: 10.0 });
  }

  #[test]
  fn test_status_text() {
    assert_eq!(
      ProgressEvent::Downloading { percent: 45.0 }.status_text(),
      "Downloading: 45.0%"
    );
    assert_eq!(
      ProgressEvent::Finished.status_text(),
      "Download completed! Processing video..."
    );
  }

  #[test]
  fn test_strip_ansi_codes() {
    assert_eq!(strip_ansi_codes("\x1b[0;32mok\x1b[0m"), "ok");
    assert_eq!(strip_ansi_codes("plain"), "plain");
  }
}
