use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use crate::{downloader::StreamMode, format::QualityKey, Error, Result};

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
  pub bind_addr: SocketAddr,
  pub scratch_dir: PathBuf,
  pub ytdlp_path: PathBuf,
  pub ffmpeg_path: PathBuf,
  pub ytdlp_proxy: Option<String>,
  /// Download jobs allowed to run at once.
  pub ytdlp_concurrency: usize,
  pub stream_mode: StreamMode,
  pub mux_video_codec: String,
  pub mux_audio_codec: String,
  pub transfer_ttl: Duration,
  pub transfer_capacity: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
      scratch_dir: PathBuf::from("temp_downloads"),
      ytdlp_path: PathBuf::from("yt-dlp"),
      ffmpeg_path: PathBuf::from("ffmpeg"),
      ytdlp_proxy: None,
      ytdlp_concurrency: 1,
      stream_mode: StreamMode::Combined,
      mux_video_codec: "libx264".to_string(),
      mux_audio_codec: "aac".to_string(),
      // expire after 10 minutes
      transfer_ttl: Duration::from_secs(10 * 60),
      transfer_capacity: 8,
    }
  }
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let mut config = Config::default();
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(addr) = var("BIND_ADDR") {
      config.bind_addr = parse("BIND_ADDR", &addr)?;
    }
    if let Some(dir) = var("SCRATCH_DIR") {
      config.scratch_dir = dir.into();
    }
    if let Some(path) = var("YTDLP_PATH") {
      config.ytdlp_path = path.into();
    }
    if let Some(path) = var("FFMPEG_PATH") {
      config.ffmpeg_path = path.into();
    }
    config.ytdlp_proxy = var("YTDLP_PROXY");
    if let Some(n) = var("YTDLP_CONCURRENCY") {
      config.ytdlp_concurrency = parse("YTDLP_CONCURRENCY", &n)?;
      if config.ytdlp_concurrency == 0 {
        return Err(Error::Config("YTDLP_CONCURRENCY", n));
      }
    }
    if let Some(mode) = var("STREAM_MODE") {
      config.stream_mode = parse("STREAM_MODE", &mode)?;
    }
    if let Some(codec) = var("MUX_VIDEO_CODEC") {
      config.mux_video_codec = codec;
    }
    if let Some(codec) = var("MUX_AUDIO_CODEC") {
      config.mux_audio_codec = codec;
    }
    if let Some(secs) = var("TRANSFER_TTL_SECS") {
      config.transfer_ttl =
        Duration::from_secs(parse("TRANSFER_TTL_SECS", &secs)?);
    }
    if let Some(n) = var("TRANSFER_CAPACITY") {
      config.transfer_capacity = parse("TRANSFER_CAPACITY", &n)?;
      // a zero-sized store evicts every transfer on insert
      if config.transfer_capacity == 0 {
        return Err(Error::Config("TRANSFER_CAPACITY", n));
      }
    }

    Ok(config)
  }

  pub fn quality_key(&self) -> QualityKey {
    self.stream_mode.quality_key()
  }
}

impl FromStr for StreamMode {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "combined" => Ok(StreamMode::Combined),
      "separate" => Ok(StreamMode::Separate),
      other => Err(format!("unknown stream mode {other:?}")),
    }
  }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T> {
  value
    .trim()
    .parse()
    .map_err(|_| Error::Config(key, value.to_string()))
}

#[cfg(test)]
mod test {
  use std::collections::HashMap;

  use super::*;

  fn config(vars: &[(&str, &str)]) -> Result<Config> {
    let vars: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    Config::from_lookup(|key| vars.get(key).cloned())
  }

  #[test]
  fn test_defaults() {
    let config = config(&[]).unwrap();
    assert_eq!(config.bind_addr.port(), 8080);
    assert_eq!(config.scratch_dir, PathBuf::from("temp_downloads"));
    assert_eq!(config.ytdlp_concurrency, 1);
    assert_eq!(config.stream_mode, StreamMode::Combined);
    assert_eq!(config.quality_key(), QualityKey::Height);
    assert_eq!(config.ytdlp_proxy, None);
  }

  #[test]
  fn test_overrides() {
    let config = config(&[
      ("BIND_ADDR", "127.0.0.1:3000"),
      ("STREAM_MODE", "Separate"),
      ("YTDLP_PROXY", "socks5://127.0.0.1:1080"),
      ("YTDLP_CONCURRENCY", "2"),
      ("TRANSFER_TTL_SECS", "30"),
      ("MUX_VIDEO_CODEC", "copy"),
    ])
    .unwrap();

    assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
    assert_eq!(config.stream_mode, StreamMode::Separate);
    assert_eq!(config.quality_key(), QualityKey::Label);
    assert_eq!(config.ytdlp_proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
    assert_eq!(config.ytdlp_concurrency, 2);
    assert_eq!(config.transfer_ttl, Duration::from_secs(30));
    assert_eq!(config.mux_video_codec, "copy");
  }

  #[test]
  fn test_invalid_values() {
    assert!(matches!(
      config(&[("YTDLP_CONCURRENCY", "many")]),
      Err(Error::Config("YTDLP_CONCURRENCY", _))
    ));
    assert!(matches!(
      config(&[("YTDLP_CONCURRENCY", "0")]),
      Err(Error::Config("YTDLP_CONCURRENCY", _))
    ));
    assert!(matches!(
      config(&[("TRANSFER_CAPACITY", "0")]),
      Err(Error::Config("TRANSFER_CAPACITY", _))
    ));
    assert!(matches!(
      config(&[("STREAM_MODE", "both")]),
      Err(Error::Config("STREAM_MODE", _))
    ));
  }

  #[test]
  fn test_blank_values_are_ignored() {
    let config = config(&[("YTDLP_PROXY", ""), ("SCRATCH_DIR", " ")]).unwrap();
    assert_eq!(config.ytdlp_proxy, None);
    assert_eq!(config.scratch_dir, PathBuf::from("temp_downloads"));
  }
}
