use std::{
  path::{Path, PathBuf},
  process::Stdio,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::{Error, Result};

/// Merges a video-only and an audio-only file into one container.
///
/// After a failure the destination may exist in any state and must not
/// be served.
#[async_trait]
pub trait Muxer: Send + Sync {
  async fn mux(&self, video: &Path, audio: &Path, dest: &Path) -> Result<()>;
}

// run ffmpeg command line to re-encode into widely playable codecs.
// requires ffmpeg executable to be in PATH or configured explicitly.
pub struct Ffmpeg {
  program: PathBuf,
  video_codec: String,
  audio_codec: String,
}

impl Ffmpeg {
  pub fn new(
    program: impl AsRef<Path>,
    video_codec: impl Into<String>,
    audio_codec: impl Into<String>,
  ) -> Self {
    Self {
      program: program.as_ref().to_owned(),
      video_codec: video_codec.into(),
      audio_codec: audio_codec.into(),
    }
  }

  fn command(&self, video: &Path, audio: &Path, dest: &Path) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd
      .arg("-hide_banner")
      .arg("-loglevel")
      .arg("error")
      .arg("-y")
      .arg("-i")
      .arg(video)
      .arg("-i")
      .arg(audio)
      .arg("-map")
      .arg("0:v:0")
      .arg("-map")
      .arg("1:a:0")
      .arg("-c:v")
      .arg(&self.video_codec)
      .arg("-c:a")
      .arg(&self.audio_codec)
      .arg(dest)
      .stdin(Stdio::null())
      .kill_on_drop(true);
    cmd
  }
}

#[async_trait]
impl Muxer for Ffmpeg {
  async fn mux(&self, video: &Path, audio: &Path, dest: &Path) -> Result<()> {
    info!("merging {} and {}", video.display(), audio.display());

    let output = self
      .command(video, audio, dest)
      .output()
      .await
      .map_err(|e| Error::Mux(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let message = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| format!("ffmpeg exited with {}", output.status));
      return Err(Error::Mux(message));
    }

    Ok(())
  }
}
