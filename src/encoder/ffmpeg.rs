//! FFmpeg subprocess wrapper for audio transcoding.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::profile::{AudioProfile, BROWSER_PROFILE};
use super::progress::{parse_progress_line, EncodeProgress};
use super::AudioEncoder;
use crate::config::model::EncoderConfig;
use crate::error::EncoderError;
use crate::media::probe;

/// Number of trailing stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Transcodes audio with the ffmpeg CLI and probes with ffprobe.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
    profile: AudioProfile,
}

impl FfmpegEncoder {
    /// Creates an encoder targeting the browser profile.
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            profile: BROWSER_PROFILE,
        }
    }

    /// Builds the full ffmpeg argument list.
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ];
        args.extend(self.profile.output_args());
        args.push("-progress".to_string());
        args.push("pipe:1".to_string());
        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    async fn probe_duration(&self, input: &Path) -> Result<f64, EncoderError> {
        probe::probe_duration(&self.ffprobe, input).await
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        progress_tx: mpsc::Sender<EncodeProgress>,
    ) -> Result<(), EncoderError> {
        let args = self.build_args(input, output);
        debug!(ffmpeg = %self.ffmpeg.display(), args = ?args, "Running FFmpeg");

        info!(
            input = %input.display(),
            output = %output.display(),
            codec = self.profile.codec,
            bitrate = self.profile.bitrate,
            "Starting transcode"
        );

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EncoderError::SpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EncoderError::SpawnFailed("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EncoderError::SpawnFailed("stderr not captured".to_string()))?;

        let stderr_handle = tokio::spawn(collect_tail(stderr, STDERR_TAIL_LINES));

        // The process is never held up by a slow consumer: when the channel
        // is full only the newest event is kept and delivered later.
        let mut pending: Option<EncodeProgress> = None;

        let run = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut current = EncodeProgress::default();

            while let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| EncoderError::SpawnFailed(e.to_string()))?
            {
                if let Some(progress) = parse_progress_line(&line, &mut current) {
                    pending = Some(progress);
                }
                if let Some(progress) = pending.take() {
                    pending = offer(&progress_tx, progress);
                }
            }

            child
                .wait()
                .await
                .map_err(|e| EncoderError::SpawnFailed(e.to_string()))
        };

        let outcome = tokio::time::timeout(self.timeout, run).await;
        let status = match outcome {
            Ok(result) => result?,
            Err(_) => {
                let seconds = self.timeout.as_secs();
                warn!(seconds, "FFmpeg timed out, killing process");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill FFmpeg");
                }
                return Err(EncoderError::Timeout { seconds });
            }
        };

        let stderr_tail = stderr_handle.await.unwrap_or_default();

        if !status.success() {
            return Err(EncoderError::TranscodeFailed {
                code: status.code().unwrap_or(-1),
                stderr: if stderr_tail.is_empty() {
                    "Encoding failed".to_string()
                } else {
                    stderr_tail
                },
            });
        }

        if let Some(progress) = pending {
            if progress_tx.send(progress).await.is_err() {
                debug!("Progress receiver dropped");
            }
        }

        info!(output = %output.display(), "Transcode completed");
        Ok(())
    }
}

/// Sends without waiting. Returns the event back if the channel is full.
fn offer(tx: &mpsc::Sender<EncodeProgress>, progress: EncodeProgress) -> Option<EncodeProgress> {
    match tx.try_send(progress) {
        Ok(()) => None,
        Err(TrySendError::Full(progress)) => Some(progress),
        Err(TrySendError::Closed(_)) => None,
    }
}

/// Reads a stream to the end and keeps its last `max_lines` lines.
async fn collect_tail<R>(reader: R, max_lines: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut tail = VecDeque::with_capacity(max_lines);

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == max_lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> FfmpegEncoder {
        FfmpegEncoder::new(&EncoderConfig::default())
    }

    #[test]
    fn test_args_place_input_profile_progress_output_in_order() {
        let args = encoder().build_args(
            Path::new("/tmp/abc_source.wav"),
            Path::new("/tmp/abc_browser.m4a"),
        );

        let input_pos = args.iter().position(|a| a == "/tmp/abc_source.wav").unwrap();
        let codec_pos = args.iter().position(|a| a == "-c:a").unwrap();
        let progress_pos = args.iter().position(|a| a == "-progress").unwrap();

        assert_eq!(args[input_pos - 1], "-i");
        assert!(input_pos < codec_pos);
        assert!(codec_pos < progress_pos);
        assert_eq!(args[progress_pos + 1], "pipe:1");
        assert_eq!(args.last().unwrap(), "/tmp/abc_browser.m4a");
        assert!(args.contains(&"-y".to_string()));
    }

    #[tokio::test]
    async fn test_collect_tail_keeps_last_lines() {
        let data: &[u8] = b"one\n\ntwo\nthree\nfour\n";
        let tail = collect_tail(data, 2).await;
        assert_eq!(tail, "three\nfour");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let config = EncoderConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ..EncoderConfig::default()
        };
        let (tx, _rx) = mpsc::channel(4);

        let err = FfmpegEncoder::new(&config)
            .transcode(Path::new("in.wav"), Path::new("out.m4a"), tx)
            .await
            .unwrap_err();

        assert!(matches!(err, EncoderError::SpawnFailed(_)));
    }

    /// Writes an executable shell script standing in for ffmpeg.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_progress_consumer_does_not_stall_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"i=1
while [ $i -le 100 ]; do
  echo "out_time_us=$((i * 100000))"
  echo "progress=continue"
  i=$((i + 1))
done
echo "progress=end"
exit 0
"#;
        let config = EncoderConfig {
            ffmpeg_path: fake_ffmpeg(dir.path(), script),
            timeout_seconds: 2,
            ..EncoderConfig::default()
        };
        let (tx, mut rx) = mpsc::channel(4);

        let consume = async {
            let mut received = Vec::new();
            while let Some(progress) = rx.recv().await {
                tokio::time::sleep(Duration::from_millis(100)).await;
                received.push(progress);
            }
            received
        };
        let encoder = FfmpegEncoder::new(&config);
        let out_path = dir.path().join("out.m4a");
        let encode = encoder.transcode(Path::new("in.wav"), &out_path, tx);

        let (result, received) = tokio::join!(encode, consume);

        assert!(result.is_ok(), "transcode failed: {:?}", result);
        assert!(received.len() < 101);
        let last = received.last().unwrap();
        assert!(last.is_complete);
        assert!((last.elapsed_seconds - 10.0).abs() < 1e-9);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let config = EncoderConfig {
            ffmpeg_path: fake_ffmpeg(dir.path(), "echo 'Invalid data found' >&2\nexit 1\n"),
            ..EncoderConfig::default()
        };
        let (tx, _rx) = mpsc::channel(4);

        let err = FfmpegEncoder::new(&config)
            .transcode(Path::new("in.wav"), Path::new("out.m4a"), tx)
            .await
            .unwrap_err();

        match err {
            EncoderError::TranscodeFailed { code, stderr } => {
                assert_eq!(code, 1);
                assert_eq!(stderr, "Invalid data found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
