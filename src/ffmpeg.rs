//! ffmpeg encoding logic
use crate::process::{CommandExt, LineBuffer};
use anyhow::Context;
use std::{future::Future, io, path::Path, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStderr, ChildStdin, Command},
};
use tracing::{debug, warn};

/// How long ffmpeg gets to finish up after being asked to quit.
const QUIT_GRACE: Duration = Duration::from_secs(5);

/// Hardware encode settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegEncodeArgs {
    pub program: String,
    /// Hardware decode backend, `-hwaccel`.
    pub hwaccel: String,
    /// Hardware video encoder, `-c:v`.
    pub vcodec: String,
    /// Constant quantizer, lower is higher quality & larger output.
    pub qp: u8,
    /// Encoder speed/efficiency preset.
    pub preset: String,
}

impl Default for FfmpegEncodeArgs {
    fn default() -> Self {
        Self {
            program: "ffmpeg".into(),
            hwaccel: "cuda".into(),
            vcodec: "h264_nvenc".into(),
            qp: 18,
            preset: "slow".into(),
        }
    }
}

impl FfmpegEncodeArgs {
    /// Full encode command, audio passed through & output overwritten.
    pub fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-hide_banner")
            .arg("-stats")
            .arg2("-hwaccel", &self.hwaccel)
            .arg2("-i", input)
            .arg2("-c:v", &self.vcodec)
            .arg2("-rc", "constqp")
            .arg2("-qp", self.qp)
            .arg2("-preset", &self.preset)
            .arg2("-c:a", "copy")
            .arg("-y")
            .arg(output);
        cmd
    }
}

/// Starts encodes.
pub trait Encoder {
    type Job: EncodeJob;

    /// Short name for messages, e.g. the video codec.
    fn name(&self) -> &str;

    fn start(&self, input: &Path, output: &Path) -> anyhow::Result<Self::Job>;
}

/// A running encode.
pub trait EncodeJob {
    /// Next diagnostic line, `None` once the stream is closed.
    fn next_line(&mut self) -> impl Future<Output = io::Result<Option<String>>>;

    /// Waits for exit. `None` if the process was ended by a signal.
    fn wait(&mut self) -> impl Future<Output = io::Result<Option<i32>>>;

    /// Asks the process to stop & waits for it to do so.
    fn terminate(&mut self) -> impl Future<Output = ()>;
}

impl Encoder for FfmpegEncodeArgs {
    type Job = FfmpegJob;

    fn name(&self) -> &str {
        &self.vcodec
    }

    fn start(&self, input: &Path, output: &Path) -> anyhow::Result<FfmpegJob> {
        let mut cmd = self.command(input, output);
        cmd.kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        debug!(cmd = %cmd.to_cmd_str(), "starting encode");

        let mut child = cmd.spawn().context("ffmpeg encode")?;
        Ok(FfmpegJob {
            stdin: child.stdin.take(),
            stderr: child.stderr.take(),
            child,
            lines: LineBuffer::default(),
            quit_grace: QUIT_GRACE,
        })
    }
}

/// A spawned ffmpeg process, read via stderr.
#[derive(Debug)]
pub struct FfmpegJob {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<ChildStderr>,
    lines: LineBuffer,
    quit_grace: Duration,
}

impl EncodeJob for FfmpegJob {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(line) = self.lines.next_line() {
                return Ok(Some(line));
            }
            let Some(stderr) = self.stderr.as_mut() else {
                return Ok(None);
            };
            match stderr.read(&mut chunk).await? {
                0 => {
                    self.stderr = None;
                    return Ok(self.lines.take_rest());
                }
                n => self.lines.push(&chunk[..n]),
            }
        }
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        // close stdin so ffmpeg never waits on it
        self.stdin = None;
        let status = self.child.wait().await?;
        debug!(%status, "ffmpeg exited");
        Ok(status.code())
    }

    async fn terminate(&mut self) {
        // ffmpeg treats `q` on stdin as a request to stop & finalize output
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(err) = stdin.write_all(b"q").await {
                debug!(%err, "could not ask ffmpeg to quit");
            }
        }
        match tokio::time::timeout(self.quit_grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "ffmpeg stopped"),
            Ok(Err(err)) => warn!(%err, "waiting for ffmpeg"),
            Err(_) => {
                warn!("ffmpeg did not stop within {:?}, killing", self.quit_grace);
                if let Err(err) = self.child.kill().await {
                    warn!(%err, "killing ffmpeg");
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{ffi::OsStr, path::PathBuf, time::Instant};

    fn args_of(cmd: &Command) -> Vec<&OsStr> {
        cmd.as_std().get_args().collect()
    }

    /// Writes an executable `sh` script standing in for ffmpeg.
    #[cfg(unix)]
    pub(crate) fn fake_ffmpeg(name: &str, body: &str) -> FfmpegEncodeArgs {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("nvconvert-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let script: PathBuf = dir.join(name);
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        FfmpegEncodeArgs {
            program: script.to_string_lossy().into_owned(),
            ..<_>::default()
        }
    }

    #[cfg(unix)]
    async fn all_lines(job: &mut FfmpegJob) -> Vec<String> {
        let mut lines = vec![];
        while let Some(line) = job.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn default_command() {
        let cmd = FfmpegEncodeArgs::default().command(Path::new("in.mkv"), Path::new("out.mp4"));
        assert_eq!(cmd.as_std().get_program(), "ffmpeg");
        assert_eq!(
            args_of(&cmd),
            [
                "-hide_banner", "-stats", "-hwaccel", "cuda", "-i", "in.mkv", "-c:v", "h264_nvenc",
                "-rc", "constqp", "-qp", "18", "-preset", "slow", "-c:a", "copy", "-y", "out.mp4",
            ]
        );
    }

    #[test]
    fn custom_command() {
        let args = FfmpegEncodeArgs {
            vcodec: "hevc_nvenc".into(),
            qp: 23,
            preset: "p7".into(),
            ..<_>::default()
        };
        let cmd = args.command(Path::new("a b.mkv"), Path::new("out.mkv"));
        assert_eq!(
            args_of(&cmd),
            [
                "-hide_banner", "-stats", "-hwaccel", "cuda", "-i", "a b.mkv", "-c:v", "hevc_nvenc",
                "-rc", "constqp", "-qp", "23", "-preset", "p7", "-c:a", "copy", "-y", "out.mkv",
            ]
        );
        assert!(cmd.to_cmd_str().contains("-i 'a b.mkv'"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stats_lines_from_stderr() {
        let ffmpeg = fake_ffmpeg(
            "stats.sh",
            r"printf 'Press [q] to stop\n' >&2
printf 'frame=  720 time=00:00:30.00 bitrate=1.0kbits/s\r' >&2
printf 'frame= 1440 time=00:01:00.00 bitrate=1.0kbits/s\r' >&2
printf 'video:1kB' >&2
echo 'to stdout'
exit 0",
        );
        let mut job = ffmpeg.start(Path::new("in.mkv"), Path::new("out.mp4")).unwrap();
        assert_eq!(
            all_lines(&mut job).await,
            [
                "Press [q] to stop",
                "frame=  720 time=00:00:30.00 bitrate=1.0kbits/s",
                "frame= 1440 time=00:01:00.00 bitrate=1.0kbits/s",
                "video:1kB",
            ]
        );
        assert_eq!(job.wait().await.unwrap(), Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit() {
        let ffmpeg = fake_ffmpeg("fail.sh", "echo 'Error opening input' >&2\nexit 2");
        let mut job = ffmpeg.start(Path::new("in.mkv"), Path::new("out.mp4")).unwrap();
        assert_eq!(all_lines(&mut job).await, ["Error opening input"]);
        assert_eq!(job.wait().await.unwrap(), Some(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wait_closes_stdin() {
        // exits only once stdin reaches eof
        let ffmpeg = fake_ffmpeg("stdin.sh", "cat >/dev/null\nexit 3");
        let mut job = ffmpeg.start(Path::new("in.mkv"), Path::new("out.mp4")).unwrap();
        let code = tokio::time::timeout(Duration::from_secs(5), job.wait()).await;
        assert_eq!(code.unwrap().unwrap(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_sends_quit() {
        let ffmpeg = fake_ffmpeg(
            "quit.sh",
            "read -r key\n[ \"$key\" = q ] && exit 0\nexit 7",
        );
        let mut job = ffmpeg.start(Path::new("in.mkv"), Path::new("out.mp4")).unwrap();
        job.quit_grace = Duration::from_secs(5);

        let started = Instant::now();
        job.terminate().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        let status = job.child.try_wait().unwrap().expect("exited");
        assert_eq!(status.code(), Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_kills_after_grace() {
        let ffmpeg = fake_ffmpeg("stubborn.sh", "trap '' INT TERM\nwhile :; do sleep 1; done");
        let mut job = ffmpeg.start(Path::new("in.mkv"), Path::new("out.mp4")).unwrap();
        job.quit_grace = Duration::from_millis(200);

        let started = Instant::now();
        job.terminate().await;
        assert!(started.elapsed() >= Duration::from_millis(200));
        let status = job.child.try_wait().unwrap().expect("killed");
        assert_eq!(status.code(), None);
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let ffmpeg = FfmpegEncodeArgs {
            program: "ffmpeg-that-does-not-exist".into(),
            ..<_>::default()
        };
        let err = ffmpeg
            .start(Path::new("in.mkv"), Path::new("out.mp4"))
            .unwrap_err();
        assert_eq!(err.to_string(), "ffmpeg encode");
    }
}
