//! Input duration probing.
use crate::process::CommandExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::{future::Future, io, path::Path, process::Stdio, time::Duration};
use tokio::process::Command;
use tracing::debug;

/// Why a duration could not be determined.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("could not run ffprobe: {0}")]
    Spawn(#[from] io::Error),
    #[error("ffprobe exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("ffprobe reported no duration")]
    Empty,
    #[error("unparseable duration `{0}`")]
    Malformed(String),
    #[error("non-positive duration {0}")]
    NonPositive(f64),
}

/// Source of the total duration of an input, in seconds.
pub trait DurationProbe {
    /// A positive duration, or an error meaning "not available".
    fn probe_duration(&self, input: &Path) -> impl Future<Output = Result<f64, ProbeError>>;
}

/// Duration probing by running `ffprobe`.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    pub program: String,
    /// Show a spinner on stderr while waiting.
    pub spinner: bool,
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self {
            program: "ffprobe".into(),
            spinner: true,
        }
    }
}

impl Ffprobe {
    fn spinner(&self) -> ProgressBar {
        if !self.spinner {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan.bold} {msg}") {
            bar.set_style(style);
        }
        bar.set_message("probing duration");
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

impl DurationProbe for Ffprobe {
    async fn probe_duration(&self, input: &Path) -> Result<f64, ProbeError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg2("-v", "error")
            .arg2("-show_entries", "format=duration")
            .arg2("-of", "default=noprint_wrappers=1:nokey=1")
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        debug!(cmd = %cmd.to_cmd_str(), "probing");

        let bar = self.spinner();
        let out = cmd.output().await;
        bar.finish_and_clear();
        let out = out?;

        if !out.status.success() {
            return Err(ProbeError::Exit {
                code: out.status.code(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_owned(),
            });
        }
        let duration = parse_duration(&String::from_utf8_lossy(&out.stdout))?;
        debug!(duration, "probed");
        Ok(duration)
    }
}

/// Parse ffprobe's bare `format=duration` output, e.g. `"120.042000\n"`.
pub fn parse_duration(stdout: &str) -> Result<f64, ProbeError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(ProbeError::Empty);
    }
    let secs: f64 = trimmed
        .parse()
        .map_err(|_| ProbeError::Malformed(trimmed.to_owned()))?;
    if !secs.is_finite() {
        return Err(ProbeError::Malformed(trimmed.to_owned()));
    }
    if secs <= 0.0 {
        return Err(ProbeError::NonPositive(secs));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_duration() {
        assert_eq!(parse_duration("120.042000\n").unwrap(), 120.042);
        assert_eq!(parse_duration("  7\r\n").unwrap(), 7.0);
    }

    #[test]
    fn parse_absent_duration() {
        assert!(matches!(parse_duration(""), Err(ProbeError::Empty)));
        assert!(matches!(parse_duration(" \n"), Err(ProbeError::Empty)));
        assert!(matches!(parse_duration("N/A\n"), Err(ProbeError::Malformed(s)) if s == "N/A"));
        assert!(matches!(parse_duration("inf"), Err(ProbeError::Malformed(_))));
        assert!(matches!(parse_duration("0.000000"), Err(ProbeError::NonPositive(_))));
        assert!(matches!(parse_duration("-3"), Err(ProbeError::NonPositive(_))));
    }

    #[tokio::test]
    async fn missing_program_is_absence() {
        let probe = Ffprobe {
            program: "ffprobe-that-does-not-exist".into(),
            spinner: false,
        };
        let result = probe.probe_duration(Path::new("in.mkv")).await;
        assert!(matches!(result, Err(ProbeError::Spawn(_))));
    }
}
