use crate::{
    command::{
        args::Args,
        prompt::{Prompter, Reply},
    },
    console_ext::{ConsoleStyler, Styler, Tone},
    ffmpeg::{EncodeJob, Encoder, FfmpegEncodeArgs},
    ffprobe::{DurationProbe, Ffprobe, ProbeError},
    progress::{self, ProgressRenderer},
    timecode::progress_time,
};
use anyhow::{ensure, Context};
use indicatif::HumanDuration;
use std::{
    future::Future,
    io::{self, BufRead, Write},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Prompts for any paths not given as arguments, then converts.
pub fn convert(args: Args) -> anyhow::Result<u8> {
    let stdin = io::stdin();
    convert_with(args, Prompter::new(stdin.lock(), io::stdout(), ConsoleStyler))
}

fn convert_with<R, W, S>(
    Args { input, output, encode }: Args,
    mut prompt: Prompter<R, W, S>,
) -> anyhow::Result<u8>
where
    R: BufRead,
    W: Write,
    S: Styler,
{
    if input.is_none() || output.is_none() {
        prompt.welcome()?;
    }
    let input = match input {
        Some(input) => {
            ensure!(input.is_file(), "input {} is not a file", input.display());
            input
        }
        None => match prompt.input_path()? {
            Reply::Value(input) => input,
            Reply::Cancel => return prompt.canceled().map(|_| 0).map_err(Into::into),
        },
    };
    let output = match output {
        Some(output) => output,
        None => match prompt.output_path()? {
            Reply::Value(output) => output,
            Reply::Cancel => return prompt.canceled().map(|_| 0).map_err(Into::into),
        },
    };
    drop(prompt);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("tokio runtime")?;

    let mut session = Session::new(input, output);
    let mut converter = Converter {
        prober: Ffprobe::default(),
        encoder: FfmpegEncodeArgs::from(encode),
        out: io::stdout(),
        styler: ConsoleStyler,
        bar_width: progress::terminal_bar_width(),
    };
    let outcome = runtime.block_on(converter.run(&mut session, interrupted()));
    converter.report(&outcome).context("writing to stdout")?;
    Ok(outcome.exit_code())
}

/// Resolves on the first ctrl-c.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// One conversion run.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Total seconds, known once probed.
    pub duration: Option<f64>,
}

impl Session {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            output,
            duration: None,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Succeeded { took: Duration },
    Failed(Failure),
    Canceled,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Succeeded { .. } => 0,
            Self::Canceled => 1,
            Self::Failed(_) => 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("Could not determine video duration for '{}'.", .input.display())]
    DurationUnknown { input: PathBuf, source: ProbeError },
    #[error("Could not start the encoder: {0:#}")]
    Launch(anyhow::Error),
    #[error("Conversion failed. Please check the error messages above.")]
    Encoder { code: Option<i32> },
    #[error("Conversion aborted: {0}")]
    Io(#[from] io::Error),
}

/// Probes, encodes & draws progress to `out`.
pub struct Converter<P, E, W, S> {
    pub prober: P,
    pub encoder: E,
    pub out: W,
    pub styler: S,
    pub bar_width: usize,
}

impl<P, E, W, S> Converter<P, E, W, S>
where
    P: DurationProbe,
    E: Encoder,
    W: Write,
    S: Styler,
{
    /// Runs to a terminal state. `interrupt` resolving while the encoder runs
    /// stops the encoder & cancels.
    pub async fn run(
        &mut self,
        session: &mut Session,
        interrupt: impl Future<Output = ()>,
    ) -> Outcome {
        debug!(input = %session.input.display(), "probing");
        let total = match self.prober.probe_duration(&session.input).await {
            Ok(total) => total,
            Err(source) => {
                debug!(%source, "duration unavailable");
                return Outcome::Failed(Failure::DurationUnknown {
                    input: session.input.clone(),
                    source,
                });
            }
        };
        session.duration = Some(total);

        if let Err(err) = self.converting_msg(session) {
            return Outcome::Failed(err.into());
        }

        debug!(total, "running");
        let mut job = match self.encoder.start(&session.input, &session.output) {
            Ok(job) => job,
            Err(err) => return Outcome::Failed(Failure::Launch(err)),
        };
        let started = Instant::now();
        let mut bar = ProgressRenderer::new(&mut self.out, &self.styler, total, self.bar_width);

        // an interrupt also reaches the encoder, so it may exit in the same poll
        let finished = tokio::select! {
            biased;
            _ = interrupt => None,
            result = pump(&mut job, &mut bar) => Some(result),
        };

        let outcome = match finished {
            None => {
                debug!("interrupted");
                job.terminate().await;
                Outcome::Canceled
            }
            Some(Err(err)) => {
                job.terminate().await;
                Outcome::Failed(err.into())
            }
            Some(Ok(code)) => {
                if let Err(err) = bar.render_complete() {
                    return Outcome::Failed(err.into());
                }
                match code {
                    Some(0) => Outcome::Succeeded {
                        took: started.elapsed(),
                    },
                    code => Outcome::Failed(Failure::Encoder { code }),
                }
            }
        };
        if let Err(err) = bar.end_line() {
            debug!(%err, "ending progress line");
        }
        outcome
    }

    fn converting_msg(&mut self, session: &Session) -> io::Result<()> {
        let msg = format!(
            "Converting '{}' to '{}' using {}...",
            session.input.display(),
            session.output.display(),
            self.encoder.name(),
        );
        writeln!(self.out, "{}\n", self.styler.paint(Tone::Info, &msg))?;
        self.out.flush()
    }

    /// Writes the final status message.
    pub fn report(&mut self, outcome: &Outcome) -> io::Result<()> {
        let line = match outcome {
            Outcome::Succeeded { took } => self.styler.paint(
                Tone::Success,
                &format!(
                    "Conversion completed successfully! ({})",
                    HumanDuration(*took)
                ),
            ),
            Outcome::Canceled => self.styler.paint(Tone::Failure, "Process canceled by user."),
            Outcome::Failed(failure) => {
                if let Failure::Encoder { code } = failure {
                    debug!(?code, "encoder failed");
                }
                self.styler.paint(Tone::Failure, &failure.to_string())
            }
        };
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }
}

/// Feeds progress ticks to the bar until the diagnostic stream closes, then
/// waits for exit.
async fn pump<J, W, S>(job: &mut J, bar: &mut ProgressRenderer<W, S>) -> io::Result<Option<i32>>
where
    J: EncodeJob,
    W: Write,
    S: Styler,
{
    while let Some(line) = job.next_line().await? {
        if let Some(elapsed) = progress_time(&line) {
            bar.render(elapsed)?;
        }
    }
    job.wait().await
}
