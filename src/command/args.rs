use crate::ffmpeg::FfmpegEncodeArgs;
use clap::{Parser, ValueHint};
use std::path::PathBuf;

/// Convert a video with NVIDIA hardware encoding, showing live progress.
///
/// Prompts for the input & output paths unless given as arguments.
/// Type `cancel` at either prompt to exit.
#[derive(Parser, Debug)]
#[command(version, about)]
#[clap(verbatim_doc_comment)]
pub struct Args {
    /// Input video file. Prompted for if omitted.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Output video file, overwritten if it exists. Prompted for if omitted.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub encode: Encode,
}

/// Hardware encoder settings.
#[derive(Parser, Clone, Debug)]
pub struct Encode {
    /// Hardware video encoder. E.g. `hevc_nvenc` for better compression.
    #[arg(long, default_value = "h264_nvenc")]
    pub vcodec: String,

    /// Hardware accelerated decode backend.
    #[arg(long, default_value = "cuda")]
    pub hwaccel: String,

    /// Constant quantizer. Lower values mean higher quality & larger files,
    /// 0 can be lossless on some GPUs.
    #[arg(long, default_value_t = 18, value_parser = clap::value_parser!(u8).range(0..=51))]
    pub qp: u8,

    /// Encoder preset. Slower presets spend more time optimizing compression.
    #[arg(long, default_value = "slow")]
    pub preset: String,
}

impl From<Encode> for FfmpegEncodeArgs {
    fn from(Encode { vcodec, hwaccel, qp, preset }: Encode) -> Self {
        Self {
            hwaccel,
            vcodec,
            qp,
            preset,
            ..<_>::default()
        }
    }
}
