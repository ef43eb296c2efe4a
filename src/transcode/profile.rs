//! Encoding profiles: the ffmpeg argument set for each target.
//!
//! Every job runs the same filter chain (lanczos scale, sharpen, color
//! boost, denoise) and differs only in the codec block and an optional
//! bitrate cap. The slow presets and expensive motion-estimation settings
//! are deliberate; output quality is the priority over encode time.

use std::path::Path;

use vidmill_common::{JobId, TargetSpec, VideoFormat};

/// Codec-specific argument block for a target format.
fn codec_args(format: VideoFormat) -> &'static [&'static str] {
    match format {
        VideoFormat::H264 => &[
            "-c:v",
            "libx264",
            "-preset",
            "veryslow",
            "-crf",
            "18",
            "-x264-params",
            "me=umh:subme=10:ref=16:b-adapt=2:direct=auto:weightp=2",
        ],
        VideoFormat::H265 => &[
            "-c:v",
            "libx265",
            "-preset",
            "veryslow",
            "-crf",
            "20",
            "-x265-params",
            "me=3:subme=4:ref=6:b-adapt=2",
        ],
        VideoFormat::Vp9 => &[
            "-c:v",
            "libvpx-vp9",
            "-crf",
            "20",
            "-b:v",
            "0",
            "-cpu-used",
            "0",
        ],
    }
}

/// The full video filter chain for a target resolution.
fn filter_chain(target: &TargetSpec) -> String {
    let (width, height) = target.resolution.dimensions();
    format!(
        "scale={}:{}:flags=lanczos,\
         unsharp=5:5:1.0:5:5:0.0,\
         eq=contrast=1.1:brightness=0.02:saturation=1.1,\
         hqdn3d=4:3:6:4.5",
        width, height
    )
}

/// Build the complete ffmpeg argument list for one job.
pub fn ffmpeg_args(input: &Path, output: &Path, target: &TargetSpec) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vf".to_string(),
        filter_chain(target),
    ];

    args.extend(codec_args(target.format).iter().map(|s| s.to_string()));

    // Audio settings
    args.extend([
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
    ]);

    // Optional encoded-rate cap, passed through verbatim
    if let Some(ref bitrate) = target.bitrate {
        args.extend(["-b:v".to_string(), bitrate.clone()]);
    }

    // Overwrite output
    args.push("-y".to_string());
    args.push(output.to_string_lossy().to_string());

    args
}

/// Stable, unique output artifact name for a job.
pub fn output_filename(job_id: JobId, target: &TargetSpec) -> String {
    format!("{}_{}_{}.mp4", job_id, target.format, target.resolution)
}
