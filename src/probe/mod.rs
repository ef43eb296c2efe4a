//! Media probing via ffprobe.
//!
//! Uploads are probed once at intake to capture duration, frame size, and
//! codec. Probing is best-effort: a file ffprobe cannot read still uploads,
//! it just carries no metadata.

use std::path::{Path, PathBuf};
use std::process::Command;

use vidmill_common::{Error, Result};

/// Metadata extracted from a media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResult {
    pub duration_secs: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub codec: Option<String>,
}

impl ProbeResult {
    /// Frame size as "WIDTHxHEIGHT", when both dimensions are known.
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }
}

/// Probe a media file with ffprobe.
pub fn probe_file(ffprobe: &Path, input: &Path) -> Result<ProbeResult> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input)
        .output()
        .map_err(|e| Error::internal(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(Error::invalid_input(format!(
            "ffprobe could not read {:?}",
            input.file_name().unwrap_or_default()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&stdout)
}

/// Parse ffprobe's JSON output into a [`ProbeResult`].
fn parse_probe_output(json: &str) -> Result<ProbeResult> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| Error::internal(format!("Invalid ffprobe output: {}", e)))?;

    let duration_secs = value
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|d| d.parse::<f64>().ok());

    let video_stream = value
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"))
        });

    let (width, height, codec) = match video_stream {
        Some(stream) => (
            stream.get("width").and_then(|w| w.as_i64()),
            stream.get("height").and_then(|h| h.as_i64()),
            stream
                .get("codec_name")
                .and_then(|c| c.as_str())
                .map(String::from),
        ),
        None => (None, None, None),
    };

    Ok(ProbeResult {
        duration_secs,
        width,
        height,
        codec,
    })
}

/// Status of an external tool dependency.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub name: &'static str,
    pub available: bool,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
}

/// Resolve a tool binary: an explicitly configured path wins, otherwise
/// look it up on PATH.
pub fn resolve_tool(configured: Option<&Path>, name: &str) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    which::which(name).map_err(|_| Error::internal(format!("{} not found on PATH", name)))
}

/// Whether a tool path resolves to something runnable: either an existing
/// file or a bare name found on PATH.
pub fn tool_available(path: &Path) -> bool {
    path.is_file() || which::which(path).is_ok()
}

/// Check availability of the external tools vidmill depends on.
pub fn check_tools(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Vec<ToolStatus> {
    [("ffmpeg", ffmpeg), ("ffprobe", ffprobe)]
        .into_iter()
        .map(|(name, configured)| {
            let path = resolve_tool(configured, name).ok();
            let version = path.as_deref().and_then(tool_version);
            ToolStatus {
                name,
                available: path.is_some(),
                path,
                version,
            }
        })
        .collect()
}

fn tool_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(String::from)
}
