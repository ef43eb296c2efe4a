//! Transcode target value types.
//!
//! A [`TargetSpec`] is the immutable (format, resolution, bitrate) triple
//! describing a job's desired output. Format and resolution are closed
//! enumerations; anything outside them is rejected at intake, before a job
//! record is ever created.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Target video codec family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    H264,
    H265,
    Vp9,
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H264 => write!(f, "h264"),
            Self::H265 => write!(f, "h265"),
            Self::Vp9 => write!(f, "vp9"),
        }
    }
}

impl std::str::FromStr for VideoFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "h264" => Ok(Self::H264),
            "h265" => Ok(Self::H265),
            "vp9" => Ok(Self::Vp9),
            _ => Err(Error::invalid_input(format!("Invalid target format: {}", s))),
        }
    }
}

/// Target output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetResolution {
    #[serde(rename = "480p")]
    R480p,
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "4K")]
    R4k,
}

impl TargetResolution {
    /// Output frame dimensions (width, height) for this resolution.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::R480p => (854, 480),
            Self::R720p => (1280, 720),
            Self::R1080p => (1920, 1080),
            Self::R4k => (3840, 2160),
        }
    }
}

impl std::fmt::Display for TargetResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::R480p => write!(f, "480p"),
            Self::R720p => write!(f, "720p"),
            Self::R1080p => write!(f, "1080p"),
            Self::R4k => write!(f, "4K"),
        }
    }
}

impl std::str::FromStr for TargetResolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "480p" => Ok(Self::R480p),
            "720p" => Ok(Self::R720p),
            "1080p" => Ok(Self::R1080p),
            "4K" => Ok(Self::R4k),
            _ => Err(Error::invalid_input(format!(
                "Invalid target resolution: {}",
                s
            ))),
        }
    }
}

/// The immutable description of a transcode job's desired output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub format: VideoFormat,
    pub resolution: TargetResolution,
    /// Optional encoded-rate override, e.g. "2M". Free-form, passed through
    /// to the encoder verbatim.
    pub bitrate: Option<String>,
}

impl TargetSpec {
    /// Build a spec from raw request strings, rejecting anything outside the
    /// format/resolution enumerations.
    pub fn parse(format: &str, resolution: &str, bitrate: Option<String>) -> Result<Self> {
        Ok(Self {
            format: format.parse()?,
            resolution: resolution.parse()?,
            bitrate: bitrate.filter(|b| !b.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trip() {
        for s in ["h264", "h265", "vp9"] {
            let f: VideoFormat = s.parse().unwrap();
            assert_eq!(f.to_string(), s);
        }
    }

    #[test]
    fn test_format_rejects_unknown() {
        assert!("xvid".parse::<VideoFormat>().is_err());
        assert!("H264".parse::<VideoFormat>().is_err());
        assert!("".parse::<VideoFormat>().is_err());
    }

    #[test]
    fn test_resolution_round_trip() {
        for s in ["480p", "720p", "1080p", "4K"] {
            let r: TargetResolution = s.parse().unwrap();
            assert_eq!(r.to_string(), s);
        }
    }

    #[test]
    fn test_resolution_dimensions() {
        assert_eq!(TargetResolution::R480p.dimensions(), (854, 480));
        assert_eq!(TargetResolution::R720p.dimensions(), (1280, 720));
        assert_eq!(TargetResolution::R1080p.dimensions(), (1920, 1080));
        assert_eq!(TargetResolution::R4k.dimensions(), (3840, 2160));
    }

    #[test]
    fn test_resolution_rejects_unknown() {
        assert!("240p".parse::<TargetResolution>().is_err());
        assert!("4k".parse::<TargetResolution>().is_err());
    }

    #[test]
    fn test_spec_parse() {
        let spec = TargetSpec::parse("h264", "720p", Some("2M".into())).unwrap();
        assert_eq!(spec.format, VideoFormat::H264);
        assert_eq!(spec.resolution, TargetResolution::R720p);
        assert_eq!(spec.bitrate.as_deref(), Some("2M"));
    }

    #[test]
    fn test_spec_parse_empty_bitrate_dropped() {
        let spec = TargetSpec::parse("vp9", "1080p", Some(String::new())).unwrap();
        assert!(spec.bitrate.is_none());
    }

    #[test]
    fn test_spec_parse_invalid_format_is_rejected() {
        let err = TargetSpec::parse("xvid", "720p", None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_spec_serialization() {
        let spec = TargetSpec::parse("h265", "4K", None).unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"h265\""));
        assert!(json.contains("\"4K\""));
        let back: TargetSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
