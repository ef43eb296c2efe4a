use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Secret used to sign session tokens. A random secret is generated at
    /// startup when unset, which invalidates tokens across restarts.
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Token lifetime in hours (default: 24)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory where uploaded source videos are stored
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory where transcoded outputs are written
    #[serde(default = "default_transcoded_dir")]
    pub transcoded_dir: PathBuf,

    /// SQLite database file path
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Maximum accepted upload size in bytes (default: 100 MB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Number of jobs allowed to encode at the same time (default: 4)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Path to the ffmpeg binary. Discovered on PATH when unset.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to the ffprobe binary. Discovered on PATH when unset.
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_token_ttl() -> u64 {
    24
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data/uploads")
}
fn default_transcoded_dir() -> PathBuf {
    PathBuf::from("./data/transcoded")
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/vidmill.db")
}
fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}
fn default_max_concurrent_jobs() -> usize {
    4
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_hours: default_token_ttl(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            transcoded_dir: default_transcoded_dir(),
            db_path: default_db_path(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.transcode.max_concurrent_jobs, 4);
        assert_eq!(config.storage.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.server.auth.token_ttl_hours, 24);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [transcode]
            max_concurrent_jobs = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.transcode.max_concurrent_jobs, 2);
        assert_eq!(config.storage.db_path, PathBuf::from("./data/vidmill.db"));
    }
}
