use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::session::SessionId;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [server]
//                    base_url = "http://chat.internal:8000"
//
//   env var:         CHATLINE_SERVER__BASE_URL=http://chat.internal:8000
//
//   CLI flag:        --server http://chat.internal:8000   (wins over both)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub connection: ConnectionFileConfig,
    #[serde(default)]
    pub upload: UploadFileConfig,
}

/// Backend location (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Streaming connection knobs (lives under `[connection]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionFileConfig {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ConnectionFileConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Upload knobs (lives under `[upload]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadFileConfig {
    #[serde(default = "default_upload_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UploadFileConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_upload_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_event_capacity() -> usize {
    256
}
fn default_upload_timeout_secs() -> u64 {
    120
}

/// Build a figment that layers: defaults → config.toml → CHATLINE_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `CHATLINE_SERVER__BASE_URL=http://host:8000`  →  `server.base_url`
///   `CHATLINE_CONNECTION__RECONNECT_DELAY_MS=500`  →  `connection.reconnect_delay_ms`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("CHATLINE_").split("__"))
}

// =============================================================================
// Runtime config structs (derived from FileConfig)
// =============================================================================

/// Where the backend lives and how its endpoints are addressed.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub base_url: Url,
}

impl ServerConfig {
    pub fn from_file(fc: &ServerFileConfig, cli_override: Option<&str>) -> Result<Self> {
        let raw = cli_override.unwrap_or(&fc.base_url);
        let base_url =
            Url::parse(raw).with_context(|| format!("invalid server base URL: {raw}"))?;
        match base_url.scheme() {
            "http" | "https" => Ok(Self { base_url }),
            other => anyhow::bail!("server base URL must be http or https, got {other}"),
        }
    }

    /// `ws://<host>/ws?session_id=<id>` (`wss` for an https base).
    pub fn ws_url(&self, session_id: &SessionId) -> Result<Url> {
        let mut url = self.endpoint("ws")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("cannot switch {} to {scheme}", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("session_id", session_id.as_str());
        Ok(url)
    }

    pub fn upload_url(&self) -> Result<Url> {
        self.endpoint("upload")
    }

    pub fn health_url(&self) -> Result<Url> {
        self.endpoint("health")
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("failed to build /{path} URL from {}", self.base_url))
    }
}

/// Streaming connection configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Fixed pause between losing the socket and the next attempt
    pub reconnect_delay: Duration,
    /// Capacity of the event channel towards the view
    pub event_capacity: usize,
}

impl ConnectionConfig {
    pub fn from_file(fc: &ConnectionFileConfig) -> Self {
        Self {
            reconnect_delay: Duration::from_millis(fc.reconnect_delay_ms),
            event_capacity: fc.event_capacity.max(1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub timeout: Duration,
}

impl UploadConfig {
    pub fn from_file(fc: &UploadFileConfig) -> Self {
        Self {
            timeout: Duration::from_secs(fc.timeout_secs),
        }
    }
}

/// Everything the commands need, resolved once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub server: ServerConfig,
    pub connection: ConnectionConfig,
    pub upload: UploadConfig,
}

impl Settings {
    pub fn resolve(config: &ChatlineConfig, server_override: Option<&str>) -> Result<Self> {
        debug!("Loading config from {}", config.config_toml_path().display());
        let fc: FileConfig = load_config(&config.data_dir)
            .extract()
            .context("failed to load configuration")?;
        Ok(Self {
            server: ServerConfig::from_file(&fc.server, server_override)?,
            connection: ConnectionConfig::from_file(&fc.connection),
            upload: UploadConfig::from_file(&fc.upload),
        })
    }
}

// =============================================================================
// Directory layout config (derived from --data-dir, not tunable via figment)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ChatlineConfig {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ChatlineConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".chatline"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        Ok(Self { data_dir, logs_dir })
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(crate::session::SESSION_FILE)
    }

    pub fn chat_log_path(&self) -> PathBuf {
        self.logs_dir.join("chatline.log")
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}
