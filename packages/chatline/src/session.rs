//! Session identity: a durable correlation key sent with every socket
//! connection and upload so the backend can group one user's traffic.
//!
//! The identifier is not a credential. It lives in `<data_dir>/session_id`
//! and is only regenerated when that file disappears or is emptied.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use rand::Rng;
use tracing::info;

pub const SESSION_FILE: &str = "session_id";

const SUFFIX_LEN: usize = 13;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Load from `<data_dir>/session_id`, or generate and save a new one.
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(SESSION_FILE);

        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read session id: {}", path.display()))?;
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                info!(session_id = trimmed, "Loaded session id");
                return Ok(Self(trimmed.to_string()));
            }
        }

        let id = Self::generate();
        std::fs::write(&path, &id.0)
            .with_context(|| format!("failed to write session id: {}", path.display()))?;
        info!(session_id = %id, "Generated new session id");
        Ok(id)
    }

    /// `session_<unix-millis>_<13 base36 chars>`, not persisted.
    pub(crate) fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
            .collect();
        Self(format!("session_{millis}_{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
