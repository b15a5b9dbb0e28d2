use std::time::Duration;

use anyhow::Context;
use chat_protocol::HealthStatus;

use crate::config::ServerConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProbeError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}

/// `GET <base>/health`.
pub async fn probe(server: &ServerConfig) -> Result<HealthStatus, ProbeError> {
    let url = server.health_url()?;
    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(ProbeError::from_reqwest)?
        .error_for_status()
        .map_err(ProbeError::from_reqwest)?;

    let status = resp
        .json::<HealthStatus>()
        .await
        .context("failed to parse health response")?;
    Ok(status)
}
