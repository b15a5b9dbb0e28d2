pub mod chat;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

use crate::config::{ChatlineConfig, Settings};
use crate::health::{self, ProbeError};
use crate::session::SessionId;
use crate::upload::{UploadClient, UploadError};

/// Default command: open the interactive chat.
pub async fn chat_command(config: &ChatlineConfig, settings: &Settings) -> Result<()> {
    let session = SessionId::load_or_create(&config.data_dir)?;
    chat::run_chat(settings, session).await
}

/// Print the persistent session identifier.
pub fn session_command(config: &ChatlineConfig) -> Result<()> {
    let session = SessionId::load_or_create(&config.data_dir)?;
    println!("{session}");
    Ok(())
}

/// Upload files without opening the chat screen.
pub async fn upload_command(
    config: &ChatlineConfig,
    settings: &Settings,
    files: &[PathBuf],
) -> Result<()> {
    let session = SessionId::load_or_create(&config.data_dir)?;
    let client = UploadClient::new(&settings.server, &settings.upload)?;

    let uploaded = match client.upload(files, &session).await {
        Ok(uploaded) => uploaded,
        Err(UploadError::Unavailable) => {
            anyhow::bail!("server unavailable at {}", settings.server.base_url)
        }
        Err(e) => return Err(e).context("upload failed"),
    };

    for file in &uploaded {
        debug!(file = %file.filename, dataset_loaded = ?file.dataset_loaded, "uploaded");
        match file.size {
            Some(size) => println!("{:<40} {:>10} bytes", file.filename, size),
            None => println!("{}", file.filename),
        }
        if let Some(err) = &file.dataset_error {
            eprintln!("  dataset not loaded: {err}");
        }
    }
    println!("\n{} file(s) uploaded", uploaded.len());
    Ok(())
}

/// Probe `GET /health`.
pub async fn health_command(settings: &Settings, json: bool) -> Result<()> {
    let status = match health::probe(&settings.server).await {
        Ok(status) => status,
        Err(ProbeError::Unavailable) => {
            anyhow::bail!("server unavailable at {}", settings.server.base_url)
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!(
            "{}: {} ({} uploaded file(s))",
            settings.server.base_url, status.status, status.uploaded_files_count
        );
    }

    if !status.is_healthy() {
        anyhow::bail!("server reported status {:?}", status.status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConnectionConfig, ConnectionFileConfig, ServerConfig, ServerFileConfig, UploadConfig,
        UploadFileConfig,
    };
    use axum::Router;
    use axum::routing::get;

    fn settings_for(base: String) -> Settings {
        Settings {
            server: ServerConfig::from_file(&ServerFileConfig { base_url: base }, None).unwrap(),
            connection: ConnectionConfig::from_file(&ConnectionFileConfig::default()),
            upload: UploadConfig::from_file(&UploadFileConfig::default()),
        }
    }

    async fn serve_health(status: &'static str) -> String {
        let router = Router::new().route(
            "/health",
            get(move || async move {
                axum::Json(serde_json::json!({"status": status, "uploaded_files_count": 0}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn session_command_creates_session_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ChatlineConfig::new(Some(tmp.path().to_path_buf())).unwrap();
        session_command(&config).unwrap();
        assert!(config.session_path().exists());
    }

    #[tokio::test]
    async fn health_command_ok_when_healthy() {
        let base = serve_health("healthy").await;
        health_command(&settings_for(base), true).await.unwrap();
    }

    #[tokio::test]
    async fn health_command_fails_when_degraded() {
        let base = serve_health("degraded").await;
        let err = health_command(&settings_for(base), false).await.unwrap_err();
        assert!(err.to_string().contains("degraded"));
    }

    #[tokio::test]
    async fn upload_command_rejects_unreachable_server() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ChatlineConfig::new(Some(tmp.path().to_path_buf())).unwrap();
        let file = tmp.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = upload_command(&config, &settings_for(format!("http://{addr}")), &[file])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("server unavailable"));
    }
}
