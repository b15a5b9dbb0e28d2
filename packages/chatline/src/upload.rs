//! One-shot multipart upload to `POST <base>/upload`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chat_protocol::{UploadResponse, UploadedFile};
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use tracing::{debug, info};

use crate::config::{ServerConfig, UploadConfig};
use crate::session::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no files selected")]
    NoFiles,

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("server is unavailable")]
    Unavailable,

    #[error("upload rejected ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl UploadError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Transport(err)
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadClient {
    client: reqwest::Client,
    url: Url,
}

impl UploadClient {
    pub fn new(server: &ServerConfig, config: &UploadConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            url: server.upload_url()?,
        })
    }

    /// Send every file in one request. Returns the server's descriptors.
    pub async fn upload(
        &self,
        paths: &[PathBuf],
        session_id: &SessionId,
    ) -> Result<Vec<UploadedFile>, UploadError> {
        if paths.is_empty() {
            return Err(UploadError::NoFiles);
        }

        let mut form = Form::new();
        for path in paths {
            form = form.part("files", file_part(path).await?);
        }
        form = form.text("session_id", session_id.to_string());

        debug!(url = %self.url, files = paths.len(), "uploading");
        let resp = self
            .client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(UploadError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError::Rejected { status, body });
        }

        let body: UploadResponse = resp.json().await?;
        info!(
            session_id = %session_id,
            files = body.files.len(),
            "upload complete"
        );
        Ok(body.files)
    }
}

async fn file_part(path: &Path) -> Result<Part, UploadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(Part::bytes(bytes)
        .file_name(name)
        .mime_str(mime.essence_str())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerFileConfig;
    use axum::extract::{Multipart, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct SeenField {
        name: String,
        file_name: Option<String>,
        content_type: Option<String>,
        data: String,
    }

    type Seen = Arc<Mutex<Vec<SeenField>>>;

    async fn record_upload(State(seen): State<Seen>, mut multipart: Multipart) -> Json<Value> {
        let mut files = Vec::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.text().await.unwrap();
            if let Some(f) = &file_name {
                files.push(json!({"filename": f, "size": data.len()}));
            }
            seen.lock().unwrap().push(SeenField {
                name,
                file_name,
                content_type,
                data,
            });
        }
        let message = format!("Successfully uploaded {} file(s)", files.len());
        Json(json!({
            "success": true,
            "files": files,
            "message": message,
        }))
    }

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn client_for(base: String) -> UploadClient {
        let server = ServerConfig::from_file(&ServerFileConfig { base_url: base }, None).unwrap();
        UploadClient::new(
            &server,
            &UploadConfig {
                timeout: Duration::from_secs(10),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn uploads_every_file_with_session_id() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route("/upload", post(record_upload))
            .with_state(seen.clone());
        let addr = serve(router).await;

        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("sales.csv");
        let png = dir.path().join("cat.png");
        std::fs::write(&csv, "a,b\n1,2\n").unwrap();
        std::fs::write(&png, "not really a png").unwrap();

        let client = client_for(format!("http://{addr}"));
        let files = client
            .upload(&[csv, png], &SessionId::from("session_9_x"))
            .await
            .unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["sales.csv", "cat.png"]);
        assert_eq!(files[0].size, Some(8));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].name, "files");
        assert_eq!(seen[0].file_name.as_deref(), Some("sales.csv"));
        assert_eq!(seen[0].content_type.as_deref(), Some("text/csv"));
        assert_eq!(seen[0].data, "a,b\n1,2\n");
        assert_eq!(seen[1].name, "files");
        assert_eq!(seen[1].content_type.as_deref(), Some("image/png"));
        assert_eq!(seen[2].name, "session_id");
        assert_eq!(seen[2].file_name, None);
        assert_eq!(seen[2].data, "session_9_x");
    }

    #[tokio::test]
    async fn empty_selection_sends_nothing() {
        // Nothing listens here; a request would fail with Unavailable.
        let client = client_for("http://127.0.0.1:1".to_string());
        let err = client.upload(&[], &SessionId::from("s")).await.unwrap_err();
        assert!(matches!(err, UploadError::NoFiles));
    }

    #[tokio::test]
    async fn unreadable_file_fails_before_request() {
        let client = client_for("http://127.0.0.1:1".to_string());
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");

        let err = client
            .upload(&[missing.clone()], &SessionId::from("s"))
            .await
            .unwrap_err();
        match err {
            UploadError::Read { path, .. } => assert_eq!(path, missing),
            other => panic!("expected Read, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_is_rejected() {
        let router = Router::new().route(
            "/upload",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "disk full") }),
        );
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();

        let err = client_for(format!("http://{addr}"))
            .upload(&[file], &SessionId::from("s"))
            .await
            .unwrap_err();
        match err {
            UploadError::Rejected { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "disk full");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_transport_error() {
        let router = Router::new().route("/upload", post(|| async { "ok" }));
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();

        let err = client_for(format!("http://{addr}"))
            .upload(&[file], &SessionId::from("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Transport(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();

        let err = client_for(format!("http://{addr}"))
            .upload(&[file], &SessionId::from("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Unavailable));
    }
}
