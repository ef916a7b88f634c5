//! Multipart file uploads.
//!
//! # Responsibilities
//! - Stream each file part of a `multipart/form-data` body to disk
//! - Enforce the per-file size limit, the file count and the accepted field
//! - Return one [`StoredFile`] per saved file
//!
//! Files are stored under a fresh uuid name so client-supplied names never
//! reach the filesystem. A part that breaks a limit aborts the whole upload
//! and every file already written for it is removed.
//!
//! axum caps `Multipart` bodies at 2 MiB unless told otherwise; put
//! [`UploadHandler::body_limit`] on upload routes to lift the cap to what the
//! configured limits allow.

use std::path::{Path, PathBuf};

use axum::extract::{multipart::Field, DefaultBodyLimit, Multipart};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::capability::CapabilityError;
use crate::routing::Middleware;

/// Room for part headers and text fields on top of the file bytes.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory files are written to; created on demand.
    pub dest: PathBuf,
    /// Per-file limit in bytes.
    pub max_file_size: u64,
    pub max_files: usize,
    /// Only this form field may carry files; any field when unset.
    pub field: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dest: PathBuf::from("uploads"),
            max_file_size: 10 * 1024 * 1024,
            max_files: 10,
            field: None,
        }
    }
}

/// One file written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub field: String,
    pub original_name: Option<String>,
    pub content_type: Option<String>,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct UploadHandler {
    config: UploadConfig,
}

impl UploadHandler {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Route middleware raising axum's body cap to
    /// `max_file_size * max_files` plus room for the multipart framing.
    pub fn body_limit(&self) -> Middleware {
        let bytes = self
            .config
            .max_file_size
            .saturating_mul(self.config.max_files as u64)
            .saturating_add(MULTIPART_OVERHEAD);
        let limit = usize::try_from(bytes).unwrap_or(usize::MAX);
        Middleware::from_layer("upload-limit", DefaultBodyLimit::max(limit))
    }

    /// Save every file part of `multipart`. Plain text fields are skipped.
    ///
    /// All or nothing: on error no file from this upload stays on disk.
    pub async fn store(&self, multipart: Multipart) -> Result<Vec<StoredFile>, CapabilityError> {
        let mut stored = Vec::new();
        match self.store_each(multipart, &mut stored).await {
            Ok(()) => Ok(stored),
            Err(e) => {
                for file in &stored {
                    discard(&file.path).await;
                }
                Err(e)
            }
        }
    }

    async fn store_each(
        &self,
        mut multipart: Multipart,
        stored: &mut Vec<StoredFile>,
    ) -> Result<(), CapabilityError> {
        tokio::fs::create_dir_all(&self.config.dest).await?;

        while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
            let Some(original_name) = field.file_name().map(str::to_owned) else {
                continue;
            };
            let name = field.name().unwrap_or_default().to_string();

            if let Some(expected) = &self.config.field {
                if *expected != name {
                    return Err(CapabilityError::Upload(format!("unexpected file field `{name}`")));
                }
            }
            if stored.len() >= self.config.max_files {
                return Err(CapabilityError::Upload(format!(
                    "too many files (limit {})",
                    self.config.max_files
                )));
            }

            let path = self.config.dest.join(uuid::Uuid::new_v4().simple().to_string());
            let content_type = field.content_type().map(str::to_owned);

            let size = match self.write_part(field, &original_name, &path).await {
                Ok(size) => size,
                Err(e) => {
                    discard(&path).await;
                    return Err(e);
                }
            };

            tracing::debug!(field = %name, path = %path.display(), size, "Upload stored");
            stored.push(StoredFile {
                field: name,
                original_name: Some(original_name),
                content_type,
                path,
                size,
            });
        }
        Ok(())
    }

    async fn write_part(
        &self,
        mut field: Field<'_>,
        original_name: &str,
        path: &Path,
    ) -> Result<u64, CapabilityError> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(upload_error)? {
            size += chunk.len() as u64;
            if size > self.config.max_file_size {
                return Err(CapabilityError::Upload(format!(
                    "file `{original_name}` exceeds {} bytes",
                    self.config.max_file_size
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(size)
    }
}

fn upload_error(e: axum::extract::multipart::MultipartError) -> CapabilityError {
    CapabilityError::Upload(e.body_text())
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteManager;
    use axum::{body::Body, http::StatusCode, response::IntoResponse, Json};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-BOUNDARY";

    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, filename, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match filename {
                Some(filename) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: text/plain\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn router(handler: UploadHandler) -> axum::Router {
        let mut manager = RouteManager::new();
        let limit = handler.body_limit();
        manager
            .set_route("/upload")
            .post_with([limit], move |multipart: Multipart| {
                let handler = handler.clone();
                async move {
                    match handler.store(multipart).await {
                        Ok(files) => Json(files).into_response(),
                        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
                    }
                }
            })
            .unwrap();
        manager.into_router()
    }

    fn request(body: String) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_stores_file_parts() {
        let dir = tempfile::tempdir().unwrap();
        let handler = UploadHandler::new(UploadConfig {
            dest: dir.path().join("files"),
            ..UploadConfig::default()
        });

        let body = multipart_body(&[("title", None, "notes"), ("doc", Some("a.txt"), "hello")]);
        let res = router(handler).oneshot(request(body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let files: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["field"], "doc");
        assert_eq!(files[0]["original_name"], "a.txt");
        assert_eq!(files[0]["size"], 5);

        let path = files[0]["path"].as_str().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_rejects_oversize_and_unexpected_field() {
        let dir = tempfile::tempdir().unwrap();
        let handler = UploadHandler::new(UploadConfig {
            dest: dir.path().to_path_buf(),
            max_file_size: 3,
            field: Some("avatar".into()),
            ..UploadConfig::default()
        });

        let body = multipart_body(&[("avatar", Some("a.png"), "too big")]);
        let res = router(handler.clone()).oneshot(request(body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let body = multipart_body(&[("other", Some("a.png"), "ok")]);
        let res = router(handler).oneshot(request(body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_files_above_default_body_cap() {
        let dir = tempfile::tempdir().unwrap();
        let handler = UploadHandler::new(UploadConfig {
            dest: dir.path().to_path_buf(),
            ..UploadConfig::default()
        });

        let content = "a".repeat(3 * 1024 * 1024);
        let body = multipart_body(&[("doc", Some("big.txt"), content.as_str())]);
        let res = router(handler).oneshot(request(body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let files: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(files[0]["size"], 3 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_failed_upload_removes_earlier_files() {
        let dir = tempfile::tempdir().unwrap();
        let handler = UploadHandler::new(UploadConfig {
            dest: dir.path().to_path_buf(),
            max_file_size: 3,
            ..UploadConfig::default()
        });

        let body = multipart_body(&[("a", Some("a.txt"), "ok"), ("b", Some("b.txt"), "too big")]);
        let res = router(handler).oneshot(request(body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
