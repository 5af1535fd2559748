use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result, RuleViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }

    fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => &["jpg", "jpeg", "png", "gif", "webp"],
            MediaKind::Audio => &["mp3", "wav", "ogg", "m4a"],
        }
    }

    fn directory(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Audio => "audio",
        }
    }
}

/// A file received in a multipart request, not yet stored anywhere.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores the file and returns the URL it is served from.
    async fn upload(&self, file: UploadedFile, kind: MediaKind) -> Result<String>;

    async fn delete(&self, url: &str) -> Result<()>;
}

/// Writes media under a local directory that the router serves statically.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_path: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_path: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_path: public_path.into().trim_end_matches('/').to_string(),
        }
    }

    fn local_path(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(&self.public_path)?.trim_start_matches('/');
        if relative.is_empty() || relative.split('/').any(|seg| seg == "..") {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, file: UploadedFile, kind: MediaKind) -> Result<String> {
        let extension = file.extension();
        if !kind.allowed_extensions().contains(&extension.as_str()) {
            return Err(RuleViolation::UnsupportedMedia {
                kind: kind.as_str().to_string(),
                extension,
            }
            .into());
        }

        let dir = self.root.join(kind.directory());
        tokio::fs::create_dir_all(&dir).await?;
        let saved_name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        tokio::fs::write(dir.join(&saved_name), &file.bytes).await?;

        let url = format!("{}/{}/{}", self.public_path, kind.directory(), saved_name);
        tracing::debug!(%url, size = file.bytes.len(), "Stored uploaded media");
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let Some(path) = self.local_path(url) else {
            tracing::debug!(%url, "Not a locally stored file, nothing to delete");
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Tracks every file uploaded while handling one request so they can be
/// removed again if the request fails afterwards.
pub struct UploadSession {
    store: Arc<dyn MediaStore>,
    uploaded: Vec<String>,
}

impl UploadSession {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self {
            store,
            uploaded: Vec::new(),
        }
    }

    pub async fn upload(&mut self, file: UploadedFile, kind: MediaKind) -> Result<String> {
        let url = self.store.upload(file, kind).await?;
        self.uploaded.push(url.clone());
        Ok(url)
    }

    pub fn uploaded(&self) -> &[String] {
        &self.uploaded
    }

    /// Best-effort removal of everything uploaded so far. Failures are logged
    /// and never surfaced.
    pub async fn compensate(self) {
        for url in &self.uploaded {
            if let Err(e) = self.store.delete(url).await {
                tracing::warn!(%url, error = %e, "Failed to remove orphaned upload");
            }
        }
        if !self.uploaded.is_empty() {
            tracing::info!(count = self.uploaded.len(), "Removed uploads of a failed request");
        }
    }
}
