use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{file_name_of, validate_path, ArtifactStore, AudioClip};
use crate::error::StorageError;

/// Artifact store rooted at a local directory.
pub struct FileArtifactStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FileArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: None,
        }
    }

    /// Serves `url_for` links under `base_url` instead of `file://` URLs.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a reference back to a file under the root.
    fn resolve(&self, reference: &str) -> Result<PathBuf, StorageError> {
        if let Some(local) = reference.strip_prefix("file://") {
            let path = PathBuf::from(local);
            if !path.starts_with(&self.root)
                || path.components().any(|c| c == std::path::Component::ParentDir)
            {
                return Err(StorageError::InvalidPath(reference.to_string()));
            }
            return Ok(path);
        }

        let relative = match &self.public_base_url {
            Some(base) => reference
                .strip_prefix(base.as_str())
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(reference),
            None => reference,
        };
        let relative = relative.split(['?', '#']).next().unwrap_or(relative);
        validate_path(relative)?;
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_path(path)?;
        let file_path = self.root.join(path);

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        // create_new makes the existence check and creation one atomic step.
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::FileExists(file_path));
            }
            Err(e) => {
                return Err(StorageError::WriteFile {
                    path: file_path,
                    source: e,
                });
            }
        };

        file.write_all(bytes)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: file_path.clone(),
                source: e,
            })?;
        file.sync_all().await.map_err(|e| StorageError::WriteFile {
            path: file_path.clone(),
            source: e,
        })?;

        log::debug!("Stored artifact {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    async fn fetch(&self, reference: &str) -> Result<AudioClip, StorageError> {
        let path = self.resolve(reference)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::ReadFile {
                path: path.clone(),
                source: e,
            })?;
        if bytes.is_empty() {
            return Err(StorageError::Empty {
                reference: reference.to_string(),
            });
        }
        Ok(AudioClip::new(bytes, file_name_of(reference)))
    }

    fn url_for(&self, path: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, path),
            None => format!("file://{}", self.root.join(path).display()),
        }
    }
}
