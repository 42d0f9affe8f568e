use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::FileInfo;

/// Uploaded note files, kept flat under one directory.
pub struct FileStorage {
    root: PathBuf,
}

/// Reduces a client supplied file name to its last path component.
fn clean_file_name(original_name: &str) -> Option<&str> {
    let name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name)
        .trim();
    (!name.is_empty() && name != "." && name != "..").then_some(name)
}

fn is_stored_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

impl FileStorage {
    pub async fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn store(&self, bytes: &[u8], original_name: &str) -> Result<FileInfo, AppError> {
        let file_name = clean_file_name(original_name)
            .ok_or_else(|| AppError::validation(format!("Invalid file name: {original_name:?}")))?;

        let stored_name = format!("{}_{}", Uuid::new_v4(), file_name);
        fs::write(self.root.join(&stored_name), bytes).await?;
        debug!("Stored {} bytes as {stored_name}", bytes.len());

        Ok(FileInfo {
            file_name: file_name.to_string(),
            file_type: mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .to_string(),
            download_url: format!("/files/{stored_name}"),
        })
    }

    /// Removes a stored file. Failures are logged, not returned.
    pub async fn discard(&self, file: &FileInfo) {
        let Some(stored_name) = file
            .download_url
            .strip_prefix("/files/")
            .filter(|name| is_stored_name(name))
        else {
            warn!("Refusing to discard {:?}", file.download_url);
            return;
        };

        match fs::remove_file(self.root.join(stored_name)).await {
            Ok(()) => debug!("Discarded {stored_name}"),
            Err(e) => warn!("Failed to discard {stored_name}: {e}"),
        }
    }

    /// Opens a previously stored file along with its content type.
    pub async fn open(&self, stored_name: &str) -> Result<(fs::File, String), AppError> {
        let not_found = || AppError::not_found(format!("File not found: {stored_name}"));
        if !is_stored_name(stored_name) {
            return Err(not_found());
        }

        let path = self.root.join(stored_name);
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let mime_type = mime_guess::from_path(&path).first_or_octet_stream();

        Ok((file, mime_type.to_string()))
    }
}

#[cfg(test)]
pub(crate) async fn scratch() -> FileStorage {
    let dir = std::env::temp_dir().join(format!("studynotes-test-{}", Uuid::new_v4()));
    FileStorage::new(dir).await.expect("create scratch upload dir")
}
