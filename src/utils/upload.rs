use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Uploaded file is empty")]
    Empty,

    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),
}

/// An uploaded file written to its own temporary directory.
///
/// The directory and everything in it is removed when the value is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    _dir: TempDir,
    path: PathBuf,
    filename: String,
}

impl StagedUpload {
    /// Decodes a base64 payload and writes it under `upload_dir`.
    pub fn from_base64(upload_dir: &Path, filename: &str, payload: &str) -> Result<Self, UploadError> {
        let compact: String = payload.split_whitespace().collect();
        let bytes = BASE64.decode(compact.as_bytes())?;
        Self::from_bytes(upload_dir, filename, &bytes)
    }

    pub fn from_bytes(upload_dir: &Path, filename: &str, bytes: &[u8]) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        std::fs::create_dir_all(upload_dir)?;
        let dir = tempfile::Builder::new()
            .prefix("upload-")
            .tempdir_in(upload_dir)?;
        let filename = sanitize_filename(filename);
        let path = dir.path().join(&filename);
        std::fs::write(&path, bytes)?;

        debug!(target: "upload", path = %path.display(), size = bytes.len(), "Staged upload");
        Ok(Self {
            _dir: dir,
            path,
            filename,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Keeps the final path component and replaces anything outside
/// `[A-Za-z0-9._-]` with `_`. Never returns an empty or dot-only name.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or("")
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.' || c == '_') {
        "upload.pdf".to_string()
    } else {
        cleaned
    }
}
