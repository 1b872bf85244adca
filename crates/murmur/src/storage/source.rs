//! Storage for uploaded audio.
//!
//! The orchestrator only ever holds a [`SourceRef`]; the bytes stay with the
//! storage layer until the job is deleted.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Opaque handle to an uploaded audio file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for raw uploaded bytes.
///
/// A reference returned by `store` stays valid until `delete` is called on it.
pub trait SourceStorage: Send + Sync {
    fn store(&self, content: &[u8], filename: &str) -> Result<SourceRef, StorageError>;

    fn read(&self, source: &SourceRef) -> Result<Vec<u8>, StorageError>;

    /// Local path of the source, for engines that read files directly.
    fn local_path(&self, source: &SourceRef) -> Option<PathBuf>;

    fn delete(&self, source: &SourceRef) -> Result<(), StorageError>;
}

/// Keeps only characters that are safe in a single path component.
fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Stores uploads as files under a single directory.
pub struct FileSourceStorage {
    directory: PathBuf,
}

impl FileSourceStorage {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn resolve(&self, source: &SourceRef) -> Result<PathBuf, StorageError> {
        let key = source.as_str();
        let valid = !key.is_empty()
            && Path::new(key).file_name().and_then(|n| n.to_str()) == Some(key)
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidReference(key.to_string()));
        }
        Ok(self.directory.join(key))
    }

    fn ensure_directory(&self) -> Result<(), StorageError> {
        if !self.directory.exists() {
            std::fs::create_dir_all(&self.directory).map_err(|e| {
                StorageError::CreateDirectory {
                    path: self.directory.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }
}

impl SourceStorage for FileSourceStorage {
    fn store(&self, content: &[u8], filename: &str) -> Result<SourceRef, StorageError> {
        self.ensure_directory()?;

        let key = format!("{}_{}", uuid::Uuid::new_v4(), sanitize_filename(filename));
        let path = self.directory.join(&key);

        // create_new fails if the key already exists instead of clobbering it
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        file.write_all(content)
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        log::debug!("Stored upload {} ({} bytes)", key, content.len());
        Ok(SourceRef::new(key))
    }

    fn read(&self, source: &SourceRef) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(source)?;
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }

    fn local_path(&self, source: &SourceRef) -> Option<PathBuf> {
        self.resolve(source).ok()
    }

    fn delete(&self, source: &SourceRef) -> Result<(), StorageError> {
        let path = self.resolve(source)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::RemoveFile { path, source: e }),
        }
    }
}
