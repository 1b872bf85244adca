//! Materialized transcript files.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::StorageError;
use crate::formatter::OutputFormat;

/// A downloadable artifact of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub job_id: String,
    pub format: OutputFormat,
    pub path: PathBuf,
    /// Suggested download name, e.g. `transcript_talk.mp3.srt`.
    pub file_name: String,
    pub content_type: String,
}

impl Artifact {
    pub fn new(job_id: &str, format: OutputFormat, path: PathBuf, source_filename: &str) -> Self {
        let content_type = mime_guess::from_ext(format.extension())
            .first_or_octet_stream()
            .to_string();
        Self {
            job_id: job_id.to_string(),
            format,
            path,
            file_name: format!("transcript_{}.{}", source_filename, format.extension()),
            content_type,
        }
    }

    pub fn read(&self) -> Result<Vec<u8>, StorageError> {
        std::fs::read(&self.path).map_err(|e| StorageError::ReadFile {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Writes artifacts as `<directory>/<job_id>.<ext>`.
pub struct ArtifactStore {
    directory: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, job_id: &str, format: OutputFormat) -> PathBuf {
        self.directory
            .join(format!("{}.{}", job_id, format.extension()))
    }

    /// Writes `content` via a temporary file and a rename, so readers never
    /// observe a partially written artifact.
    pub fn write(
        &self,
        job_id: &str,
        format: OutputFormat,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        self.ensure_directory()?;

        let final_path = self.path_for(job_id, format);
        let temp_path = self
            .directory
            .join(format!(".{}.{}.partial", job_id, format.extension()));

        let write_temp = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(content)?;
            file.sync_all()
        };
        if let Err(e) = write_temp() {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::WriteFile {
                path: final_path,
                source: e,
            });
        }

        std::fs::rename(&temp_path, &final_path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            StorageError::WriteFile {
                path: final_path.clone(),
                source: e,
            }
        })?;

        Ok(final_path)
    }

    /// Removes every artifact (and leftover partial file) of a job.
    pub fn remove_all(&self, job_id: &str) -> Result<(), StorageError> {
        for format in OutputFormat::ALL {
            let candidates = [
                self.path_for(job_id, format),
                self.directory
                    .join(format!(".{}.{}.partial", job_id, format.extension())),
            ];
            for path in candidates {
                match std::fs::remove_file(&path) {
                    Ok(()) => log::debug!("Removed artifact {}", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(StorageError::RemoveFile { path, source: e }),
                }
            }
        }
        Ok(())
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
