//! Generated source files
//!
//! The persistence sink for pipeline output: plain text files under an
//! output directory, overwritten on every save.

mod fence;

pub use fence::extract_code;

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Generated API implementation
pub const API_FILE: &str = "generated_api.py";
/// Generated pytest suite
pub const TESTS_FILE: &str = "generated_api_tests.py";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Artifact not found: {0}")]
    NotFound(String),
}

impl ArtifactError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return ArtifactError::NotFound(path.display().to_string());
        }
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Artifacts stored as files under a root directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Write `content` to `filename`, replacing whatever was there.
    ///
    /// Not atomic: a failure mid-write can leave a partial file.
    pub async fn save(&self, content: &str, filename: &str) -> Result<PathBuf, ArtifactError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ArtifactError::io(&self.root, e))?;

        let path = self.path_of(filename);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ArtifactError::io(&path, e))?;

        tracing::info!(path = %path.display(), bytes = content.len(), "Artifact saved");
        Ok(path)
    }

    pub async fn load(&self, filename: &str) -> Result<String, ArtifactError> {
        let path = self.path_of(filename);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ArtifactError::io(&path, e))
    }
}
