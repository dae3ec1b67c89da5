use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Metrics file not found at {0}")]
    Missing(PathBuf),
    #[error("Failed to read metrics file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse metrics file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Loads the metrics document written by the training pipeline. The schema
/// belongs to the pipeline, so it is passed through untouched.
pub async fn read_metrics_artifact(path: &Path) -> Result<serde_json::Value, ArtifactError> {
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArtifactError::Missing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    Ok(serde_json::from_slice(&contents)?)
}
