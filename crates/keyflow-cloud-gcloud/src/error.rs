//! gcloud provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcloudError {
    #[error("gcloud not found. Please install the Google Cloud SDK: https://cloud.google.com/sdk")]
    GcloudNotFound,

    #[error("gcloud authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("gcloud command failed: {0}")]
    CommandFailed(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] keyflow_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, GcloudError>;
