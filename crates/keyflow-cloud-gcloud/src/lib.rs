//! Google Cloud provider for Keyflow
//!
//! Implements [`keyflow_cloud::ResourceProvider`] by wrapping the gcloud
//! CLI (projects, services, and api-keys command groups).

pub mod error;
pub mod gcloud;
pub mod provider;

// Re-exports
pub use error::{GcloudError, Result};
pub use gcloud::{AccountInfo, ApiKeyInfo, Gcloud, ProjectInfo};
pub use provider::GcloudProvider;
