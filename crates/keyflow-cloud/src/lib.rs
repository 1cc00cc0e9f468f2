//! Keyflow Cloud Provider Abstraction
//!
//! This crate defines the provider interface used by the Keyflow pipeline
//! to create projects, enable services, and mint credentials, independent
//! of any concrete cloud vendor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  Keyflow CLI                     │
//! │           (keyflow provision/extract)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │              keyflow-pipeline                    │
//! │   (stages, retry, concurrency, credential sink)  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               keyflow-cloud                      │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │         Provider Abstraction              │   │
//! │  │  trait ResourceProvider { ... }           │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────────────┐    │
//! │  │  ErrorClass  │  │  Credential Decoder  │    │
//! │  └──────────────┘  └──────────────────────┘    │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │    gcloud     │
//! │   provider    │
//! └───────────────┘
//! ```

pub mod decode;
pub mod error;
pub mod provider;

// Re-exports
pub use decode::decode_credential_value;
pub use error::{classify, CloudError, ErrorClass, Result};
pub use provider::{AuthStatus, CredentialRef, RawResponse, ResourceProvider};
