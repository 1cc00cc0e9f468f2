//! Resource provider trait definition

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cloud resource provider abstraction
///
/// A provider performs the actual project/service/credential operations
/// against a cloud API. The pipeline only ever talks to this trait; the
/// concrete implementation (gcloud CLI, a mock, etc.) lives elsewhere.
///
/// Errors must carry the provider's human-readable message so the retry
/// executor can classify them via [`crate::classify`].
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Returns the provider name (e.g., "gcloud")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Create a project/resource with the given identifier
    async fn create_resource(&self, id: &str) -> Result<()>;

    /// Enable a service/capability on an existing resource
    async fn enable_capability(&self, id: &str, capability: &str) -> Result<()>;

    /// List credentials already attached to a resource
    async fn list_credentials(&self, id: &str) -> Result<Vec<CredentialRef>>;

    /// Mint a new credential on a resource, returning the raw payload
    async fn create_credential(&self, id: &str) -> Result<RawResponse>;

    /// Delete a resource
    async fn delete_resource(&self, id: &str) -> Result<()>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Reference to a credential already attached to a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRef {
    /// Provider-side credential name/id
    pub name: String,

    /// Human-readable label, if the provider has one
    pub display_name: Option<String>,

    /// The secret value, when the listing includes it
    pub key_string: Option<String>,
}

/// Raw payload returned by a credential-minting operation, before decoding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResponse {
    pub body: String,
}

impl RawResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}
