//! Google Cloud provider implementation

use crate::error::GcloudError;
use crate::gcloud::Gcloud;
use async_trait::async_trait;
use keyflow_cloud::{AuthStatus, CloudError, CredentialRef, RawResponse, ResourceProvider};

/// Display name attached to API keys minted by this provider
const KEY_DISPLAY_NAME: &str = "keyflow";

/// Google Cloud provider backed by the gcloud CLI
pub struct GcloudProvider {
    gcloud: Gcloud,
}

impl GcloudProvider {
    pub fn new() -> Self {
        Self {
            gcloud: Gcloud::new(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            gcloud: Gcloud::with_binary(binary),
        }
    }
}

impl Default for GcloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a gcloud error into the provider-agnostic error type.
///
/// Command failures keep the raw stderr text so the retry executor can
/// classify the failure from gcloud's own message.
fn map_err(err: GcloudError) -> CloudError {
    match err {
        GcloudError::CommandFailed(msg) => CloudError::CommandFailed(msg),
        GcloudError::AuthenticationFailed(msg) => CloudError::AuthenticationFailed(msg),
        GcloudError::GcloudNotFound => {
            CloudError::InvalidConfig("gcloud CLI is not installed".to_string())
        }
        GcloudError::ProjectNotFound(id) => CloudError::ResourceNotFound(id),
        GcloudError::JsonError(e) => CloudError::Json(e),
        GcloudError::IoError(e) => CloudError::Io(e),
        GcloudError::CloudError(e) => e,
    }
}

#[async_trait]
impl ResourceProvider for GcloudProvider {
    fn name(&self) -> &str {
        "gcloud"
    }

    fn display_name(&self) -> &str {
        "Google Cloud"
    }

    async fn check_auth(&self) -> keyflow_cloud::Result<AuthStatus> {
        match self.gcloud.check_auth().await {
            Ok(accounts) => match accounts.iter().find(|a| a.is_active()) {
                Some(active) => Ok(AuthStatus::ok(active.account.clone())),
                None => Ok(AuthStatus::failed(
                    "no active gcloud account; run `gcloud auth login`",
                )),
            },
            Err(GcloudError::GcloudNotFound) => {
                Ok(AuthStatus::failed("gcloud CLI is not installed"))
            }
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn create_resource(&self, id: &str) -> keyflow_cloud::Result<()> {
        self.gcloud.create_project(id).await.map_err(map_err)
    }

    async fn enable_capability(&self, id: &str, capability: &str) -> keyflow_cloud::Result<()> {
        self.gcloud
            .enable_service(id, capability)
            .await
            .map_err(map_err)
    }

    async fn list_credentials(&self, id: &str) -> keyflow_cloud::Result<Vec<CredentialRef>> {
        let keys = self.gcloud.list_api_keys(id).await.map_err(map_err)?;

        let mut refs = Vec::with_capacity(keys.len());
        for key in keys {
            // The list call does not include secret values; fetch each one.
            let key_string = self
                .gcloud
                .get_key_string(&key.name)
                .await
                .map_err(map_err)?;

            refs.push(CredentialRef {
                name: key.name,
                display_name: key.display_name,
                key_string,
            });
        }

        Ok(refs)
    }

    async fn create_credential(&self, id: &str) -> keyflow_cloud::Result<RawResponse> {
        let body = self
            .gcloud
            .create_api_key(id, KEY_DISPLAY_NAME)
            .await
            .map_err(map_err)?;

        Ok(RawResponse::new(body))
    }

    async fn delete_resource(&self, id: &str) -> keyflow_cloud::Result<()> {
        self.gcloud.delete_project(id).await.map_err(map_err)
    }
}
