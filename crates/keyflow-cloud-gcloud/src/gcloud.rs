//! gcloud CLI wrapper
//!
//! Wraps the gcloud CLI commands for Google Cloud project, service, and
//! API key operations. All commands run with `--quiet` so gcloud never
//! prompts, and JSON output is requested wherever a payload is parsed.

use crate::error::{GcloudError, Result};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// gcloud CLI wrapper
pub struct Gcloud {
    binary: String,
}

impl Gcloud {
    pub fn new() -> Self {
        Self {
            binary: "gcloud".to_string(),
        }
    }

    /// Override the gcloud binary path (used by tests and sandboxes)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check if gcloud is installed and authenticated
    pub async fn check_auth(&self) -> Result<Vec<AccountInfo>> {
        let which = Command::new("which").arg(&self.binary).output().await?;

        if !which.status.success() {
            return Err(GcloudError::GcloudNotFound);
        }

        let output = self
            .run_command(&["auth", "list", "--format=json"])
            .await?;

        let accounts: Vec<AccountInfo> = serde_json::from_str(&output)?;
        Ok(accounts)
    }

    /// Run a gcloud command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: gcloud {}", args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GcloudError::CommandFailed(stderr.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Create a project
    pub async fn create_project(&self, project_id: &str) -> Result<()> {
        self.run_command(&["projects", "create", project_id, "--quiet"])
            .await?;
        Ok(())
    }

    /// Delete a project
    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.run_command(&["projects", "delete", project_id, "--quiet"])
            .await?;
        Ok(())
    }

    /// Describe a project; returns None if it does not exist
    pub async fn describe_project(&self, project_id: &str) -> Result<Option<ProjectInfo>> {
        match self
            .run_command(&["projects", "describe", project_id, "--format=json"])
            .await
        {
            Ok(output) => {
                let info: ProjectInfo = serde_json::from_str(&output)?;
                Ok(Some(info))
            }
            Err(GcloudError::CommandFailed(msg))
                if msg.to_lowercase().contains("not found")
                    || msg.to_lowercase().contains("does not exist") =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Enable a service on a project
    pub async fn enable_service(&self, project_id: &str, service: &str) -> Result<()> {
        self.run_command(&["services", "enable", service, "--project", project_id, "--quiet"])
            .await?;
        Ok(())
    }

    /// List API keys on a project
    pub async fn list_api_keys(&self, project_id: &str) -> Result<Vec<ApiKeyInfo>> {
        let output = self
            .run_command(&[
                "services",
                "api-keys",
                "list",
                "--project",
                project_id,
                "--format=json",
            ])
            .await?;

        if output.trim().is_empty() || output.trim() == "[]" {
            return Ok(Vec::new());
        }

        let keys: Vec<ApiKeyInfo> = serde_json::from_str(&output)?;
        Ok(keys)
    }

    /// Fetch the secret value of an existing API key
    pub async fn get_key_string(&self, key_name: &str) -> Result<Option<String>> {
        let output = self
            .run_command(&[
                "services",
                "api-keys",
                "get-key-string",
                key_name,
                "--format=json",
            ])
            .await?;

        let parsed: KeyString = serde_json::from_str(&output)?;
        Ok(parsed.key_string)
    }

    /// Create an API key on a project, returning the raw JSON payload
    pub async fn create_api_key(&self, project_id: &str, display_name: &str) -> Result<String> {
        self.run_command(&[
            "services",
            "api-keys",
            "create",
            "--project",
            project_id,
            "--display-name",
            display_name,
            "--format=json",
        ])
        .await
    }
}

impl Default for Gcloud {
    fn default() -> Self {
        Self::new()
    }
}

/// Authenticated account from `gcloud auth list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account: String,

    pub status: Option<String>,
}

impl AccountInfo {
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("ACTIVE")
    }
}

/// Project information from `gcloud projects describe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(rename = "projectId")]
    pub project_id: String,

    pub name: Option<String>,

    #[serde(rename = "lifecycleState")]
    pub lifecycle_state: Option<String>,
}

impl ProjectInfo {
    pub fn is_active(&self) -> bool {
        self.lifecycle_state.as_deref() == Some("ACTIVE")
    }
}

/// API key entry from `gcloud services api-keys list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyInfo {
    pub name: String,

    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyString {
    #[serde(rename = "keyString")]
    key_string: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_info_active() {
        let account = AccountInfo {
            account: "dev@example.com".to_string(),
            status: Some("ACTIVE".to_string()),
        };
        assert!(account.is_active());

        let inactive = AccountInfo {
            account: "other@example.com".to_string(),
            status: None,
        };
        assert!(!inactive.is_active());
    }

    #[test]
    fn test_project_info_parse() {
        let json = r#"{"projectId":"keyflow-ab12cd-001","name":"keyflow","lifecycleState":"ACTIVE"}"#;
        let info: ProjectInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.project_id, "keyflow-ab12cd-001");
        assert!(info.is_active());
    }

    #[test]
    fn test_api_key_list_parse() {
        let json = r#"[{"name":"projects/1/locations/global/keys/k1","displayName":"keyflow"}]"#;
        let keys: Vec<ApiKeyInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].display_name.as_deref(), Some("keyflow"));
    }
}
