//! `keyflow auth` — surface the provider's authentication status.

use anyhow::bail;
use colored::Colorize;
use keyflow_cloud::ResourceProvider;
use keyflow_cloud_gcloud::GcloudProvider;

pub async fn handle() -> anyhow::Result<()> {
    let provider = GcloudProvider::new();
    let status = provider.check_auth().await?;

    if status.authenticated {
        println!(
            "{} {}",
            "Authenticated:".green(),
            status.account_info.unwrap_or_else(|| "unknown account".to_string())
        );
        Ok(())
    } else {
        eprintln!(
            "{} {}",
            "Not authenticated:".red(),
            status.error.unwrap_or_else(|| "unknown reason".to_string())
        );
        bail!("gcloud authentication check failed");
    }
}
