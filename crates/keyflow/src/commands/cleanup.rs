//! `keyflow cleanup` — delete projects left behind by earlier runs.

use anyhow::bail;
use colored::Colorize;
use keyflow_cloud_gcloud::GcloudProvider;
use keyflow_pipeline::{Pipeline, PipelineConfig, StageKind};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn handle(
    projects: Vec<String>,
    from_file: Option<PathBuf>,
    concurrency: usize,
    yes: bool,
) -> anyhow::Result<()> {
    let items = super::collect_items(projects, from_file.as_deref())?;

    if !yes {
        print!(
            "{}",
            format!("Delete {} project(s)? [y/N] ", items.len()).yellow()
        );
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("aborted");
            return Ok(());
        }
    }

    let config = PipelineConfig {
        concurrency,
        ..Default::default()
    };

    let provider = Arc::new(GcloudProvider::new());
    let pipeline = Pipeline::new(provider, config);
    super::install_interrupt_handler(pipeline.cancel_token());

    let report = pipeline.cleanup(items).await?;
    let stats = report
        .stage(StageKind::Cleanup)
        .unwrap_or_default();

    println!(
        "{}",
        format!(
            "Deleted {} of {} project(s) ({} failed, {} skipped)",
            stats.succeeded, stats.attempted, stats.failed, stats.skipped
        )
        .green()
    );

    if stats.failed > 0 {
        bail!("{} project(s) could not be deleted", stats.failed);
    }
    Ok(())
}
