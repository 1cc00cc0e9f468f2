//! `keyflow provision` — the full create → enable → extract batch run.

use anyhow::bail;
use colored::Colorize;
use keyflow_cloud_gcloud::GcloudProvider;
use keyflow_pipeline::{Pipeline, PipelineConfig, PipelineError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[allow(clippy::too_many_arguments)]
pub async fn handle(
    count: usize,
    prefix: String,
    concurrency: usize,
    service: String,
    settle: u64,
    output: PathBuf,
    no_breaker: bool,
) -> anyhow::Result<()> {
    let config = PipelineConfig {
        prefix,
        capability: service.clone(),
        concurrency,
        settle_wait: Duration::from_secs(settle),
        breaker_enabled: !no_breaker,
        output_dir: output,
        ..Default::default()
    };

    let provider = Arc::new(GcloudProvider::new());
    let pipeline = Pipeline::new(provider, config);
    super::install_interrupt_handler(pipeline.cancel_token());

    tracing::info!(count, concurrency, service = %service, "starting provisioning run");
    println!(
        "{}",
        format!(
            "Provisioning {} project(s), enabling {}...",
            count, service
        )
        .cyan()
    );

    match pipeline.provision(count).await {
        Ok(report) => {
            println!();
            print!("{}", report);

            if report.credentials == 0 {
                bail!("run completed but no credentials were extracted");
            }

            println!("{}", "Done ✓".green());
            Ok(())
        }
        Err(err @ PipelineError::StageAborted { .. }) => {
            eprintln!("{}", err.to_string().red());
            bail!("provisioning aborted");
        }
        Err(PipelineError::Interrupted) => {
            eprintln!("{}", "run interrupted; partial results were flushed".yellow());
            bail!("provisioning interrupted");
        }
        Err(err) => Err(err.into()),
    }
}
