//! `keyflow extract` — extract keys from pre-existing projects,
//! optionally enabling the service first. Reuses the same pipeline
//! stages as a full provision run, just entering later.

use anyhow::bail;
use colored::Colorize;
use keyflow_cloud_gcloud::GcloudProvider;
use keyflow_pipeline::{Pipeline, PipelineConfig, PipelineError, StartStage};
use std::path::PathBuf;
use std::sync::Arc;

pub async fn handle(
    projects: Vec<String>,
    from_file: Option<PathBuf>,
    enable: bool,
    concurrency: usize,
    service: String,
    output: PathBuf,
) -> anyhow::Result<()> {
    let items = super::collect_items(projects, from_file.as_deref())?;

    let config = PipelineConfig {
        capability: service,
        concurrency,
        output_dir: output,
        ..Default::default()
    };

    let provider = Arc::new(GcloudProvider::new());
    let pipeline = Pipeline::new(provider, config);
    super::install_interrupt_handler(pipeline.cancel_token());

    let start = if enable {
        StartStage::Enable
    } else {
        StartStage::Extract
    };

    println!(
        "{}",
        format!("Extracting keys from {} project(s)...", items.len()).cyan()
    );

    match pipeline.run_from(items, start).await {
        Ok(report) => {
            println!();
            print!("{}", report);

            if report.credentials == 0 {
                bail!("no credentials were extracted");
            }

            println!("{}", "Done ✓".green());
            Ok(())
        }
        Err(err @ PipelineError::StageAborted { .. }) => {
            eprintln!("{}", err.to_string().red());
            bail!("extraction aborted");
        }
        Err(PipelineError::Interrupted) => {
            eprintln!("{}", "run interrupted; partial results were flushed".yellow());
            bail!("extraction interrupted");
        }
        Err(err) => Err(err.into()),
    }
}
