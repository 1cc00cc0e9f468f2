pub mod auth;
pub mod cleanup;
pub mod extract;
pub mod provision;

use anyhow::Context;
use keyflow_pipeline::WorkItem;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Collect work items from positional arguments and/or a list file.
pub fn collect_items(
    projects: Vec<String>,
    from_file: Option<&Path>,
) -> anyhow::Result<Vec<WorkItem>> {
    let mut items: Vec<WorkItem> = projects.into_iter().map(WorkItem::new).collect();

    if let Some(path) = from_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading project list {}", path.display()))?;
        items.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(WorkItem::new),
        );
    }

    anyhow::ensure!(
        !items.is_empty(),
        "no project ids given; pass them as arguments or via --from-file"
    );
    Ok(items)
}

/// Cancel the pipeline on Ctrl-C so in-flight tasks can wind down and
/// the credential files still get flushed.
pub fn install_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("interrupt received, finishing in-flight work...");
            cancel.cancel();
        }
    });
}
