mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keyflow")]
#[command(about = "Bulk Google Cloud project provisioning and API key extraction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create projects, enable the service, and extract API keys
    Provision {
        /// Number of projects to create
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,

        /// Project id prefix
        #[arg(short, long, default_value = "keyflow")]
        prefix: String,

        /// Concurrent operations per stage
        #[arg(short = 'j', long, default_value_t = 5)]
        concurrency: usize,

        /// Service to enable on each created project
        #[arg(
            long,
            env = "KEYFLOW_SERVICE",
            default_value = "generativelanguage.googleapis.com"
        )]
        service: String,

        /// Seconds to let created projects settle before enabling
        #[arg(long, default_value_t = 20)]
        settle: u64,

        /// Directory for the credential output files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Disable the failure-rate circuit breaker
        #[arg(long)]
        no_breaker: bool,
    },
    /// Extract API keys from existing projects
    Extract {
        /// Project ids (or use --from-file)
        projects: Vec<String>,

        /// File with one project id per line
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Enable the service before extracting
        #[arg(long)]
        enable: bool,

        /// Concurrent operations per stage
        #[arg(short = 'j', long, default_value_t = 5)]
        concurrency: usize,

        /// Service to enable when --enable is set
        #[arg(
            long,
            env = "KEYFLOW_SERVICE",
            default_value = "generativelanguage.googleapis.com"
        )]
        service: String,

        /// Directory for the credential output files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Delete projects from a previous run
    Cleanup {
        /// Project ids (or use --from-file)
        projects: Vec<String>,

        /// File with one project id per line
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Concurrent delete operations
        #[arg(short = 'j', long, default_value_t = 5)]
        concurrency: usize,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Check gcloud authentication status
    Auth,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Provision {
            count,
            prefix,
            concurrency,
            service,
            settle,
            output,
            no_breaker,
        } => {
            commands::provision::handle(
                count,
                prefix,
                concurrency,
                service,
                settle,
                output,
                no_breaker,
            )
            .await
        }
        Commands::Extract {
            projects,
            from_file,
            enable,
            concurrency,
            service,
            output,
        } => {
            commands::extract::handle(projects, from_file, enable, concurrency, service, output)
                .await
        }
        Commands::Cleanup {
            projects,
            from_file,
            concurrency,
            yes,
        } => commands::cleanup::handle(projects, from_file, concurrency, yes).await,
        Commands::Auth => commands::auth::handle().await,
        Commands::Version => {
            println!("keyflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
