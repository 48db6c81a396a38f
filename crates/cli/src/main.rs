use clap::Parser;
use ncli::{Commands, Runtime};
use ncli_config::Settings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ncli")]
#[command(about = "Client for a hosted document and database API", long_about = None)]
#[command(version)]
struct Cli {
    /// Emit debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace index file (defaults to the XDG cache location)
    #[arg(long, global = true, value_name = "PATH")]
    workspace_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    settings.verbose |= cli.verbose;

    if let Err(e) = ncli_utils::tracing::init(settings.verbose) {
        eprintln!("Failed to initialize tracing: {e}");
    }

    let runtime = Runtime::from_settings(settings, cli.workspace_file).await;
    let result = cli.command.execute(&runtime).await;
    runtime.shutdown().await;
    result
}
