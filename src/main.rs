use clap::Parser;

use watchbridge::cli::commands::{init, serve};
use watchbridge::cli::{Cli, Commands};
use watchbridge::config::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;

    watchbridge::logging::init_with_config(&config.logging);

    match cli.command {
        Commands::Init { force } => init::run_init(force),
        Commands::Config => init::run_config(&config),
        Commands::Serve {
            files,
            dirs,
            recursive_dirs,
            case_insensitive,
        } => {
            let args = serve::ServeArgs {
                files,
                dirs,
                recursive_dirs,
                case_insensitive,
            };
            serve::run(args, &config).await
        }
    }
}
