//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(name = "watchbridge")]
#[command(version, about = "Refcounted watch registry speaking the tsserver watch protocol over stdio")]
#[command(styles = clap_cargo_style())]
pub struct Cli {
    /// Path to a settings file (defaults to .watchbridge/settings.toml)
    #[arg(short, long, global = true, env = "WATCHBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .watchbridge directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration
    #[command(about = "Display active settings")]
    Config,

    /// Serve the watch protocol on stdin/stdout
    #[command(about = "Bridge watch requests over stdio until input closes")]
    Serve {
        /// Files to watch
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<String>,

        /// Directories to watch (non-recursive)
        #[arg(long = "dir", value_name = "PATH")]
        dirs: Vec<String>,

        /// Directories to watch recursively
        #[arg(long = "recursive-dir", value_name = "PATH")]
        recursive_dirs: Vec<String>,

        /// Fold path case when deduplicating watches (overrides config)
        #[arg(long)]
        case_insensitive: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from([
            "watchbridge",
            "serve",
            "--file",
            "/x/a.ts",
            "--recursive-dir",
            "/x",
            "--case-insensitive",
        ]);
        match cli.command {
            Commands::Serve {
                files,
                dirs,
                recursive_dirs,
                case_insensitive,
            } => {
                assert_eq!(files, vec!["/x/a.ts".to_string()]);
                assert!(dirs.is_empty());
                assert_eq!(recursive_dirs, vec!["/x".to_string()]);
                assert!(case_insensitive);
            }
            _ => panic!("expected serve"),
        }
    }
}
