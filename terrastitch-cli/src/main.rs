//! terrastitch CLI - Command-line interface
//!
//! `terrastitch <input> <output> <zoom>` stitches the elevation tiles covering
//! a GeoJSON feature collection into `<output>.png` plus `<output>Bounds.json`.
//! Subcommands manage the access token, configuration and tile cache.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::stitch::StitchArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "terrastitch")]
#[command(version, about = "Stitch elevation tiles covering GeoJSON features into one raster")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    stitch: Option<StitchArgs>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stitch the tiles covering a feature collection (default command)
    Stitch(StitchArgs),

    /// Prompt for a Mapbox access token and save it
    Token {
        /// Ignored, so `terrastitch token <OUTPUT> <ZOOM>` also sets the token
        #[arg(hide = true)]
        rest: Vec<String>,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Manage tile directories left by previous runs
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match (cli.command, cli.stitch) {
        (Some(Commands::Stitch(args)), _) | (None, Some(args)) => commands::stitch::run(args),
        (Some(Commands::Token { .. }), _) => commands::token::run(),
        (Some(Commands::Config { command }), _) => commands::config::run(command),
        (Some(Commands::Cache { action }), _) => commands::cache::run(action),
        (None, None) => Err(CliError::Config(
            "missing arguments: terrastitch <INPUT> <OUTPUT> <ZOOM> (see --help)".to_string(),
        )),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_positionals_stitch() {
        let cli = Cli::try_parse_from(["terrastitch", "ridge.json", "ridge", "12"]).unwrap();
        assert!(cli.command.is_none());
        let args = cli.stitch.unwrap();
        assert_eq!(args.zoom, 12);
        assert_eq!(args.output, std::path::PathBuf::from("ridge"));
    }

    #[test]
    fn test_token_accepts_positional_stitch_form() {
        let cli = Cli::try_parse_from(["terrastitch", "token", "ridge", "12"]).unwrap();
        match cli.command {
            Some(Commands::Token { rest }) => assert_eq!(rest, vec!["ridge", "12"]),
            _ => panic!("expected token"),
        }
        assert!(cli.stitch.is_none());
    }

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::try_parse_from(["terrastitch", "config", "get", "download.parallel"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config { .. })));

        let cli = Cli::try_parse_from(["terrastitch", "token"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Token { .. })));

        let cli = Cli::try_parse_from(["terrastitch", "stitch", "a.json", "a", "3", "--no-fill"])
            .unwrap();
        match cli.command {
            Some(Commands::Stitch(args)) => assert!(args.no_fill),
            _ => panic!("expected stitch"),
        }
    }
}
