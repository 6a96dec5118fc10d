//! dh CLI
//!
//! Command-line interface for dh - bookmark directories and jump back to them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dh_core::{BookmarkError, Bookmarks, Config};

mod commands;
mod output;

use commands::Command;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "dh")]
#[command(about = "dh - bookmark directories and jump back to them")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log store activity to stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use this store file instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Read configuration from this file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bookmark the current directory under KEY
    Add {
        /// Bookmark name
        key: Option<String>,
    },
    /// List all bookmarks
    #[command(alias = "ls")]
    List,
    /// Print the directory bookmarked under KEY
    Goto {
        /// Bookmark name
        key: Option<String>,
    },
    /// Remove the bookmark under KEY
    #[command(alias = "rm")]
    Delete {
        /// Bookmark name
        key: Option<String>,
    },
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Add { key } => Command::Add { key },
            Commands::List => Command::List,
            Commands::Goto { key } => Command::Goto { key },
            Commands::Delete { key } => Command::Delete { key },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let Some(command) = cli.command.map(Command::from) else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let mut config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }

    init_logging(&config, cli.verbose);
    command.validate()?;

    let mut bookmarks = open_store(&command, &config)?;
    commands::run(command, &mut bookmarks, &output)?;
    bookmarks.close()?;

    Ok(())
}

/// Open the store the way `command` needs it
///
/// Read-only commands take a shared lock when the store already exists,
/// so they never wait on each other.
fn open_store(command: &Command, config: &Config) -> Result<Bookmarks> {
    let bookmarks = if command.is_read_only() && config.store_path.exists() {
        debug!("Opening {:?} read-only", config.store_path);
        Bookmarks::open_read_only(config)
    } else {
        Bookmarks::open(config)
    };

    bookmarks.map_err(|e| {
        let mut message = format!("Failed to open bookmark store {}", config.store_path.display());
        if let BookmarkError::Store(store_err) = &e {
            if let Some(hint) = store_err.recovery_suggestion() {
                message.push_str(". ");
                message.push_str(hint);
            }
        }
        anyhow::Error::new(e).context(message)
    })
}

/// Send diagnostics to stderr so stdout stays clean for `goto`
fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_new(format!("dh_core={0},dh={0}", level))
        .unwrap_or_else(|_| EnvFilter::new("dh_core=warn,dh=warn"));

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init();
}
