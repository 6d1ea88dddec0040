//! CLI argument definitions for the `stackwatch` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Tracking-driven download orchestrator and library importer for periodicals.
#[derive(Parser, Debug)]
#[command(name = "stackwatch")]
#[command(author, version, about)]
pub struct Args {
    /// Path to the TOML config file (defaults to the platform config dir).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scheduler loop (download monitor, auto-download, cover cleanup)
    /// until interrupted. This is the long-running daemon entry point.
    Run,

    /// Manage tracked periodical titles.
    Track {
        #[command(subcommand)]
        command: TrackCommand,
    },

    /// Inspect the library catalog.
    Library {
        #[command(subcommand)]
        command: LibraryCommand,
    },

    /// Manually run the Import Pipeline on a single file.
    Import(ImportArgs),

    /// Manage the single-user credential store.
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand, Debug)]
pub enum TrackCommand {
    /// Start (or update) tracking a title.
    Add(TrackAddArgs),
    /// List tracking records with an active acquisition mode.
    List,
    /// Stop tracking a title by its `olid`.
    Remove {
        /// The tracking record's `olid`.
        olid: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct TrackAddArgs {
    /// Canonical title to track (run through the Title Normalizer).
    pub title: String,

    /// Stable external identity; defaults to a slug of the cleaned title.
    #[arg(long)]
    pub olid: Option<String>,

    #[arg(long, default_value = "English")]
    pub language: String,

    #[arg(long, default_value = "Magazines")]
    pub category: String,

    /// Acquisition mode: all editions, new-only, or watch (selected editions only).
    #[arg(long, value_enum, default_value_t = TrackMode::All)]
    pub mode: TrackMode,

    /// Restrict `all`-mode tracking to these publication years (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub years: Vec<i32>,

    /// Delete a job from the download client once it has been imported.
    #[arg(long)]
    pub delete_on_completion: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackMode {
    All,
    New,
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum LibraryCommand {
    /// List every catalogued library entry.
    List,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Path to the downloaded file.
    pub path: PathBuf,

    /// Catalog the file without moving it to the organize tree.
    #[arg(long)]
    pub in_place: bool,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Set the initial (and only) username/password. Fails if already set.
    SetPassword {
        #[arg(long)]
        username: String,
    },
}
