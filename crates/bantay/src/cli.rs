//! Clap derive structures for the `bantay` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// bantay -- companion CLI for BantayBot scarecrow boards
#[derive(Debug, Parser)]
#[command(
    name = "bantay",
    version,
    about = "Monitor and control BantayBot boards from the command line",
    long_about = "Connects to the BantayBot main and camera boards over WebSocket,\n\
        records motion and environmental history, and sends control commands.\n\
        Falls back to the cloud command store when the boards are unreachable.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file to use instead of the platform default
    #[arg(long, short = 'C', env = "BANTAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BANTAY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to both boards and stream events
    #[command(alias = "mon", alias = "m")]
    Monitor(MonitorArgs),

    /// Connect once and report link status
    Status,

    /// Inspect, export or clear recorded history
    #[command(alias = "hist")]
    History(HistoryArgs),

    /// Send a command to the board that executes it
    Send(SendArgs),

    /// List the known board commands
    Commands,

    /// Set the speaker volume (0-100)
    #[command(alias = "vol")]
    Volume(VolumeArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Monitor ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Stop after this long (e.g. "30s", "5m"); runs until Ctrl-C otherwise
    #[arg(long, short = 'd')]
    pub duration: Option<String>,

    /// Only print these event kinds (repeatable, e.g. --only alert)
    #[arg(long)]
    pub only: Vec<String>,

    /// Do not record history while monitoring
    #[arg(long)]
    pub no_history: bool,
}

// ── History ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Show recorded motion events, newest first
    Motion {
        /// Max entries to show
        #[arg(long, short = 'l', default_value = "25")]
        limit: usize,
    },

    /// Show recorded environmental samples, newest first
    Env {
        /// Max entries to show
        #[arg(long, short = 'l', default_value = "25")]
        limit: usize,
    },

    /// Today's motion counts by hour
    Stats,

    /// Environmental samples from the last N hours
    Recent {
        /// Window size in hours
        #[arg(long, default_value = "24")]
        hours: u32,
    },

    /// Write both logs to a dated JSON file
    Export {
        /// Target directory (defaults to the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete all recorded history
    Clear,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Command name (see `bantay commands`)
    pub command: String,

    /// Command parameter as key=value; values are parsed as JSON when possible
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Full parameter object as JSON
    #[arg(long, conflicts_with = "params")]
    pub json: Option<String>,
}

#[derive(Debug, Args)]
pub struct VolumeArgs {
    /// Volume on the app scale
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub value: u8,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display the resolved configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Store the cloud API key in the system keyring
    SetKey,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
