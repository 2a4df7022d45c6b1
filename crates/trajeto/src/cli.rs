//! Clap derive structures for the `trajeto` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.
//! Also compiled by `build.rs` for man pages, so it may only use clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// trajeto -- real-time notifications for school-transport operators
#[derive(Debug, Parser)]
#[command(
    name = "trajeto",
    version,
    about = "Follow Trajeto marketplace notifications from the terminal",
    long_about = "Streams live notifications over the real-time channel, falling back\n\
        to HTTP polling when the channel cannot be kept open, and keeps a\n\
        local history of everything received.",
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
    /// Profile to use
    #[arg(long, short = 'p', env = "TRAJETO_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Real-time channel URL, ws:// or wss:// (overrides profile)
    #[arg(long, short = 's', env = "TRAJETO_SERVER", global = true)]
    pub server: Option<String>,

    /// Session token
    #[arg(long, env = "TRAJETO_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Notification history file (overrides profile)
    #[arg(long, env = "TRAJETO_HISTORY_FILE", global = true)]
    pub history_file: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TRAJETO_OUTPUT",
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Notification urgency, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum PriorityArg {
    Baixa,
    Media,
    Alta,
    Critica,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live notifications until interrupted
    #[command(alias = "l")]
    Listen(ListenArgs),

    /// Inspect and manage the local notification history
    #[command(alias = "h")]
    History(HistoryArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LISTEN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Only show notifications of this type (repeatable)
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub kinds: Vec<String>,

    /// Hide notifications below this priority
    #[arg(long, value_enum)]
    pub min_priority: Option<PriorityArg>,

    /// Exit after this many notifications have been shown
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Print connection and lifecycle events to stderr
    #[arg(long)]
    pub show_events: bool,

    /// Do not ring the terminal bell for urgent notifications
    #[arg(long)]
    pub no_bell: bool,

    /// Disable the HTTP polling fallback
    #[arg(long)]
    pub no_fallback: bool,

    /// Reconnect attempts before degrading (overrides profile)
    #[arg(long)]
    pub max_reconnect_attempts: Option<u32>,

    /// Heartbeat period in seconds (overrides profile)
    #[arg(long)]
    pub heartbeat: Option<u64>,

    /// Log every inbound frame
    #[arg(long)]
    pub debug: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  HISTORY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List stored notifications, newest first
    #[command(alias = "ls")]
    List {
        /// Only unread entries
        #[arg(long, short = 'u')]
        unread: bool,

        /// Show at most this many entries
        #[arg(long, short = 'l')]
        limit: Option<usize>,
    },

    /// Mark one entry (or all) as read
    Read {
        /// Entry ID
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,

        /// Mark every entry as read
        #[arg(long)]
        all: bool,
    },

    /// Delete every stored notification
    Clear,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or extend the config file with guided setup
    Init,

    /// Display the current configuration (tokens redacted)
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a session token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
