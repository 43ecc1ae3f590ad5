//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Comic Layout Designer - local workspace server for laying out comic pages.
///
/// Robot Mode: Use --robot or --format json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "cld", version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)] // CLI flags naturally use multiple bools
pub struct Cli {
    /// Output format (text for humans, json for agents/scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "CLD_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Workspace data directory (default: ~/.comic-layout-designer)
    #[arg(long, global = true, env = "CLD_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // === Server ===
    /// Run the editor backend over HTTP
    Serve(ServeArgs),

    // === Snapshots ===
    /// Write a snapshot archive of the workspace
    Export(ExportArgs),

    /// Replace the workspace with a snapshot archive
    Import(ImportArgs),

    // === Workspace ===
    /// Delete all images and pages
    Reset(ResetArgs),

    /// Show image count, page count, and watermark
    Status,

    /// List available page layouts
    Layouts(LayoutsArgs),

    // === Utilities ===
    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// === Argument Structs ===

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides config.toml)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Bind address (overrides config.toml)
    #[arg(long)]
    pub bind: Option<String>,

    /// Load layouts from this directory instead of the bundled set
    #[arg(long, value_name = "DIR")]
    pub layouts_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Where to write the archive (default: a uniquely named
    /// comic-state-<watermark>-*.zip in the system temp directory)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Snapshot archive (.zip) produced by `cld export`
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Skip the confirmation check
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct LayoutsArgs {
    /// Load layouts from this directory instead of the bundled set
    #[arg(long, value_name = "DIR")]
    pub layouts_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
