//! Comic Layout Designer CLI - local workspace server and snapshot tool.
//!
//! Provides both human-friendly and agent-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use console::style;
use serde::Serialize;

use cld::archive::SnapshotArchiver;
use cld::cli::{self, Cli, Commands};
use cld::config::{DataPaths, Settings, expand_home};
use cld::error::{CldError, Result};
use cld::layout::LayoutCatalog;
use cld::logging;
use cld::web::{self, AppState};
use cld::workspace::Workspace;

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> &'static str {
        option_env!("VERGEN_GIT_DIRTY").unwrap_or("false")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

fn main() {
    let cli = Cli::parse();

    // Handle no-color flag or non-TTY
    if cli.no_color || !io::stdout().is_terminal() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    logging::init_logging(cli.use_json(), cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        output_error(&cli, &e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        None => print_quick_start(cli),
        Some(Commands::Serve(args)) => cmd_serve(cli, args),
        Some(Commands::Export(args)) => cmd_export(cli, args),
        Some(Commands::Import(args)) => cmd_import(cli, args),
        Some(Commands::Reset(args)) => cmd_reset(cli, args),
        Some(Commands::Status) => cmd_status(cli),
        Some(Commands::Layouts(args)) => cmd_layouts(cli, args),
        Some(Commands::Version) => cmd_version(cli),
        Some(Commands::Completions(args)) => cmd_completions(cli, args),
    }
}

// === Quick Start ===

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn print_quick_start(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        output_json(
            cli,
            &QuickStart {
                tool: "cld",
                version: build_info::VERSION,
                description: "Local comic page layout workspace with live sync and snapshots",
                commands: &[
                    ("serve", "cld serve --port 8080"),
                    ("status", "cld status --robot"),
                    ("export", "cld export --output backup.zip"),
                    ("import", "cld import backup.zip"),
                    ("reset", "cld reset --yes"),
                    ("layouts", "cld layouts --robot"),
                ],
                data_dir: "--data-dir <DIR> or CLD_DATA_DIR (default ~/.comic-layout-designer)",
            },
        );
        return Ok(());
    }

    println!(
        "{} {} - Comic Layout Designer\n",
        style("cld").bold().cyan(),
        build_info::VERSION
    );
    println!("{}", style("QUICK START").bold().underlined());
    println!();
    println!("  {}  Run the editor backend", style("cld serve").green());
    println!("  {}  Show workspace summary", style("cld status").green());
    println!("  {}  Save a snapshot", style("cld export -o backup.zip").green());
    println!("  {}  Restore a snapshot", style("cld import backup.zip").green());
    println!("  {}  List page layouts", style("cld layouts").green());
    println!();
    println!("Run {} for full help", style("cld --help").yellow());
    Ok(())
}

#[derive(Serialize)]
struct QuickStart {
    tool: &'static str,
    version: &'static str,
    description: &'static str,
    commands: &'static [(&'static str, &'static str)],
    data_dir: &'static str,
}

// === Workspace Helpers ===

fn load_catalog(layouts_dir: Option<&Path>) -> Result<LayoutCatalog> {
    match layouts_dir {
        Some(dir) => LayoutCatalog::load_dir(&expand_home(dir)?),
        None => LayoutCatalog::bundled(),
    }
}

fn open_workspace(cli: &Cli, catalog: LayoutCatalog) -> Result<(DataPaths, Workspace)> {
    let paths = DataPaths::resolve(cli.data_dir.as_deref())?;
    let workspace = Workspace::open(&paths, Arc::new(catalog))?;
    Ok((paths, workspace))
}

// === Commands ===

fn cmd_serve(cli: &Cli, args: &cli::ServeArgs) -> Result<()> {
    let catalog = load_catalog(args.layouts_dir.as_deref())?;
    let (paths, workspace) = open_workspace(cli, catalog)?;
    let settings = Settings::load_or_default(paths.settings_file())?;

    let bind = args.bind.as_deref().unwrap_or(&settings.server.bind);
    let port = args.port.unwrap_or(settings.server.port);
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .map_err(|e| CldError::WebServerFailed {
            addr: format!("{bind}:{port}"),
            reason: format!("invalid address: {e}"),
        })?;

    let state = AppState::new(Arc::new(workspace), settings.stream.to_stream_config()?);

    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "listening": format!("http://{addr}"),
                "data_dir": paths.root().display().to_string(),
            }),
        );
    } else if !cli.quiet {
        println!(
            "Serving {} on {}",
            style(paths.root().display()).cyan(),
            style(format!("http://{addr}")).green().bold()
        );
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CldError::Startup(format!("cannot start async runtime: {e}")))?;
    runtime.block_on(web::serve(addr, state))
}

fn cmd_export(cli: &Cli, args: &cli::ExportArgs) -> Result<()> {
    let (_, workspace) = open_workspace(cli, LayoutCatalog::empty())?;
    let exported = SnapshotArchiver::new(&workspace).export()?;

    let path = match &args.output {
        Some(output) => move_file(&exported.path, &expand_home(output)?)?,
        None => exported.path.clone(),
    };

    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "path": path.display().to_string(),
                "file_name": exported.file_name(),
                "watermark": exported.watermark,
                "ok": true,
            }),
        );
    } else if !cli.quiet {
        println!("{}", path.display());
    }
    Ok(())
}

/// Moves `from` to `to`, falling back to copy-and-delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<PathBuf> {
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        let _ = std::fs::remove_file(from);
    }
    Ok(to.to_path_buf())
}

fn cmd_import(cli: &Cli, args: &cli::ImportArgs) -> Result<()> {
    let (_, workspace) = open_workspace(cli, LayoutCatalog::empty())?;
    let archive = expand_home(&args.archive)?;
    let summary = SnapshotArchiver::new(&workspace).import(&archive)?;
    let snapshot = workspace.snapshot()?;

    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "images": snapshot.images.len(),
                "pages": snapshot.pages.len(),
                "state_imported": summary.state_rows.is_some(),
                "assets_imported": summary.assets,
                "ok": true,
            }),
        );
    } else if !cli.quiet {
        println!(
            "Imported {}: {} images, {} pages",
            archive.display(),
            snapshot.images.len(),
            snapshot.pages.len()
        );
        if summary.state_rows.is_none() {
            println!("  {}", style("archive had no state.db; pages left as they were").yellow());
        }
    }
    Ok(())
}

fn cmd_reset(cli: &Cli, args: &cli::ResetArgs) -> Result<()> {
    if !args.yes {
        return Err(CldError::Other(
            "Reset deletes every image and page; pass --yes to confirm".to_string(),
        ));
    }

    let (_, workspace) = open_workspace(cli, LayoutCatalog::empty())?;
    workspace.reset()?;

    if cli.use_json() {
        output_json(cli, &serde_json::json!({ "reset": true, "ok": true }));
    } else if !cli.quiet {
        println!("Workspace reset");
    }
    Ok(())
}

fn cmd_status(cli: &Cli) -> Result<()> {
    let (paths, workspace) = open_workspace(cli, LayoutCatalog::empty())?;
    let snapshot = workspace.snapshot()?;

    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "data_dir": paths.root().display().to_string(),
                "images": snapshot.images.len(),
                "pages": snapshot.pages.len(),
                "page_count": snapshot.page_count,
                "watermark": snapshot.watermark,
            }),
        );
    } else {
        println!("{}", style(paths.root().display()).bold());
        println!("  images:    {}", snapshot.images.len());
        println!("  pages:     {}", snapshot.page_count);
        println!("  watermark: {}", snapshot.watermark);
    }
    Ok(())
}

#[derive(Serialize)]
struct LayoutInfo<'a> {
    name: &'a str,
    title: &'a str,
    has_style: bool,
}

fn cmd_layouts(cli: &Cli, args: &cli::LayoutsArgs) -> Result<()> {
    let catalog = load_catalog(args.layouts_dir.as_deref())?;
    let layouts: Vec<LayoutInfo<'_>> = catalog
        .layouts()
        .iter()
        .map(|(name, title)| LayoutInfo {
            name,
            title,
            has_style: catalog.styles().contains_key(name),
        })
        .collect();

    if cli.use_json() {
        output_json(cli, &serde_json::json!({ "layouts": layouts }));
    } else {
        for layout in &layouts {
            let marker = if layout.has_style {
                style("css").green()
            } else {
                style("---").dim()
            };
            println!("  {marker}  {}  {}", style(layout.name).bold(), layout.title);
        }
        if !cli.quiet {
            println!("\n{} layouts", layouts.len());
        }
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_version(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "version": build_info::VERSION,
                "git_sha": build_info::git_sha(),
                "git_dirty": build_info::git_dirty() == "true",
                "build_timestamp": build_info::build_timestamp(),
                "rustc_version": build_info::rustc_semver(),
                "target": build_info::target(),
            }),
        );
    } else {
        println!("cld {}", build_info::VERSION);
        println!(
            "git: {}{}",
            build_info::git_sha(),
            if build_info::git_dirty() == "true" {
                " (dirty)"
            } else {
                ""
            }
        );
        println!("built: {}", build_info::build_timestamp());
        println!("rustc: {}", build_info::rustc_semver());
        println!("target: {}", build_info::target());
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_completions(_cli: &Cli, args: &cli::CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "cld", &mut io::stdout());
    Ok(())
}

// === Output ===

fn output_json<T: Serialize>(cli: &Cli, data: &T) {
    let json = if cli.use_compact_json() {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to encode output: {e}"),
    }
}

fn output_error(cli: &Cli, error: &CldError) {
    if cli.use_json() {
        let json = serde_json::json!({
            "error": true,
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "validation": error.is_validation(),
        });
        eprintln!("{json}");
    } else {
        eprintln!("{}: {}", style("Error").red().bold(), error);
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{}: {}", style("Hint").yellow(), suggestion);
        }
    }
}
