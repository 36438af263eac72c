//! workflow-tools - git worktrees, pull requests, repositories and tmux
//! sessions from one binary.
//!
//! The `wt`, `pr` and `rp` shell functions installed by `install` forward
//! here and change directory afterwards when a command asks them to.

mod commands;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workflow_core::Config;

use commands::{Context, InstallArgs, PrArgs, RpArgs, TmArgs, WtArgs};

/// Workflow tools: git worktrees, PRs, repositories and tmux sessions
#[derive(Parser, Debug)]
#[command(name = "workflow-tools")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra directory to scan for repositories (repeatable)
    #[arg(long = "scan-path", global = true, value_name = "DIR")]
    scan_paths: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Git worktree management
    Wt(WtArgs),

    /// Pull request management
    Pr(PrArgs),

    /// Repository discovery and management
    Rp(RpArgs),

    /// tmux session management
    Tm(TmArgs),

    /// Install shell integration
    Install(InstallArgs),

    /// Show current configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("workflow_core=debug,workflow_github=debug,workflow_tools=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    // stdout is reserved for command output and the handoff fallback line
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_overrides(cli.scan_paths)?;
    tracing::debug!(
        scan_paths = ?config.repos.scan_paths,
        cache_ttl = ?config.repos.cache_ttl,
        "Configuration loaded"
    );

    let ctx = Context {
        config,
        prompter: Box::new(ui::TerminalPrompter::new()),
    };

    match cli.command {
        Commands::Wt(args) => args.execute(&ctx).await,
        Commands::Pr(args) => args.execute(&ctx).await,
        Commands::Rp(args) => args.execute(&ctx).await,
        Commands::Tm(args) => args.execute(&ctx).await,
        Commands::Install(args) => args.execute().await,
        Commands::Config => {
            commands::show_config(&ctx.config);
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    ui::install_interrupt_handler();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", ui::error(format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}
