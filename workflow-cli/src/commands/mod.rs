//! CLI command implementations

pub mod install;
pub mod pr;
pub mod rp;
pub mod tm;
pub mod wt;

pub use install::InstallArgs;
pub use pr::PrArgs;
pub use rp::RpArgs;
pub use tm::TmArgs;
pub use wt::WtArgs;

use std::path::PathBuf;

use anyhow::Context as _;
use workflow_core::Config;

use crate::ui::Prompter;

/// Shared state handed to every command
pub struct Context {
    pub config: Config,
    pub prompter: Box<dyn Prompter>,
}

impl Context {
    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }
}

/// The process working directory
pub fn current_dir() -> anyhow::Result<PathBuf> {
    std::env::current_dir().context("Cannot determine the current directory")
}

/// Print the effective configuration
pub fn show_config(config: &Config) {
    println!("workflow-tools configuration");
    println!("============================");
    println!();
    println!("[repos]");
    let paths: Vec<String> = config
        .repos
        .scan_paths
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    println!("  scan_paths:   {}", paths.join(", "));
    println!(
        "  cache_ttl:    {}",
        humantime_duration(config.repos.cache_ttl)
    );
    println!(
        "  scan_timeout: {}",
        humantime_duration(config.repos.scan_timeout)
    );
    match config.repos.cache_dir() {
        Ok(dir) => println!("  cache_dir:    {}", dir.display()),
        Err(e) => println!("  cache_dir:    (unavailable: {})", e),
    }
    println!();
    println!("[worktree]");
    println!("  claude_path:  {}", config.worktree.claude_path);
    println!();
    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}

fn humantime_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_duration_display() {
        assert_eq!(humantime_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(humantime_duration(Duration::from_secs(90)), "90s");
        assert_eq!(humantime_duration(Duration::from_secs(120)), "2m");
        assert_eq!(humantime_duration(Duration::ZERO), "0s");
    }
}
