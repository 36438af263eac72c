//! Terminal styling, interactive prompts and clipboard helpers

use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, FuzzySelect, Input, MultiSelect};
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub fn success(msg: impl Display) -> String {
    format!("✓ {}", msg).green().to_string()
}

pub fn error(msg: impl Display) -> String {
    format!("✗ {}", msg).red().to_string()
}

pub fn info(msg: impl Display) -> String {
    format!("→ {}", msg).cyan().to_string()
}

pub fn warn(msg: impl Display) -> String {
    format!("! {}", msg).yellow().to_string()
}

pub fn dim(msg: impl Display) -> String {
    msg.to_string().bright_black().to_string()
}

/// Print the neutral cancellation notice
pub fn cancelled() {
    println!("{}", dim("Cancelled."));
}

/// Replace the home directory prefix with `~`
pub fn shorten_home(path: &Path) -> String {
    let display = path.display().to_string();
    match dirs::home_dir() {
        Some(home) => {
            let home = home.display().to_string();
            if !home.is_empty() && display.starts_with(&home) {
                format!("~{}", &display[home.len()..])
            } else {
                display
            }
        }
        None => display,
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(raw: &str) -> PathBuf {
    workflow_core::config::expand_home(Path::new(raw))
}

/// Interactive prompts; every method returns `None` when the user cancels
pub trait Prompter {
    /// Pick one item
    fn select(&self, prompt: &str, items: &[String]) -> Option<usize>;

    /// Pick any number of items
    fn select_many(&self, prompt: &str, items: &[String]) -> Option<Vec<usize>>;

    /// Yes/no question
    fn confirm(&self, prompt: &str, default: bool) -> Option<bool>;

    /// Free-text answer
    fn input(&self, prompt: &str, default: Option<&str>) -> Option<String>;
}

/// `dialoguer`-backed prompts on the controlling terminal
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn select(&self, prompt: &str, items: &[String]) -> Option<usize> {
        if items.is_empty() {
            return None;
        }
        let answer = FuzzySelect::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_opt();
        prompt_answer(answer, "Select prompt aborted")
    }

    fn select_many(&self, prompt: &str, items: &[String]) -> Option<Vec<usize>> {
        if items.is_empty() {
            return None;
        }
        let answer = MultiSelect::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .interact_opt();
        prompt_answer(answer, "Multi-select prompt aborted")
    }

    fn confirm(&self, prompt: &str, default: bool) -> Option<bool> {
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact_opt();
        prompt_answer(answer, "Confirm prompt aborted")
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Option<String> {
        let mut input = Input::<String>::with_theme(&self.theme).with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        prompt_answer(input.interact_text().map(Some), "Input prompt aborted")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Whether a prompt failed because the user pressed Ctrl-C
///
/// In raw mode Ctrl-C arrives as a key, which dialoguer reports as an
/// interrupted read rather than a signal.
pub fn is_interrupt(err: &dialoguer::Error) -> bool {
    match err {
        dialoguer::Error::IO(e) => e.kind() == std::io::ErrorKind::Interrupted,
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// Collapse a prompt result to an answer; every failure counts as cancel
fn prompt_answer<T>(answer: dialoguer::Result<Option<T>>, context: &str) -> Option<T> {
    match answer {
        Ok(answer) => answer,
        Err(e) => {
            if is_interrupt(&e) {
                restore_cursor();
            }
            debug!(error = %e, "{}", context);
            None
        }
    }
}

/// Make the cursor visible again after an aborted prompt
pub fn restore_cursor() {
    let _ = console::Term::stderr().show_cursor();
    let _ = console::Term::stdout().show_cursor();
}

/// Treat SIGINT outside a prompt like cancelling one: restore the
/// terminal, print the notice and exit cleanly.
pub fn install_interrupt_handler() {
    let result = ctrlc::set_handler(|| {
        restore_cursor();
        println!();
        cancelled();
        std::process::exit(0);
    });
    if let Err(e) = result {
        debug!(error = %e, "Could not install Ctrl-C handler");
    }
}

/// Confirm, treating cancellation as "no"
pub fn confirm(prompter: &dyn Prompter, prompt: &str, default: bool) -> bool {
    prompter.confirm(prompt, default).unwrap_or(false)
}

/// OSC 52 clipboard escape for `text`
pub fn osc52_sequence(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{}\x07", encoded)
}

fn osc52_copy(text: &str) -> bool {
    let mut out = std::io::stdout();
    out.write_all(osc52_sequence(text).as_bytes())
        .and_then(|_| out.flush())
        .is_ok()
}

fn is_ssh_session() -> bool {
    std::env::var_os("SSH_CONNECTION").is_some() || std::env::var_os("SSH_TTY").is_some()
}

async fn pipe_to(program: &str, args: &[&str], text: &str) -> bool {
    let child = tokio::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();
    let Ok(mut child) = child else {
        return false;
    };
    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(text.as_bytes()).await.is_err() {
            return false;
        }
    }
    matches!(child.wait().await, Ok(status) if status.success())
}

/// Copy text to the clipboard
///
/// Over SSH this always emits OSC 52. Locally the platform tools are tried
/// first, with OSC 52 as the last resort.
pub async fn copy_to_clipboard(text: &str) -> bool {
    if is_ssh_session() {
        return osc52_copy(text);
    }

    const TOOLS: &[(&str, &[&str])] = &[
        ("pbcopy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("xsel", &["--clipboard", "--input"]),
    ];
    for (program, args) in TOOLS {
        if pipe_to(program, args, text).await {
            debug!(program, "Copied to clipboard");
            return true;
        }
    }
    osc52_copy(text)
}

/// Open a URL in the user's browser
pub async fn open_url(url: &str) -> bool {
    let mut candidates: Vec<String> = Vec::new();
    if let Ok(browser) = std::env::var("BROWSER") {
        if !browser.trim().is_empty() {
            candidates.push(browser);
        }
    }
    candidates.push("xdg-open".to_string());
    candidates.push("open".to_string());

    for program in &candidates {
        match workflow_core::process::run(program, &[url], None).await {
            Ok(output) if output.success() => return true,
            Ok(output) => debug!(program = %program, code = output.exit_code, "Browser launcher failed"),
            Err(e) => debug!(program = %program, error = %e, "Browser launcher unavailable"),
        }
    }
    false
}

const CUSTOM_PATH_OPTION: &str = "[+] Enter custom path...";

/// Candidate clone destinations: each base dir and its visible children
pub fn directory_candidates(bases: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for base in bases {
        if !base.is_dir() {
            continue;
        }
        dirs.push(base.clone());
        let Ok(entries) = std::fs::read_dir(base) else {
            continue;
        };
        let mut children: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter(|p| {
                p.file_name()
                    .map(|n| !n.to_string_lossy().starts_with('.'))
                    .unwrap_or(false)
            })
            .collect();
        children.sort();
        dirs.extend(children);
    }
    dirs
}

/// Ask where to put a new clone
pub fn select_directory(prompter: &dyn Prompter, prompt: &str, bases: &[PathBuf]) -> Option<PathBuf> {
    let dirs = directory_candidates(bases);
    let mut options: Vec<String> = dirs.iter().map(|d| shorten_home(d)).collect();
    options.push(CUSTOM_PATH_OPTION.to_string());

    let index = prompter.select(prompt, &options)?;
    if index == dirs.len() {
        return prompter.input("Path", None).map(|p| expand_home(&p));
    }
    dirs.get(index).cloned()
}
