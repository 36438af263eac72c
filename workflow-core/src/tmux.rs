//! tmux session helpers
//!
//! Listing and killing sessions goes through `tmux` as a child process.
//! Attaching or creating a session replaces this process with tmux.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::process;
use crate::validate::validate_tmux_session_name;
use crate::{Error, Result};

/// Field separator in `list-sessions -F` output
const FIELD_SEP: char = '\t';
const SESSION_FIELDS: usize = 3;

/// Longest raw name accepted before sanitizing
pub const MAX_INPUT_LENGTH: usize = 1024;

/// Highest numeric suffix tried for an extended session name
pub const MAX_EXTENDED_COUNTER: u32 = 100;

/// One tmux session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session name
    pub name: String,
    /// At least one client attached
    pub attached: bool,
    /// Window count
    pub windows: u32,
}

impl SessionInfo {
    /// Plain-text picker row
    pub fn picker_label(&self) -> String {
        let status = if self.attached { "attached" } else { "detached" };
        format!("{} [{}] ({} windows)", self.name, status, self.windows)
    }
}

/// How to join a session that already has a client attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachChoice {
    /// New session grouped with the target, sharing its windows
    NewGroupedSession(String),
    /// Detach the other client, then attach
    DetachOthers,
    /// Attach alongside the other client
    Join,
}

/// Parse `list-sessions` output formatted as name, attached, windows
pub fn parse_sessions(text: &str) -> Vec<SessionInfo> {
    text.lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(FIELD_SEP).collect();
            if parts.len() != SESSION_FIELDS {
                return None;
            }
            Some(SessionInfo {
                name: parts[0].to_string(),
                // Client count, not a flag
                attached: parts[1].parse::<u32>().map(|n| n > 0).unwrap_or(false),
                windows: parts[2].parse().unwrap_or(0),
            })
        })
        .collect()
}

/// Replace characters tmux rejects with `-`, collapse runs, trim the ends
pub fn sanitize_session_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            ':' | '.' | '/' | '\\' | '\t' | '\n' | '\r' | '\0' => '-',
            other => other,
        })
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches('-').to_string()
}

/// Turn user input into a usable new-session name
pub fn prepare_session_name(raw: &str) -> Result<String> {
    if raw.len() > MAX_INPUT_LENGTH {
        return Err(Error::validation("Session name too long"));
    }

    let name = sanitize_session_name(raw);
    if name.is_empty() {
        return Err(Error::validation(format!(
            "Invalid session name: {:?} (no valid characters)",
            raw
        )));
    }

    validate_tmux_session_name(&name)?;
    Ok(name)
}

/// First free `base.N` for N in 2..=100, else `base.<unix seconds>`
pub fn next_extended_name(base: &str, exists: impl Fn(&str) -> bool) -> String {
    for counter in 2..=MAX_EXTENDED_COUNTER {
        let candidate = format!("{}.{}", base, counter);
        if !exists(&candidate) {
            return candidate;
        }
    }

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}.{}", base, secs)
}

fn strip_control_chars(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}

/// OSC 0 sequence setting the terminal title to `session@host`
pub fn terminal_title_sequence(session: &str, host: &str) -> String {
    format!(
        "\x1b]0;{}@{}\x07",
        strip_control_chars(session),
        strip_control_chars(host)
    )
}

/// Short host name, for titles and default session names
pub async fn short_hostname() -> String {
    let full = match process::run_captured("hostname", &[], None).await {
        Ok(name) if !name.is_empty() => name,
        _ => std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
    };
    full.split('.').next().unwrap_or(&full).to_string()
}

/// Whether this process runs inside a tmux client
pub fn is_inside_tmux() -> bool {
    std::env::var_os("TMUX").is_some()
}

/// All sessions; an absent server means none
pub async fn list_sessions() -> Vec<SessionInfo> {
    let format = ["#{session_name}", "#{session_attached}", "#{session_windows}"].join("\t");
    match process::run("tmux", &["list-sessions", "-F", &format], None).await {
        Ok(output) if output.success() => parse_sessions(&output.stdout),
        Ok(output) => {
            debug!(stderr = %output.error_line(), "tmux list-sessions failed");
            Vec::new()
        }
        Err(e) => {
            debug!(error = %e, "tmux unavailable");
            Vec::new()
        }
    }
}

/// Look up one session by exact name
pub async fn session_info(name: &str) -> Option<SessionInfo> {
    list_sessions().await.into_iter().find(|s| s.name == name)
}

/// Name of the session this process runs in
pub async fn current_session_name() -> Option<String> {
    if !is_inside_tmux() {
        return None;
    }
    process::run_captured("tmux", &["display-message", "-p", "#{session_name}"], None)
        .await
        .ok()
        .filter(|n| !n.is_empty())
}

/// `tmux kill-session -t name`
pub async fn kill_session(name: &str) -> Result<()> {
    process::run_captured("tmux", &["kill-session", "-t", name], None)
        .await
        .map(|_| ())
}

fn set_terminal_title(session: &str, host: &str) {
    let mut out = std::io::stdout();
    let _ = out.write_all(terminal_title_sequence(session, host).as_bytes());
    let _ = out.flush();
}

/// Attach to `session`, replacing this process.
///
/// Only returns if exec fails.
#[cfg(unix)]
pub fn exec_attach(session: &str, host: &str, detach_other: bool) -> Error {
    set_terminal_title(session, host);
    if detach_other {
        process::replace_process("tmux", &["attach-session", "-d", "-t", session])
    } else {
        process::replace_process("tmux", &["attach-session", "-t", session])
    }
}

/// Create and attach to `session`, replacing this process
#[cfg(unix)]
pub fn exec_new(session: &str, host: &str) -> Error {
    set_terminal_title(session, host);
    process::replace_process("tmux", &["new-session", "-s", session])
}

/// Create `new` grouped with `target` and attach, replacing this process
#[cfg(unix)]
pub fn exec_new_grouped(new: &str, target: &str, host: &str) -> Error {
    set_terminal_title(new, host);
    process::replace_process("tmux", &["new-session", "-t", target, "-s", new])
}
