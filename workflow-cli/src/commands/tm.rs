//! tmux session commands (`tm`)
//!
//! Attaching and creating sessions replace this process with tmux, so those
//! paths only come back here when exec itself fails.

use anyhow::{anyhow, bail};
use clap::{Args, Subcommand};
use colored::Colorize;
use workflow_core::git::current_branch_at;
use workflow_core::process::binary_on_path;
use workflow_core::tmux::{self, AttachChoice, SessionInfo};

use super::Context;
use crate::ui::{self, Prompter};

const CREATE_OPTION: &str = "[+] Create new session";
const LIST_OPTION: &str = "[?] List sessions";

/// tmux session manager with git-aware naming
#[derive(Args, Debug)]
pub struct TmArgs {
    #[command(subcommand)]
    pub command: Option<TmCommand>,
}

#[derive(Subcommand, Debug)]
pub enum TmCommand {
    /// Create a session (name defaults to the current branch)
    #[command(visible_alias = "c")]
    Create { name: Option<String> },

    /// Attach to a session (interactive without NAME)
    #[command(visible_alias = "a")]
    Attach { name: Option<String> },

    /// List sessions
    #[command(visible_alias = "ls")]
    List,

    /// Kill a session (interactive without NAME)
    #[command(visible_alias = "k")]
    Kill {
        name: Option<String>,

        /// Kill without confirmation
        #[arg(short, long)]
        force: bool,
    },
}

impl TmArgs {
    /// Execute the tmux command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        if !binary_on_path("tmux") {
            bail!("tmux is not installed");
        }
        let prompter = ctx.prompter();

        match &self.command {
            None => smart_default(prompter).await,
            Some(TmCommand::Create { name }) => {
                require_outside_tmux("create").await?;
                create(name.as_deref(), prompter).await
            }
            Some(TmCommand::Attach { name }) => {
                require_outside_tmux("attach").await?;
                attach(name.as_deref(), prompter).await
            }
            Some(TmCommand::List) => list().await,
            Some(TmCommand::Kill { name, force }) => {
                require_outside_tmux("kill").await?;
                kill(name.as_deref(), *force, prompter).await
            }
        }
    }
}

/// What the bare `tm` invocation should do when outside tmux
#[derive(Debug, PartialEq, Eq)]
enum DefaultPlan {
    /// A session named after the suggestion exists
    Attach(String),
    /// Offer existing sessions plus a create row
    Picker(Vec<String>),
    /// No sessions at all
    Menu(Vec<String>),
}

fn plan_default(suggested: &str, sessions: &[SessionInfo]) -> DefaultPlan {
    if sessions.iter().any(|s| s.name == suggested) {
        return DefaultPlan::Attach(suggested.to_string());
    }
    if sessions.is_empty() {
        return DefaultPlan::Menu(vec![CREATE_OPTION.to_string(), LIST_OPTION.to_string()]);
    }
    let mut options = vec![CREATE_OPTION.to_string()];
    options.extend(sessions.iter().map(SessionInfo::picker_label));
    DefaultPlan::Picker(options)
}

/// Rows offered for an already-attached session, paired with their choice
fn attach_choices(extended: &str) -> Vec<(String, AttachChoice)> {
    vec![
        (
            format!("[+] Create new window ({})", extended),
            AttachChoice::NewGroupedSession(extended.to_string()),
        ),
        ("[D] Detach other client and attach".to_string(), AttachChoice::DetachOthers),
        ("[J] Join session (share with other client)".to_string(), AttachChoice::Join),
    ]
}

/// Sanitized current branch, falling back to the host name
async fn suggested_name() -> String {
    let branch = match std::env::current_dir() {
        Ok(cwd) => current_branch_at(&cwd).await,
        Err(_) => None,
    };
    match branch {
        Some(branch) => tmux::sanitize_session_name(&branch),
        None => tmux::sanitize_session_name(&tmux::short_hostname().await),
    }
}

async fn current_label() -> String {
    let session = tmux::current_session_name()
        .await
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", session, tmux::short_hostname().await)
}

async fn require_outside_tmux(command: &str) -> anyhow::Result<()> {
    if tmux::is_inside_tmux() {
        bail!(
            "Cannot run 'tm {}' from inside tmux session: {}",
            command,
            current_label().await
        );
    }
    Ok(())
}

async fn print_current_session() -> anyhow::Result<()> {
    let Some(name) = tmux::current_session_name().await else {
        bail!("Could not determine current session");
    };
    let host = tmux::short_hostname().await;
    println!("{}", ui::info(format!("Inside tmux session: {}@{}", name, host)));
    if let Some(session) = tmux::session_info(&name).await {
        let clients = if session.attached { "attached" } else { "detached" };
        println!("{}", ui::dim(format!("  Windows: {}", session.windows)));
        println!("{}", ui::dim(format!("  Clients: {}", clients)));
    }
    Ok(())
}

#[cfg(unix)]
fn exec_failed(err: workflow_core::Error) -> anyhow::Result<()> {
    Err(anyhow::Error::new(err).context("Failed to start tmux"))
}

fn run_attach(session: &str, host: &str, detach_other: bool) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        exec_failed(tmux::exec_attach(session, host, detach_other))
    }
    #[cfg(not(unix))]
    {
        let _ = (session, host, detach_other);
        bail!("Attaching to tmux is only supported on unix")
    }
}

fn run_new_grouped(new: &str, target: &str, host: &str) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        exec_failed(tmux::exec_new_grouped(new, target, host))
    }
    #[cfg(not(unix))]
    {
        let _ = (new, target, host);
        bail!("Creating tmux sessions is only supported on unix")
    }
}

/// Sanitize `raw`, then create and attach to the session
async fn run_new(raw: &str) -> anyhow::Result<()> {
    let name = tmux::prepare_session_name(raw)?;
    if name != raw {
        println!("{}", ui::dim(format!("  (sanitized to '{}')", name)));
    }
    let host = tmux::short_hostname().await;

    #[cfg(unix)]
    {
        exec_failed(tmux::exec_new(&name, &host))
    }
    #[cfg(not(unix))]
    {
        let _ = host;
        bail!("Creating tmux sessions is only supported on unix")
    }
}

/// Prompt for a session name and create it
async fn prompt_and_create(prompter: &dyn Prompter) -> anyhow::Result<()> {
    let suggested = suggested_name().await;
    let default = (!suggested.is_empty()).then_some(suggested.as_str());
    let Some(name) = prompter.input("Session name", default) else {
        ui::cancelled();
        return Ok(());
    };
    println!("{}", ui::success(format!("Creating session '{}'...", name)));
    run_new(&name).await
}

/// Attach, asking how when another client is already attached
async fn attach_to(session_name: &str, prompter: &dyn Prompter) -> anyhow::Result<()> {
    let sessions = tmux::list_sessions().await;
    let Some(session) = sessions.iter().find(|s| s.name == session_name) else {
        bail!("Session '{}' not found.", session_name);
    };
    let host = tmux::short_hostname().await;

    if !session.attached {
        println!("{}", ui::info(format!("Attaching to session '{}'...", session_name)));
        return run_attach(session_name, &host, false);
    }

    let extended = tmux::next_extended_name(session_name, |candidate| {
        sessions.iter().any(|s| s.name == candidate)
    });
    let choices = attach_choices(&extended);
    let labels: Vec<String> = choices.iter().map(|(label, _)| label.clone()).collect();

    println!("{}", ui::warn(format!("Session '{}' is already attached.", session_name)));
    let Some((_, choice)) = prompter
        .select("How do you want to attach?", &labels)
        .and_then(|i| choices.into_iter().nth(i))
    else {
        ui::cancelled();
        return Ok(());
    };

    match choice {
        AttachChoice::NewGroupedSession(new_name) => {
            println!("{}", ui::success(format!("Creating grouped session '{}'...", new_name)));
            run_new_grouped(&new_name, session_name, &host)
        }
        AttachChoice::DetachOthers => {
            println!("{}", ui::info("Detaching other client and attaching..."));
            run_attach(session_name, &host, true)
        }
        AttachChoice::Join => {
            println!("{}", ui::info(format!("Joining session '{}'...", session_name)));
            run_attach(session_name, &host, false)
        }
    }
}

async fn smart_default(prompter: &dyn Prompter) -> anyhow::Result<()> {
    if tmux::is_inside_tmux() {
        return print_current_session().await;
    }

    let suggested = suggested_name().await;
    let sessions = tmux::list_sessions().await;

    match plan_default(&suggested, &sessions) {
        DefaultPlan::Attach(name) => attach_to(&name, prompter).await,
        DefaultPlan::Picker(options) => match prompter.select("Select session", &options) {
            None => {
                ui::cancelled();
                Ok(())
            }
            Some(0) => prompt_and_create(prompter).await,
            Some(i) => match sessions.get(i - 1) {
                Some(session) => attach_to(&session.name, prompter).await,
                None => {
                    ui::cancelled();
                    Ok(())
                }
            },
        },
        DefaultPlan::Menu(options) => match prompter.select("No sessions found", &options) {
            None => {
                ui::cancelled();
                Ok(())
            }
            Some(0) => prompt_and_create(prompter).await,
            Some(_) => {
                println!("{}", ui::dim("No sessions to list."));
                Ok(())
            }
        },
    }
}

async fn create(name: Option<&str>, prompter: &dyn Prompter) -> anyhow::Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => {
            let suggested = suggested_name().await;
            let default = (!suggested.is_empty()).then_some(suggested.as_str());
            match prompter.input("Session name", default) {
                Some(name) => name,
                None => {
                    ui::cancelled();
                    return Ok(());
                }
            }
        }
    };

    if tmux::session_info(&name).await.is_some() {
        let prompt = format!("Session '{}' already exists. Attach to it?", name);
        if ui::confirm(prompter, &prompt, true) {
            return attach_to(&name, prompter).await;
        }
        ui::cancelled();
        return Ok(());
    }

    println!("{}", ui::success(format!("Creating session '{}'...", name)));
    run_new(&name).await
}

async fn attach(name: Option<&str>, prompter: &dyn Prompter) -> anyhow::Result<()> {
    let sessions = tmux::list_sessions().await;

    if sessions.is_empty() {
        eprintln!("{}", ui::error("No tmux sessions found."));
        if ui::confirm(prompter, "Create a new session?", true) {
            return prompt_and_create(prompter).await;
        }
        return Ok(());
    }

    if let Some(name) = name {
        return attach_to(name, prompter).await;
    }
    if let [only] = sessions.as_slice() {
        return attach_to(&only.name, prompter).await;
    }

    let options: Vec<String> = sessions.iter().map(SessionInfo::picker_label).collect();
    match prompter.select("Select session", &options).and_then(|i| sessions.get(i)) {
        Some(session) => attach_to(&session.name, prompter).await,
        None => {
            ui::cancelled();
            Ok(())
        }
    }
}

/// One styled row of `tm list`
fn session_row(session: &SessionInfo, name_width: usize) -> String {
    let name = format!("{:<w$}", session.name, w = name_width);
    let status = if session.attached {
        "[attached]".green()
    } else {
        "[detached]".yellow()
    };
    format!(
        "  {} {:<10} {}",
        name.cyan().bold(),
        status,
        ui::dim(format!("{} windows", session.windows))
    )
}

async fn list() -> anyhow::Result<()> {
    let sessions = tmux::list_sessions().await;
    if sessions.is_empty() {
        println!("{}", ui::dim("No tmux sessions found."));
        return Ok(());
    }

    let width = sessions.iter().map(|s| s.name.chars().count()).max().unwrap_or(0);
    for session in &sessions {
        println!("{}", session_row(session, width));
    }
    Ok(())
}

async fn kill(name: Option<&str>, force: bool, prompter: &dyn Prompter) -> anyhow::Result<()> {
    let sessions = tmux::list_sessions().await;
    if sessions.is_empty() {
        bail!("No tmux sessions found.");
    }

    let target = match name {
        Some(name) => {
            if !sessions.iter().any(|s| s.name == name) {
                bail!("Session '{}' not found.", name);
            }
            name.to_string()
        }
        None => {
            let options: Vec<String> = sessions.iter().map(SessionInfo::picker_label).collect();
            match prompter
                .select("Select session to kill", &options)
                .and_then(|i| sessions.get(i))
            {
                Some(session) => session.name.clone(),
                None => {
                    ui::cancelled();
                    return Ok(());
                }
            }
        }
    };

    if !force && !ui::confirm(prompter, &format!("Kill session '{}'?", target), false) {
        ui::cancelled();
        return Ok(());
    }

    tmux::kill_session(&target)
        .await
        .map_err(|e| anyhow!("Failed to kill session: {}", e))?;
    println!("{}", ui::success(format!("Killed session '{}'", target)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str, attached: bool) -> SessionInfo {
        SessionInfo {
            name: name.to_string(),
            attached,
            windows: 2,
        }
    }

    #[test]
    fn test_plan_attaches_to_matching_session() {
        let sessions = vec![session("main", false), session("feature-x", true)];
        assert_eq!(
            plan_default("feature-x", &sessions),
            DefaultPlan::Attach("feature-x".to_string())
        );
    }

    #[test]
    fn test_plan_picker_puts_create_first() {
        let sessions = vec![session("main", false)];
        let DefaultPlan::Picker(options) = plan_default("feature-x", &sessions) else {
            panic!("expected picker");
        };
        assert_eq!(options[0], CREATE_OPTION);
        assert_eq!(options[1], "main [detached] (2 windows)");
    }

    #[test]
    fn test_plan_menu_without_sessions() {
        assert_eq!(
            plan_default("main", &[]),
            DefaultPlan::Menu(vec![CREATE_OPTION.to_string(), LIST_OPTION.to_string()])
        );
    }

    #[test]
    fn test_attach_choices_order() {
        let choices = attach_choices("dev.2");
        assert_eq!(choices[0].0, "[+] Create new window (dev.2)");
        assert_eq!(choices[0].1, AttachChoice::NewGroupedSession("dev.2".to_string()));
        assert_eq!(choices[1].1, AttachChoice::DetachOthers);
        assert_eq!(choices[2].1, AttachChoice::Join);
    }

    #[test]
    fn test_session_row_plain() {
        colored::control::set_override(false);
        let row = session_row(&session("dev", true), 6);
        assert_eq!(row, "  dev    [attached] 2 windows");
    }
}
