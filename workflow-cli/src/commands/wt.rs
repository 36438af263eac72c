//! Worktree commands (`wt`)

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};
use clap::{Args, Subcommand};
use colored::Colorize;
use tracing::debug;
use workflow_core::git::{containing, is_dirty};
use workflow_core::validate::{validate_branch_name, validate_worktree_name};
use workflow_core::{process, request_directory_change, GitRepo, HandoffTarget, WorktreeRecord};
use workflow_github::GhClient;

use super::{current_dir, Context};
use crate::ui::{self, Prompter};

/// Git worktree manager with interactive selection
#[derive(Args, Debug)]
pub struct WtArgs {
    #[command(subcommand)]
    pub command: Option<WtCommand>,
}

#[derive(Subcommand, Debug)]
pub enum WtCommand {
    /// Switch to a worktree (interactive without NAME)
    #[command(visible_alias = "sw")]
    Switch {
        /// Worktree name
        name: Option<String>,
    },

    /// Create a new worktree
    #[command(visible_alias = "cr")]
    Create {
        /// Worktree name
        name: Option<String>,

        /// Branch to check out or create (non-interactive)
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Create a worktree from a GitHub pull request
    Pr {
        /// Worktree name
        name: Option<String>,
    },

    /// Create a worktree on a new branch
    #[command(visible_alias = "fk")]
    Fork {
        /// Worktree name
        name: Option<String>,
    },

    /// List all worktrees
    #[command(visible_alias = "ls")]
    List,

    /// Remove a worktree
    #[command(visible_alias = "rm")]
    Remove {
        /// Worktree name
        name: Option<String>,

        /// Remove even with uncommitted changes
        #[arg(short, long)]
        force: bool,
    },

    /// Open Claude in a worktree
    #[command(visible_alias = "c")]
    Claude {
        /// Worktree name
        name: Option<String>,
    },

    /// Print the path of a worktree
    Path {
        /// Worktree name
        name: String,
    },

    /// Remove the worktree you are in
    Cleanup,
}

impl WtArgs {
    /// Execute the worktree command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let cwd = current_dir()?;
        let repo = GitRepo::discover(&cwd).await?;
        let prompter = ctx.prompter();

        match &self.command {
            None => switch(&repo, None, prompter).await,
            Some(WtCommand::Switch { name }) => switch(&repo, name.as_deref(), prompter).await,
            Some(WtCommand::Create { name, branch }) => {
                create(&repo, name.as_deref(), branch.as_deref(), prompter).await
            }
            Some(WtCommand::Pr { name }) => from_pr(&repo, name.as_deref(), prompter).await,
            Some(WtCommand::Fork { name }) => fork(&repo, name.as_deref(), prompter).await,
            Some(WtCommand::List) => list(&repo).await,
            Some(WtCommand::Remove { name, force }) => {
                remove(&repo, name.as_deref(), *force, &cwd, prompter).await
            }
            Some(WtCommand::Claude { name }) => {
                claude(&repo, name.as_deref(), &ctx.config.worktree.claude_path, prompter).await
            }
            Some(WtCommand::Path { name }) => path(&repo, name),
            Some(WtCommand::Cleanup) => cleanup(&repo, &cwd, prompter).await,
        }
    }
}

/// Where a new branch starts
#[derive(Debug, Clone, PartialEq, Eq)]
enum BaseChoice {
    /// `origin/<default>` after a fetch
    DefaultBranch,
    /// The current HEAD
    Head,
    /// Any local or remote branch
    Pick,
}

/// Base options for `create`: default branch first
fn create_base_options(default_branch: &str, has_branches: bool) -> Vec<(BaseChoice, String)> {
    let mut options = vec![
        (BaseChoice::DefaultBranch, format!("{} (default)", default_branch)),
        (BaseChoice::Head, "HEAD (current)".to_string()),
    ];
    if has_branches {
        options.push((BaseChoice::Pick, "Pick a branch...".to_string()));
    }
    options
}

/// Base options for `fork`: HEAD first
fn fork_base_options(default_branch: &str, has_branches: bool) -> Vec<(BaseChoice, String)> {
    let mut options = vec![
        (BaseChoice::Head, "HEAD (current)".to_string()),
        (BaseChoice::DefaultBranch, default_branch.to_string()),
    ];
    if has_branches {
        options.push((BaseChoice::Pick, "Pick a branch...".to_string()));
    }
    options
}

/// Worktree name suggested for a branch
fn suggest_name(branch: &str) -> String {
    branch
        .strip_prefix("origin/")
        .unwrap_or(branch)
        .replace('/', "-")
}

/// Picker row for a checkout: `name [branch]`
fn checkout_label(wt: &WorktreeRecord) -> String {
    let branch = match &wt.branch {
        Some(branch) => format!("[{}]", branch),
        None => "[detached]".to_string(),
    };
    format!("{} {}", wt.name, branch)
}

/// Resolve a base choice to a git revision
async fn resolve_base(repo: &GitRepo, choice: &BaseChoice, prompter: &dyn Prompter) -> Option<String> {
    match choice {
        BaseChoice::Head => Some("HEAD".to_string()),
        BaseChoice::DefaultBranch => {
            fetch_quietly(repo).await;
            Some(format!("origin/{}", repo.default_branch().await))
        }
        BaseChoice::Pick => {
            fetch_quietly(repo).await;
            let branches = repo.list_branches(true).await;
            let index = prompter.select("Select base branch", &branches)?;
            branches.get(index).cloned()
        }
    }
}

async fn fetch_quietly(repo: &GitRepo) {
    if let Err(e) = repo.fetch_origin().await {
        debug!(error = %e, "Fetch failed, using local refs");
    }
}

async fn prompt_base(
    repo: &GitRepo,
    options: Vec<(BaseChoice, String)>,
    prompter: &dyn Prompter,
) -> Option<String> {
    let labels: Vec<String> = options.iter().map(|(_, label)| label.clone()).collect();
    let index = prompter.select("Branch from", &labels)?;
    let (choice, _) = options.get(index)?;
    resolve_base(repo, choice, prompter).await
}

/// Create the worktree and report it
pub(crate) async fn create_worktree(repo: &GitRepo, name: &str, branch: &str, new_branch: bool) -> anyhow::Result<PathBuf> {
    let path = repo
        .create_worktree(name, branch, new_branch)
        .await
        .map_err(|e| anyhow!("Failed to create worktree: {}", e))?;
    println!("{}", ui::success(format!("Created worktree '{}'", name)));
    println!("{}", ui::dim(format!("  {}", path.display())));
    Ok(path)
}

/// Prompt for a worktree name, suggesting one from the branch
pub(crate) fn prompt_worktree_name(given: Option<&str>, branch: &str, prompter: &dyn Prompter) -> anyhow::Result<Option<String>> {
    let name = match given {
        Some(name) => name.to_string(),
        None => match prompter.input("Worktree name", Some(&suggest_name(branch))) {
            Some(name) => name,
            None => return Ok(None),
        },
    };
    validate_worktree_name(&name)?;
    Ok(Some(name))
}

/// Branch picker with a leading "create" entry. Returns `(branch, new_branch)`.
async fn select_branch(repo: &GitRepo, prompter: &dyn Prompter) -> anyhow::Result<Option<(String, bool)>> {
    let branches = repo.list_branches(true).await;
    let mut options = vec!["[+] Create new branch".to_string()];
    options.extend(branches.iter().cloned());

    let Some(index) = prompter.select("Select branch", &options) else {
        return Ok(None);
    };
    if index > 0 {
        return Ok(branches.get(index - 1).map(|b| (b.clone(), false)));
    }

    let Some(branch) = prompter.input("New branch name", None) else {
        return Ok(None);
    };
    validate_branch_name(&branch)?;

    let default_branch = repo.default_branch().await;
    let has_local = !repo.list_branches(false).await.is_empty();
    let Some(base) = prompt_base(repo, create_base_options(&default_branch, has_local), prompter).await else {
        return Ok(None);
    };

    if base == "HEAD" {
        return Ok(Some((branch, true)));
    }
    repo.create_branch(&branch, &base)
        .await
        .map_err(|e| anyhow!("Failed to create branch '{}' from '{}': {}", branch, base, e))?;
    Ok(Some((branch, false)))
}

async fn create(
    repo: &GitRepo,
    name: Option<&str>,
    branch: Option<&str>,
    prompter: &dyn Prompter,
) -> anyhow::Result<()> {
    if let Some(branch) = branch {
        let Some(name) = name else {
            bail!("Name required when using -b flag");
        };
        validate_worktree_name(name)?;
        validate_branch_name(branch)?;

        if !repo.branch_exists(branch).await {
            let default_branch = repo.default_branch().await;
            repo.create_branch(branch, &default_branch)
                .await
                .map_err(|e| anyhow!("Failed to create branch '{}' from '{}': {}", branch, default_branch, e))?;
        }

        let path = create_worktree(repo, name, branch, false).await?;
        request_directory_change(HandoffTarget::Worktree, &path);
        return Ok(());
    }

    let Some((branch, new_branch)) = select_branch(repo, prompter).await? else {
        ui::cancelled();
        return Ok(());
    };
    let Some(name) = prompt_worktree_name(name, &branch, prompter)? else {
        ui::cancelled();
        return Ok(());
    };

    let path = create_worktree(repo, &name, &branch, new_branch).await?;
    request_directory_change(HandoffTarget::Worktree, &path);
    Ok(())
}

async fn from_pr(repo: &GitRepo, name: Option<&str>, prompter: &dyn Prompter) -> anyhow::Result<()> {
    println!("{}", ui::info("Fetching PRs from GitHub..."));
    let gh = GhClient::in_dir(repo.root());
    let prs = gh.list_prs_simple().await.unwrap_or_else(|e| {
        debug!(error = %e, "Listing PRs failed");
        Vec::new()
    });
    if prs.is_empty() {
        bail!("No open PRs found (or gh CLI not available).");
    }

    let options: Vec<String> = prs.iter().map(|p| p.picker_label()).collect();
    let Some(pr) = prompter.select("Select PR", &options).and_then(|i| prs.get(i)) else {
        ui::cancelled();
        return Ok(());
    };

    let Some(name) = prompt_worktree_name(name, &pr.branch, prompter)? else {
        ui::cancelled();
        return Ok(());
    };

    println!("{}", ui::info(format!("Fetching PR #{}...", pr.number)));
    repo.fetch_pr_head(pr.number, &pr.branch)
        .await
        .map_err(|e| anyhow!("Failed to fetch PR #{}: {}", pr.number, e))?;

    let path = create_worktree(repo, &name, &pr.branch, false).await?;
    request_directory_change(HandoffTarget::Worktree, &path);
    Ok(())
}

async fn fork(repo: &GitRepo, name: Option<&str>, prompter: &dyn Prompter) -> anyhow::Result<()> {
    let Some(branch) = prompter.input("New branch name", None) else {
        ui::cancelled();
        return Ok(());
    };
    validate_branch_name(&branch)?;

    let default_branch = repo.default_branch().await;
    let has_local = !repo.list_branches(false).await.is_empty();
    let Some(base) = prompt_base(repo, fork_base_options(&default_branch, has_local), prompter).await else {
        ui::cancelled();
        return Ok(());
    };

    let Some(name) = prompt_worktree_name(name, &branch, prompter)? else {
        ui::cancelled();
        return Ok(());
    };

    let new_branch = base == "HEAD";
    if !new_branch {
        repo.create_branch(&branch, &base)
            .await
            .map_err(|e| anyhow!("Failed to create branch '{}' from '{}': {}", branch, base, e))?;
    }

    let path = create_worktree(repo, &name, &branch, new_branch).await?;
    request_directory_change(HandoffTarget::Worktree, &path);
    Ok(())
}

async fn list(repo: &GitRepo) -> anyhow::Result<()> {
    let worktrees = repo.list_worktrees().await?;
    if worktrees.is_empty() {
        println!("{}", ui::dim("No worktrees found."));
        return Ok(());
    }

    for wt in &worktrees {
        let label = wt.branch_label();
        let branch = if wt.is_bare {
            label.bright_black()
        } else if wt.branch.is_some() {
            label.green()
        } else {
            label.yellow()
        };
        println!(
            "  {:30} {:40} {}",
            wt.name.cyan().bold(),
            branch,
            wt.path.display().to_string().bright_black()
        );
    }
    Ok(())
}

/// A named worktree that must exist on disk
fn existing_worktree(repo: &GitRepo, name: &str) -> anyhow::Result<PathBuf> {
    validate_worktree_name(name)?;
    let path = repo.worktree_path(name);
    if !path.exists() {
        bail!("Worktree '{}' not found at {}", name, path.display());
    }
    Ok(path)
}

/// Pick one of the non-bare worktrees
async fn pick_checkout(repo: &GitRepo, prompt: &str, prompter: &dyn Prompter) -> anyhow::Result<Option<WorktreeRecord>> {
    let checkouts = repo.checkouts().await?;
    if checkouts.is_empty() {
        bail!("No worktrees found.");
    }
    let options: Vec<String> = checkouts.iter().map(checkout_label).collect();
    Ok(prompter
        .select(prompt, &options)
        .and_then(|i| checkouts.into_iter().nth(i)))
}

async fn switch(repo: &GitRepo, name: Option<&str>, prompter: &dyn Prompter) -> anyhow::Result<()> {
    if let Some(name) = name {
        let path = existing_worktree(repo, name)?;
        request_directory_change(HandoffTarget::Worktree, &path);
        return Ok(());
    }

    match pick_checkout(repo, "Select worktree", prompter).await? {
        Some(wt) => request_directory_change(HandoffTarget::Worktree, &wt.path),
        None => ui::cancelled(),
    }
    Ok(())
}

/// Whether `cwd` is `path` or below it
fn is_within(cwd: &Path, path: &Path) -> bool {
    let cwd = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    cwd.starts_with(path)
}

/// Remove with a dirty check; hands off to the main checkout when the cwd goes away.
/// Returns `false` when the user backed out.
async fn remove_checked(
    repo: &GitRepo,
    name: &str,
    path: &Path,
    mut force: bool,
    cwd: &Path,
    prompter: &dyn Prompter,
) -> anyhow::Result<bool> {
    let inside = is_within(cwd, path);

    if !force && is_dirty(path).await {
        let prompt = ui::warn(format!("Worktree '{}' has uncommitted changes. Remove anyway?", name));
        if !ui::confirm(prompter, &prompt, false) {
            ui::cancelled();
            return Ok(false);
        }
        force = true;
    }

    repo.remove_worktree(path, force)
        .await
        .map_err(|e| anyhow!("Failed to remove: {}", e))?;
    println!("{}", ui::success(format!("Removed worktree '{}'", name)));

    if inside {
        request_directory_change(HandoffTarget::Worktree, repo.root());
    }
    Ok(true)
}

async fn remove(
    repo: &GitRepo,
    name: Option<&str>,
    force: bool,
    cwd: &Path,
    prompter: &dyn Prompter,
) -> anyhow::Result<()> {
    let (name, path) = match name {
        Some(name) => (name.to_string(), existing_worktree(repo, name)?),
        None => {
            let Some(wt) = pick_checkout(repo, "Select worktree to remove", prompter).await? else {
                ui::cancelled();
                return Ok(());
            };
            let prompt = ui::warn(format!("Remove worktree '{}'?", wt.name));
            if !ui::confirm(prompter, &prompt, false) {
                ui::cancelled();
                return Ok(());
            }
            (wt.name, wt.path)
        }
    };

    remove_checked(repo, &name, &path, force, cwd, prompter).await?;
    Ok(())
}

async fn claude(
    repo: &GitRepo,
    name: Option<&str>,
    claude_path: &str,
    prompter: &dyn Prompter,
) -> anyhow::Result<()> {
    let path = match name {
        Some(name) => existing_worktree(repo, name)?,
        None => match pick_checkout(repo, "Select worktree for Claude", prompter).await? {
            Some(wt) => wt.path,
            None => {
                ui::cancelled();
                return Ok(());
            }
        },
    };

    println!("{}", ui::info(format!("Opening Claude in {}...", path.display())));
    let code = process::run_interactive(claude_path, &[], Some(&path)).await?;
    debug!(code, "Claude exited");
    Ok(())
}

fn path(repo: &GitRepo, name: &str) -> anyhow::Result<()> {
    validate_worktree_name(name)?;
    let path = repo.worktree_path(name);
    if !path.exists() {
        bail!("Worktree '{}' not found", name);
    }
    // Plain output for `cd $(wt path x)`
    println!("{}", path.display());
    Ok(())
}

async fn cleanup(repo: &GitRepo, cwd: &Path, prompter: &dyn Prompter) -> anyhow::Result<()> {
    let worktrees = repo.list_worktrees().await?;
    let Some(current) = containing(&worktrees, cwd).cloned() else {
        bail!("Not in a worktree.");
    };

    if is_within(repo.root(), &current.path) {
        bail!("Cannot cleanup the main repository.");
    }

    let prompt = ui::warn(format!("Remove current worktree '{}'?", current.name));
    if !ui::confirm(prompter, &prompt, false) {
        ui::cancelled();
        return Ok(());
    }

    if !remove_checked(repo, &current.name, &current.path, false, cwd, prompter).await? {
        return Ok(());
    }

    let Some(branch) = current.branch else {
        return Ok(());
    };
    if !ui::confirm(prompter, &ui::warn(format!("Delete branch '{}'?", branch)), false) {
        return Ok(());
    }

    if repo.delete_branch(&branch, false).await.is_ok() {
        println!("{}", ui::success(format!("Deleted branch '{}'", branch)));
        return Ok(());
    }

    let prompt = ui::warn(format!("Branch '{}' is not fully merged. Force delete?", branch));
    if ui::confirm(prompter, &prompt, false) {
        repo.delete_branch(&branch, true)
            .await
            .map_err(|e| anyhow!("Failed to delete branch '{}': {}", branch, e))?;
        println!("{}", ui::success(format!("Force deleted branch '{}'", branch)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::tests::ScriptedPrompter;

    #[test]
    fn test_create_base_options_order() {
        let options = create_base_options("main", true);
        let labels: Vec<&str> = options.iter().map(|(_, l)| l.as_str()).collect();
        assert_eq!(labels, ["main (default)", "HEAD (current)", "Pick a branch..."]);
        assert_eq!(options[0].0, BaseChoice::DefaultBranch);

        assert_eq!(create_base_options("main", false).len(), 2);
    }

    #[test]
    fn test_fork_base_options_order() {
        let options = fork_base_options("trunk", true);
        assert_eq!(options[0], (BaseChoice::Head, "HEAD (current)".to_string()));
        assert_eq!(options[1], (BaseChoice::DefaultBranch, "trunk".to_string()));
        assert_eq!(options[2].0, BaseChoice::Pick);
    }

    #[test]
    fn test_suggest_name() {
        assert_eq!(suggest_name("feature/login"), "feature-login");
        assert_eq!(suggest_name("origin/fix/bug"), "fix-bug");
        assert_eq!(suggest_name("main"), "main");
    }

    #[test]
    fn test_checkout_label() {
        let wt = WorktreeRecord {
            path: PathBuf::from("/src/proj.worktrees/login"),
            name: "login".to_string(),
            branch: Some("feature/login".to_string()),
            is_bare: false,
        };
        assert_eq!(checkout_label(&wt), "login [feature/login]");

        let detached = WorktreeRecord { branch: None, ..wt };
        assert_eq!(checkout_label(&detached), "login [detached]");
    }

    #[test]
    fn test_prompt_worktree_name_validates() {
        let prompter = ScriptedPrompter::default();
        prompter.inputs.borrow_mut().push_back(Some("../escape".to_string()));
        assert!(prompt_worktree_name(None, "feature/x", &prompter).is_err());

        prompter.inputs.borrow_mut().push_back(None);
        assert_eq!(prompt_worktree_name(None, "feature/x", &prompter).unwrap(), None);

        assert_eq!(
            prompt_worktree_name(Some("login"), "feature/x", &prompter).unwrap(),
            Some("login".to_string())
        );
    }

    #[test]
    fn test_is_within() {
        let tmp = tempfile::tempdir().unwrap();
        let inner = tmp.path().join("a/b");
        std::fs::create_dir_all(&inner).unwrap();
        assert!(is_within(&inner, tmp.path()));
        assert!(is_within(tmp.path(), tmp.path()));
        assert!(!is_within(tmp.path(), &inner));
    }
}
