//! Repository commands (`rp`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};
use clap::{Args, Subcommand};
use colored::Colorize;
use tracing::{debug, warn};
use workflow_core::repos::find_in;
use workflow_core::validate::{validate_github_owner, validate_github_repo};
use workflow_core::{process, request_directory_change, GitRepo, HandoffTarget, RemoteKind, RepoCache, RepoRecord};
use workflow_github::repo::{owner_from_repo_url, ssh_clone_url};
use workflow_github::{GhClient, OwnedRepo, Visibility};

use super::Context;
use crate::ui::{self, Prompter};

const REFRESH_OPTION: &str = "[refresh list]";

/// Repository management with fast discovery
#[derive(Args, Debug)]
pub struct RpArgs {
    /// Force a cache refresh before selection
    #[arg(short, long)]
    pub refresh: bool,

    #[command(subcommand)]
    pub command: Option<RpCommand>,
}

#[derive(Subcommand, Debug)]
pub enum RpCommand {
    /// Switch to a repository (interactive without NAME)
    #[command(visible_alias = "sw")]
    Switch {
        name: Option<String>,

        /// Force a cache refresh first
        #[arg(short, long)]
        refresh: bool,
    },

    /// List discovered repositories
    #[command(visible_alias = "ls")]
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// One path per line
        #[arg(long)]
        path_only: bool,

        /// Force a cache refresh first
        #[arg(short, long)]
        refresh: bool,
    },

    /// Rescan for repositories
    #[command(visible_alias = "rf")]
    Refresh,

    /// Create a GitHub repository and clone it
    #[command(visible_alias = "cr")]
    Create {
        name: String,

        /// Public repository
        #[arg(long, conflicts_with = "private")]
        public: bool,

        /// Private repository (default)
        #[arg(long)]
        private: bool,

        /// Repository description
        #[arg(short, long)]
        description: Option<String>,

        /// Destination directory (skips the prompt)
        #[arg(short, long)]
        path: Option<String>,

        /// Create on GitHub only
        #[arg(long)]
        no_clone: bool,
    },

    /// Fork a GitHub repository and clone the fork
    #[command(visible_alias = "fk")]
    Fork {
        /// `owner/name`; searched interactively when omitted
        repo: Option<String>,

        /// Destination directory (skips the prompt)
        #[arg(short, long)]
        path: Option<String>,

        /// Local folder name
        #[arg(short, long)]
        name: Option<String>,

        /// Fork on GitHub only
        #[arg(long)]
        no_clone: bool,
    },

    /// Clone one of your own GitHub repositories
    #[command(visible_alias = "cl")]
    Clone {
        name: Option<String>,

        /// Destination directory (skips the prompt)
        #[arg(short, long)]
        path: Option<String>,

        /// Clone every repository not yet cloned
        #[arg(short, long)]
        all: bool,
    },

    /// Rename a repository locally and on GitHub
    #[command(visible_alias = "rn")]
    Rename {
        old_name: String,
        new_name: String,

        /// Only rename the local folder
        #[arg(long, conflicts_with = "github_only")]
        local_only: bool,

        /// Only rename on GitHub
        #[arg(long)]
        github_only: bool,
    },
}

impl RpArgs {
    /// Execute the repository command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let cache = RepoCache::from_config(&ctx.config.repos)?;
        let prompter = ctx.prompter();

        match &self.command {
            None => switch(&cache, None, self.refresh, prompter).await,
            Some(RpCommand::Switch { name, refresh }) => {
                switch(&cache, name.as_deref(), *refresh || self.refresh, prompter).await
            }
            Some(RpCommand::List { json, path_only, refresh }) => {
                list(&cache, *json, *path_only, *refresh || self.refresh).await
            }
            Some(RpCommand::Refresh) => refresh(&cache).await,
            Some(RpCommand::Create { name, public, private: _, description, path, no_clone }) => {
                let visibility = if *public { Visibility::Public } else { Visibility::Private };
                let dest = Destination::new(path.as_deref(), *no_clone);
                create(&cache, name, visibility, description.as_deref(), dest, prompter).await
            }
            Some(RpCommand::Fork { repo, path, name, no_clone }) => {
                let dest = Destination::new(path.as_deref(), *no_clone);
                fork(&cache, repo.as_deref(), name.as_deref(), dest, prompter).await
            }
            Some(RpCommand::Clone { name, path, all }) => {
                clone(&cache, name.as_deref(), path.as_deref(), *all, prompter).await
            }
            Some(RpCommand::Rename { old_name, new_name, local_only, github_only }) => {
                rename(&cache, old_name, new_name, !*github_only, !*local_only).await
            }
        }
    }
}

/// Where a new clone should go
struct Destination<'a> {
    path: Option<&'a str>,
    skip: bool,
}

impl<'a> Destination<'a> {
    fn new(path: Option<&'a str>, skip: bool) -> Self {
        Self { path, skip }
    }

    /// Resolve to a directory, prompting when no path was given
    fn resolve(&self, cache: &RepoCache, prompter: &dyn Prompter) -> Option<PathBuf> {
        match self.path {
            Some(p) => Some(ui::expand_home(p)),
            None => ui::select_directory(prompter, "Clone to", cache.scan_paths()),
        }
    }
}

/// Picker rows: name padded to the longest name, then the `~`-shortened path
pub fn format_repo_options(repos: &[RepoRecord]) -> Vec<String> {
    let width = repos.iter().map(|r| r.name.chars().count()).max().unwrap_or(0);
    repos
        .iter()
        .map(|r| format!("{:<width$}  {}", r.name, ui::shorten_home(&r.path), width = width))
        .collect()
}

fn remote_badge(kind: RemoteKind) -> String {
    match kind {
        RemoteKind::Github => "[github]".green().to_string(),
        RemoteKind::Local => "[local]".yellow().to_string(),
        RemoteKind::Other => String::new(),
        other => ui::dim(format!("[{}]", other.as_str())),
    }
}

async fn switch(cache: &RepoCache, name: Option<&str>, refresh: bool, prompter: &dyn Prompter) -> anyhow::Result<()> {
    if let Some(name) = name {
        let (repos, _) = cache.get(refresh).await;
        if repos.is_empty() {
            bail!("No repositories found. Try 'rp refresh'");
        }
        let Some(repo) = find_in(&repos, name) else {
            bail!("Repository '{}' not found", name);
        };
        request_directory_change(HandoffTarget::Repo, &repo.path);
        return Ok(());
    }

    let mut force = refresh;
    loop {
        let (repos, from_cache) = cache.get(force).await;
        if repos.is_empty() {
            bail!("No repositories found. Try 'rp refresh'");
        }

        let mut options = format_repo_options(&repos);
        if from_cache {
            options.insert(0, REFRESH_OPTION.to_string());
        }

        let Some(index) = prompter.select("Select repository", &options) else {
            ui::cancelled();
            return Ok(());
        };

        let offset = usize::from(from_cache);
        if from_cache && index == 0 {
            force = true;
            continue;
        }
        let Some(repo) = repos.get(index - offset) else {
            ui::cancelled();
            return Ok(());
        };
        request_directory_change(HandoffTarget::Repo, &repo.path);
        return Ok(());
    }
}

async fn list(cache: &RepoCache, json: bool, path_only: bool, refresh: bool) -> anyhow::Result<()> {
    let (repos, _) = cache.get(refresh).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&repos)?);
        return Ok(());
    }
    if path_only {
        for repo in &repos {
            println!("{}", repo.path.display());
        }
        return Ok(());
    }
    if repos.is_empty() {
        println!("{}", ui::dim("No repositories found"));
        return Ok(());
    }

    let name_width = repos.iter().map(|r| r.name.chars().count()).max().unwrap_or(0);
    let paths: Vec<String> = repos.iter().map(|r| ui::shorten_home(&r.path)).collect();
    let path_width = paths.iter().map(|p| p.chars().count()).max().unwrap_or(0);

    for (repo, path) in repos.iter().zip(&paths) {
        // Pad before styling so escape codes don't skew the columns
        let name = format!("{:<w$}", repo.name, w = name_width);
        let path = format!("{:<w$}", path, w = path_width);
        println!(
            "  {} {} {}",
            name.cyan().bold(),
            ui::dim(path),
            remote_badge(repo.remote_type)
        );
    }
    Ok(())
}

async fn refresh(cache: &RepoCache) -> anyhow::Result<()> {
    println!("{}", ui::info("Scanning for repositories..."));
    let (repos, _) = cache.get(true).await;
    println!("{}", ui::success(format!("Found {} repositories", repos.len())));
    Ok(())
}

/// Clone over SSH, falling back to `gh repo clone`
async fn clone_with_fallback(ssh_url: &str, gh_spec: &str, dest: &Path) -> anyhow::Result<()> {
    let dest_str = dest.to_string_lossy();
    let ssh = process::run("git", &["clone", ssh_url, &dest_str], None).await;
    match ssh {
        Ok(output) if output.success() => return Ok(()),
        Ok(output) => debug!(error = %output.error_line(), "SSH clone failed"),
        Err(e) => debug!(error = %e, "SSH clone failed"),
    }

    println!("{}", ui::warn("SSH clone failed, trying gh clone..."));
    if let Err(e) = GhClient::new().clone_repo(gh_spec, dest).await {
        debug!(error = %e, "gh clone failed");
    }
    if dest.exists() {
        Ok(())
    } else {
        Err(anyhow!("Clone failed"))
    }
}

/// Register a fresh clone and hand off to it
async fn finish_clone(cache: &RepoCache, path: &Path) -> anyhow::Result<()> {
    if let Err(e) = cache.add(path).await {
        warn!(path = %path.display(), error = %e, "Could not add clone to cache");
    }
    println!("{}", ui::success(format!("Cloned to {}", path.display())));
    request_directory_change(HandoffTarget::Repo, path);
    Ok(())
}

async fn create(
    cache: &RepoCache,
    name: &str,
    visibility: Visibility,
    description: Option<&str>,
    dest: Destination<'_>,
    prompter: &dyn Prompter,
) -> anyhow::Result<()> {
    validate_github_repo(name)?;

    println!(
        "{}",
        ui::info(format!("Creating {} repository '{}' on GitHub...", visibility.as_str(), name))
    );
    let gh = GhClient::new();
    let url = gh
        .create_repo(name, visibility, description)
        .await
        .map_err(|e| anyhow!("Failed to create repository: {}", e))?;
    println!("{}", ui::success(format!("Created repository: {}", url)));

    if dest.skip {
        return Ok(());
    }
    let Some(dir) = dest.resolve(cache, prompter) else {
        println!("{}", ui::dim("Cancelled clone."));
        return Ok(());
    };

    let owner = match owner_from_repo_url(&url) {
        Some(owner) => owner.to_string(),
        None => gh.viewer_login().await?,
    };
    let clone_path = dir.join(name);
    println!("{}", ui::info(format!("Cloning to {}...", clone_path.display())));
    clone_with_fallback(&ssh_clone_url(&owner, name), name, &clone_path).await?;
    finish_clone(cache, &clone_path).await
}

/// Split and validate `owner/name`
fn parse_full_name(full_name: &str) -> anyhow::Result<(&str, &str)> {
    let Some((owner, name)) = full_name.split_once('/') else {
        bail!("Expected owner/name, got '{}'", full_name);
    };
    validate_github_owner(owner)?;
    validate_github_repo(name)?;
    Ok((owner, name))
}

fn search_row(full_name: &str, description: &str) -> String {
    let description: String = description.chars().take(40).collect();
    format!("{}  {}", full_name, description)
}

async fn fork(
    cache: &RepoCache,
    repo: Option<&str>,
    local_name: Option<&str>,
    dest: Destination<'_>,
    prompter: &dyn Prompter,
) -> anyhow::Result<()> {
    let gh = GhClient::new();

    let full_name = match repo {
        Some(repo) => repo.to_string(),
        None => {
            let Some(query) = prompter.input("Search GitHub repos", None) else {
                ui::cancelled();
                return Ok(());
            };
            let hits = gh.search_repos(&query).await.unwrap_or_default();
            if hits.is_empty() {
                bail!("Search failed or no results");
            }
            let options: Vec<String> = hits.iter().map(|h| search_row(&h.full_name, &h.description)).collect();
            match prompter.select("Select repo to fork", &options).and_then(|i| hits.get(i)) {
                Some(hit) => hit.full_name.clone(),
                None => {
                    ui::cancelled();
                    return Ok(());
                }
            }
        }
    };
    let (_, repo_name) = parse_full_name(&full_name)?;

    println!("{}", ui::info(format!("Forking {}...", full_name)));
    gh.fork_repo(&full_name)
        .await
        .map_err(|e| anyhow!("Failed to fork repository: {}", e))?;
    println!("{}", ui::success(format!("Forked {}", full_name)));

    if dest.skip {
        return Ok(());
    }
    let Some(dir) = dest.resolve(cache, prompter) else {
        println!("{}", ui::dim("Cancelled clone."));
        return Ok(());
    };

    let folder = match local_name {
        Some(name) => validate_github_repo(name)?,
        None => repo_name,
    };
    let clone_path = dir.join(folder);

    let viewer = gh
        .viewer_login()
        .await
        .map_err(|_| anyhow!("Could not determine your GitHub username"))?;

    println!("{}", ui::info(format!("Cloning to {}...", clone_path.display())));
    let gh_spec = format!("{}/{}", viewer, repo_name);
    clone_with_fallback(&ssh_clone_url(&viewer, repo_name), &gh_spec, &clone_path).await?;
    finish_clone(cache, &clone_path).await
}

/// Picker rows for `clone`, marking repositories already on disk
fn clone_options(remote: &[OwnedRepo], local: &HashMap<String, PathBuf>) -> Vec<String> {
    remote
        .iter()
        .map(|r| match local.get(&r.name) {
            Some(path) => format!("{}  [cloned: {}]", r.name, ui::shorten_home(path)),
            None => {
                let description: String = r.description.chars().take(40).collect();
                format!("{}  {}", r.name, description)
            }
        })
        .collect()
}

async fn clone(
    cache: &RepoCache,
    name: Option<&str>,
    path: Option<&str>,
    all: bool,
    prompter: &dyn Prompter,
) -> anyhow::Result<()> {
    println!("{}", ui::info("Fetching your repositories..."));
    let gh = GhClient::new();
    let remote = gh
        .list_own_repos()
        .await
        .map_err(|e| anyhow!("Failed to fetch repositories: {}", e))?;
    if remote.is_empty() {
        bail!("Failed to fetch repositories");
    }

    let (local_repos, _) = cache.get(false).await;
    let mut local: HashMap<String, PathBuf> = HashMap::new();
    for repo in &local_repos {
        local.entry(repo.name.clone()).or_insert_with(|| repo.path.clone());
    }

    let to_clone: Vec<&OwnedRepo> = if let Some(name) = name {
        validate_github_repo(name)?;
        let Some(repo) = remote.iter().find(|r| r.name == name) else {
            bail!("Repository '{}' not found", name);
        };
        if let Some(existing) = local.get(name) {
            println!("{}", ui::info(format!("'{}' already cloned at {}", name, existing.display())));
            request_directory_change(HandoffTarget::Repo, existing);
            return Ok(());
        }
        vec![repo]
    } else if all {
        let uncloned: Vec<&OwnedRepo> = remote.iter().filter(|r| !local.contains_key(&r.name)).collect();
        if uncloned.is_empty() {
            println!("{}", ui::info("All repos are already cloned"));
            return Ok(());
        }
        uncloned
    } else {
        let options = clone_options(&remote, &local);
        let Some(selected) = prompter.select("Select repository", &options).and_then(|i| remote.get(i)) else {
            ui::cancelled();
            return Ok(());
        };
        if let Some(existing) = local.get(&selected.name) {
            println!("{}", ui::info(format!("Already cloned, switching to {}", existing.display())));
            request_directory_change(HandoffTarget::Repo, existing);
            return Ok(());
        }
        vec![selected]
    };

    let dest = Destination::new(path, false);
    let Some(dir) = dest.resolve(cache, prompter) else {
        ui::cancelled();
        return Ok(());
    };

    let mut last_clone = None;
    for repo in &to_clone {
        let clone_path = dir.join(&repo.name);
        if clone_path.exists() {
            println!("{}", ui::warn(format!("Skipping {}: directory already exists", repo.name)));
            continue;
        }

        println!("{}", ui::info(format!("Cloning {}...", repo.name)));
        match gh.clone_repo(&repo.name, &clone_path).await {
            Ok(()) if clone_path.exists() => {
                if let Err(e) = cache.add(&clone_path).await {
                    warn!(error = %e, "Could not add clone to cache");
                }
                println!("{}", ui::success(format!("Cloned {} to {}", repo.name, clone_path.display())));
                last_clone = Some(clone_path);
            }
            Ok(()) => eprintln!("{}", ui::error(format!("Failed to clone {}", repo.name))),
            Err(e) => {
                debug!(error = %e, "gh clone failed");
                eprintln!("{}", ui::error(format!("Failed to clone {}", repo.name)));
            }
        }
    }

    if to_clone.len() == 1 {
        if let Some(path) = last_clone {
            request_directory_change(HandoffTarget::Repo, &path);
        }
    }
    Ok(())
}

/// Move a directory and keep the cache in step
async fn move_local(cache: &RepoCache, from: &Path, to: &Path) -> anyhow::Result<()> {
    std::fs::rename(from, to)?;
    if let Err(e) = cache.remove(from).await {
        warn!(error = %e, "Could not drop old path from cache");
    }
    if let Err(e) = cache.add(to).await {
        warn!(error = %e, "Could not add new path to cache");
    }
    Ok(())
}

async fn rename(
    cache: &RepoCache,
    old_name: &str,
    new_name: &str,
    local: bool,
    github: bool,
) -> anyhow::Result<()> {
    validate_github_repo(new_name)?;

    let mut moved: Option<(PathBuf, PathBuf)> = None;
    if local {
        let Some(repo) = cache.find(old_name).await else {
            bail!("Repository '{}' not found locally", old_name);
        };
        let old_path = repo.path.clone();
        let parent = old_path
            .parent()
            .ok_or_else(|| anyhow!("Cannot rename '{}'", old_path.display()))?;
        let new_path = parent.join(new_name);
        if new_path.exists() {
            bail!("Directory '{}' already exists", new_path.display());
        }

        println!(
            "{}",
            ui::info(format!("Renaming {} → {}", old_path.display(), new_path.display()))
        );
        move_local(cache, &old_path, &new_path).await?;
        println!("{}", ui::success("Renamed local directory"));
        moved = Some((old_path, new_path));
    }

    if github {
        println!(
            "{}",
            ui::info(format!("Renaming repository on GitHub: {} → {}", old_name, new_name))
        );
        // `gh repo rename` acts on the repository of its working directory
        let gh = match &moved {
            Some((_, new_path)) => GhClient::in_dir(new_path),
            None => match cache.find(old_name).await {
                Some(repo) => GhClient::in_dir(&repo.path),
                None => GhClient::in_dir(super::current_dir()?),
            },
        };

        if let Err(e) = gh.rename_repo(new_name).await {
            debug!(error = %e, "GitHub rename failed");
            if let Some((old_path, new_path)) = &moved {
                move_local(cache, new_path, old_path).await?;
                println!("{}", ui::warn("Reverted local rename"));
            }
            bail!("Failed to rename on GitHub");
        }
        println!("{}", ui::success("Renamed on GitHub"));

        if let Some((_, new_path)) = &moved {
            match gh.viewer_login().await {
                Ok(viewer) => {
                    let url = ssh_clone_url(&viewer, new_name);
                    match GitRepo::new(new_path).set_origin_url(&url).await {
                        Ok(()) => println!("{}", ui::info(format!("Updated remote URL to {}", url))),
                        Err(e) => debug!(error = %e, "Could not update origin"),
                    }
                }
                Err(e) => debug!(error = %e, "Could not determine viewer"),
            }
        }
    }

    if let Some((_, new_path)) = &moved {
        request_directory_change(HandoffTarget::Repo, new_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::tests::ScriptedPrompter;
    use std::time::Duration;

    fn record(path: &str) -> RepoRecord {
        RepoRecord::new(PathBuf::from(path), None)
    }

    #[test]
    fn test_format_repo_options_aligns_names() {
        let repos = vec![record("/srv/api"), record("/srv/frontend")];
        let options = format_repo_options(&repos);
        assert_eq!(options[0], "api       /srv/api");
        assert_eq!(options[1], "frontend  /srv/frontend");
        assert!(format_repo_options(&[]).is_empty());
    }

    #[test]
    fn test_remote_badges() {
        colored::control::set_override(false);
        assert_eq!(remote_badge(RemoteKind::Github), "[github]");
        assert_eq!(remote_badge(RemoteKind::Local), "[local]");
        assert_eq!(remote_badge(RemoteKind::Gitlab), "[gitlab]");
        assert_eq!(remote_badge(RemoteKind::Other), "");
    }

    #[test]
    fn test_parse_full_name() {
        assert_eq!(parse_full_name("rust-lang/cargo").unwrap(), ("rust-lang", "cargo"));
        assert!(parse_full_name("cargo").is_err());
        assert!(parse_full_name("-bad/cargo").is_err());
    }

    #[test]
    fn test_clone_options_mark_cloned() {
        let remote = vec![
            OwnedRepo {
                name: "tools".to_string(),
                url: String::new(),
                description: "Shell helpers".to_string(),
            },
            OwnedRepo {
                name: "notes".to_string(),
                url: String::new(),
                description: String::new(),
            },
        ];
        let mut local = HashMap::new();
        local.insert("notes".to_string(), PathBuf::from("/srv/notes"));

        let options = clone_options(&remote, &local);
        assert_eq!(options[0], "tools  Shell helpers");
        assert_eq!(options[1], "notes  [cloned: /srv/notes]");
    }

    #[tokio::test]
    async fn test_switch_refresh_entry_rescans() {
        let scan = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = RepoCache::new(
            cache_dir.path(),
            Duration::from_secs(3600),
            vec![scan.path().to_path_buf()],
            Duration::from_secs(10),
        );
        cache.save(&[record("/nonexistent/demo")]).unwrap();

        // First pick "[refresh list]", then cancel on the rescanned (empty) list
        let prompter = ScriptedPrompter::default();
        prompter.selections.borrow_mut().push_back(Some(0));
        let err = switch(&cache, None, false, &prompter).await.unwrap_err();
        assert!(err.to_string().contains("No repositories found"));

        let seen = prompter.seen.borrow();
        assert_eq!(seen[0][0], REFRESH_OPTION);
        assert_eq!(seen.len(), 1);
    }
}
