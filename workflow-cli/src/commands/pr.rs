//! Pull request commands (`pr`)

use std::fmt::Write as _;

use anyhow::{anyhow, bail};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::debug;
use workflow_core::{request_directory_change, GitRepo, HandoffTarget};
use workflow_github::pr::format_date;
use workflow_github::{ActionResult, DiscussionComment, GhClient, PullRequest, RepoInfo, ReviewThread};

use super::{current_dir, Context};
use crate::commands::wt;
use crate::ui::{self, Prompter};

/// Preview length in `pr threads` rows
const PREVIEW_SHORT: usize = 40;
/// Preview length in thread pickers
const PREVIEW_LONG: usize = 50;
/// Diff hunk lines shown per thread without `--full`
const DIFF_CONTEXT_LINES: usize = 5;

/// GitHub PR management with interactive selection
#[derive(Args, Debug)]
pub struct PrArgs {
    /// PR number (default: the current branch's PR)
    #[arg(short = 'p', long = "pr-num", global = true)]
    pub pr_num: Option<u64>,

    #[command(subcommand)]
    pub command: Option<PrCommand>,
}

#[derive(Subcommand, Debug)]
pub enum PrCommand {
    /// Show PR metadata, description and review comments
    #[command(visible_alias = "i")]
    Info {
        number: Option<u64>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Show full diff context
        #[arg(short, long)]
        full: bool,

        /// Include resolved threads
        #[arg(short, long)]
        resolved: bool,
    },

    /// List files changed in the PR
    #[command(visible_alias = "f")]
    Files { number: Option<u64> },

    /// Show the PR diff
    #[command(visible_alias = "d")]
    Diff { number: Option<u64> },

    /// List review threads with their IDs
    #[command(visible_alias = "t")]
    Threads {
        number: Option<u64>,

        /// Include resolved threads
        #[arg(short, long)]
        resolved: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List open PRs in the repository
    #[command(visible_alias = "ls")]
    List {
        /// Filter by author
        #[arg(short, long)]
        author: Option<String>,

        /// Only your own PRs
        #[arg(short, long)]
        mine: bool,

        /// Exclude draft PRs
        #[arg(long)]
        no_draft: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Resolve review threads
    #[command(visible_alias = "r")]
    Resolve {
        /// Thread IDs (PRRT_...)
        thread_ids: Vec<String>,

        /// Resolve every unresolved thread
        #[arg(short, long)]
        all: bool,
    },

    /// Reopen resolved review threads
    #[command(visible_alias = "ur")]
    Unresolve {
        /// Thread IDs (PRRT_...)
        thread_ids: Vec<String>,
    },

    /// Reply to a review thread
    #[command(visible_alias = "re")]
    Reply {
        thread_id: Option<String>,
        message: Option<String>,

        /// Also resolve the thread
        #[arg(short, long)]
        resolve: bool,
    },

    /// Post a discussion comment
    #[command(visible_alias = "c")]
    Comment {
        message: Option<String>,
        number: Option<u64>,
    },

    /// Submit an approving review
    #[command(visible_alias = "a")]
    Approve {
        number: Option<u64>,

        /// Approval message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Submit a review requesting changes
    #[command(name = "request-changes", visible_alias = "rc")]
    RequestChanges { message: String, number: Option<u64> },

    /// Mark a draft PR ready for review
    Ready { number: Option<u64> },

    /// Convert a PR to draft
    Draft { number: Option<u64> },

    /// Open the PR in a browser
    #[command(visible_alias = "o")]
    Open { number: Option<u64> },

    /// Create (or switch to) a worktree for the PR branch
    #[command(visible_aliases = ["co", "sw"])]
    Checkout {
        number: Option<u64>,
        name: Option<String>,
    },

    /// Close the PR
    Close {
        number: Option<u64>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl PrArgs {
    /// Execute the PR command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let gh = GhClient::new();
        let prompter = ctx.prompter();
        let pick = |n: &Option<u64>| n.or(self.pr_num);

        match &self.command {
            None => interactive(&gh, self.pr_num, prompter).await,
            Some(PrCommand::Info { number, json, full, resolved }) => {
                let pr = gh.view_pr(pick(number)).await?;
                info(&gh, &pr, *json, *full, *resolved).await
            }
            Some(PrCommand::Files { number }) => {
                let pr = gh.view_pr(pick(number)).await?;
                files(&gh, &pr).await
            }
            Some(PrCommand::Diff { number }) => {
                let pr = gh.view_pr(pick(number)).await?;
                diff(&gh, &pr).await
            }
            Some(PrCommand::Threads { number, resolved, json }) => {
                let pr = gh.view_pr(pick(number)).await?;
                threads(&gh, &pr, *resolved, *json).await
            }
            Some(PrCommand::List { author, mine, no_draft, json }) => {
                list(&gh, author.clone(), *mine, !*no_draft, *json).await
            }
            Some(PrCommand::Resolve { thread_ids, all }) => {
                let pr = gh.view_pr(self.pr_num).await?;
                resolve(&gh, &pr, thread_ids, *all, prompter).await
            }
            Some(PrCommand::Unresolve { thread_ids }) => {
                let pr = gh.view_pr(self.pr_num).await?;
                unresolve(&gh, &pr, thread_ids, prompter).await
            }
            Some(PrCommand::Reply { thread_id, message, resolve }) => {
                let pr = gh.view_pr(self.pr_num).await?;
                reply(&gh, &pr, thread_id.as_deref(), message.as_deref(), *resolve, prompter).await
            }
            Some(PrCommand::Comment { message, number }) => {
                let pr = gh.view_pr(pick(number)).await?;
                comment(&gh, &pr, message.as_deref(), prompter).await
            }
            Some(PrCommand::Approve { number, message }) => {
                let pr = gh.view_pr(pick(number)).await?;
                report(&[gh.approve(pr.number, message.as_deref()).await])
            }
            Some(PrCommand::RequestChanges { message, number }) => {
                let pr = gh.view_pr(pick(number)).await?;
                report(&[gh.request_changes(pr.number, message).await])
            }
            Some(PrCommand::Ready { number }) => {
                let pr = gh.view_pr(pick(number)).await?;
                report(&[gh.mark_ready(pr.number).await])
            }
            Some(PrCommand::Draft { number }) => {
                let pr = gh.view_pr(pick(number)).await?;
                report(&[gh.mark_draft(pr.number).await])
            }
            Some(PrCommand::Open { number }) => {
                let pr = gh.view_pr(pick(number)).await?;
                open(&pr).await;
                Ok(())
            }
            Some(PrCommand::Checkout { number, name }) => {
                let pr = gh.view_pr(pick(number)).await?;
                checkout(&pr, name.as_deref(), prompter).await
            }
            Some(PrCommand::Close { number, force }) => {
                let pr = gh.view_pr(pick(number)).await?;
                close(&gh, &pr, *force, prompter).await
            }
        }
    }
}

/// Entries of the interactive action menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrAction {
    Info,
    Threads,
    Files,
    Diff,
    Open,
    Worktree,
    Resolve,
    Reply,
    Comment,
    Approve,
    RequestChanges,
    ToggleDraft,
    Quit,
}

impl PrAction {
    const ALL: [PrAction; 13] = [
        PrAction::Info,
        PrAction::Threads,
        PrAction::Files,
        PrAction::Diff,
        PrAction::Open,
        PrAction::Worktree,
        PrAction::Resolve,
        PrAction::Reply,
        PrAction::Comment,
        PrAction::Approve,
        PrAction::RequestChanges,
        PrAction::ToggleDraft,
        PrAction::Quit,
    ];

    fn label(&self, unresolved: usize) -> String {
        match self {
            PrAction::Info => "[i] View full info".to_string(),
            PrAction::Threads => format!("[t] View threads ({} unresolved)", unresolved),
            PrAction::Files => "[f] View files".to_string(),
            PrAction::Diff => "[d] View diff".to_string(),
            PrAction::Open => "[o] Open in browser".to_string(),
            PrAction::Worktree => "[w] Create worktree".to_string(),
            PrAction::Resolve => "[r] Resolve threads".to_string(),
            PrAction::Reply => "[y] Reply to thread".to_string(),
            PrAction::Comment => "[c] Post comment".to_string(),
            PrAction::Approve => "[a] Approve".to_string(),
            PrAction::RequestChanges => "[x] Request changes".to_string(),
            PrAction::ToggleDraft => "[s] Toggle draft/ready".to_string(),
            PrAction::Quit => "[q] Quit".to_string(),
        }
    }
}

/// Print each result. Returns the number of failures.
fn print_results(results: &[ActionResult]) -> usize {
    let mut failed = 0;
    for result in results {
        if result.success {
            println!("{}", ui::success(&result.message));
        } else {
            eprintln!("{}", ui::error(&result.message));
            failed += 1;
        }
    }
    failed
}

/// Print results and fail the command when any action failed
fn report(results: &[ActionResult]) -> anyhow::Result<()> {
    if let [single] = results {
        if !single.success {
            return Err(anyhow!(single.message.clone()));
        }
    }
    let failed = print_results(results);
    if failed > 0 {
        bail!("{} of {} actions failed", failed, results.len());
    }
    Ok(())
}

fn unresolved_count(threads: &[ReviewThread]) -> usize {
    threads.iter().filter(|t| !t.is_resolved).count()
}

async fn load_threads(gh: &GhClient, pr: &PullRequest) -> anyhow::Result<(RepoInfo, Vec<ReviewThread>)> {
    let repo = gh.repo_info().await?;
    let threads = gh.review_threads(&repo, pr.number).await?;
    Ok((repo, threads))
}

fn print_summary(pr: &PullRequest) {
    let draft = if pr.is_draft {
        " [DRAFT]".yellow().to_string()
    } else {
        String::new()
    };
    println!();
    println!(
        "{}{}{}",
        format!("PR #{}: ", pr.number).cyan().bold(),
        pr.title.bold(),
        draft
    );
    println!("{}", ui::dim(&pr.url));
    println!(
        "  Author: {} | Base: {} ← {}",
        pr.author, pr.base_branch, pr.head_branch
    );
    let review = pr
        .review_decision
        .as_ref()
        .map(|r| format!(" | Review: {}", r))
        .unwrap_or_default();
    println!(
        "  +{} -{} in {} files{}",
        pr.additions, pr.deletions, pr.changed_files, review
    );
    println!();
}

async fn interactive(gh: &GhClient, pr_num: Option<u64>, prompter: &dyn Prompter) -> anyhow::Result<()> {
    let number = match pr_num {
        Some(n) => n,
        None => {
            let prs = gh.list_open_prs(None, true).await?;
            if prs.is_empty() {
                bail!("No open PRs found");
            }
            let options: Vec<String> = prs.iter().map(PullRequest::picker_label).collect();
            match prompter.select("Select PR", &options).and_then(|i| prs.get(i)) {
                Some(pr) => pr.number,
                None => {
                    ui::cancelled();
                    return Ok(());
                }
            }
        }
    };

    let mut pr = gh.view_pr(Some(number)).await?;
    print_summary(&pr);

    loop {
        let unresolved = match load_threads(gh, &pr).await {
            Ok((_, threads)) => unresolved_count(&threads),
            Err(e) => {
                debug!(error = %e, "Could not load review threads");
                0
            }
        };
        let labels: Vec<String> = PrAction::ALL.iter().map(|a| a.label(unresolved)).collect();

        println!();
        let action = prompter
            .select("Action", &labels)
            .and_then(|i| PrAction::ALL.get(i).copied())
            .unwrap_or(PrAction::Quit);

        // Errors inside the menu are shown and the loop continues
        let outcome = match action {
            PrAction::Quit => {
                println!("{}", ui::dim("Done."));
                return Ok(());
            }
            PrAction::Worktree => return checkout(&pr, None, prompter).await,
            PrAction::Info => info(gh, &pr, false, false, false).await,
            PrAction::Threads => threads(gh, &pr, false, false).await,
            PrAction::Files => files(gh, &pr).await,
            PrAction::Diff => diff(gh, &pr).await,
            PrAction::Open => {
                open(&pr).await;
                Ok(())
            }
            PrAction::Resolve => resolve(gh, &pr, &[], false, prompter).await,
            PrAction::Reply => reply(gh, &pr, None, None, false, prompter).await,
            PrAction::Comment => comment(gh, &pr, None, prompter).await,
            PrAction::Approve => {
                print_results(&[gh.approve(pr.number, None).await]);
                Ok(())
            }
            PrAction::RequestChanges => match prompter.input("Message", None) {
                Some(message) => {
                    print_results(&[gh.request_changes(pr.number, &message).await]);
                    Ok(())
                }
                None => {
                    ui::cancelled();
                    Ok(())
                }
            },
            PrAction::ToggleDraft => {
                let result = if pr.is_draft {
                    gh.mark_ready(pr.number).await
                } else {
                    gh.mark_draft(pr.number).await
                };
                print_results(&[result]);
                pr = gh.view_pr(Some(pr.number)).await?;
                Ok(())
            }
        };

        if let Err(e) = outcome {
            eprintln!("{}", ui::error(format!("{:#}", e)));
        }
    }
}

/// Last `DIFF_CONTEXT_LINES` lines of a hunk unless `full`
fn trim_hunk(hunk: &str, full: bool) -> String {
    let hunk = hunk.trim();
    if full {
        return hunk.to_string();
    }
    let lines: Vec<&str> = hunk.lines().collect();
    let start = lines.len().saturating_sub(DIFF_CONTEXT_LINES);
    lines[start..].join("\n")
}

/// Markdown report for `pr info`
fn render_info(
    pr: &PullRequest,
    threads: &[ReviewThread],
    comments: &[DiscussionComment],
    full: bool,
    include_resolved: bool,
) -> String {
    let mut out = String::new();
    let draft = if pr.is_draft { " [DRAFT]" } else { "" };

    // Writing into a String cannot fail
    let _ = writeln!(out, "# PR #{}: {}{}", pr.number, pr.title, draft);
    let _ = writeln!(out);
    let _ = writeln!(out, "**URL:** {}", pr.url);
    let _ = writeln!(out, "**Author:** {}", pr.author);
    let _ = writeln!(out, "**State:** {}", pr.state);
    if let Some(decision) = &pr.review_decision {
        let _ = writeln!(out, "**Review Decision:** {}", decision);
    }
    if let Some(mergeable) = &pr.mergeable {
        let _ = writeln!(out, "**Mergeable:** {}", mergeable);
    }
    let _ = writeln!(out, "**Base:** {} ← {}", pr.base_branch, pr.head_branch);
    let _ = writeln!(
        out,
        "**Changes:** +{} -{} in {} files",
        pr.additions, pr.deletions, pr.changed_files
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Description");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", pr.body.as_deref().unwrap_or("*No description provided*"));
    let _ = writeln!(out);

    let shown: Vec<&ReviewThread> = if include_resolved {
        let resolved = threads.len() - unresolved_count(threads);
        let _ = writeln!(
            out,
            "## Review Comments ({} unresolved, {} resolved)",
            unresolved_count(threads),
            resolved
        );
        threads.iter().collect()
    } else {
        let shown: Vec<&ReviewThread> = threads.iter().filter(|t| !t.is_resolved).collect();
        let _ = writeln!(out, "## Unresolved Review Comments ({})", shown.len());
        shown
    };
    let _ = writeln!(out);

    if shown.is_empty() {
        let _ = writeln!(out, "*No review comments to display*");
        let _ = writeln!(out);
    }
    for thread in shown {
        let resolved = if thread.is_resolved { "[RESOLVED] " } else { "" };
        let outdated = if thread.is_outdated { "[outdated] " } else { "" };
        let _ = writeln!(
            out,
            "### {}{}{}:{}",
            resolved,
            outdated,
            thread.path,
            thread.line_label()
        );
        let _ = writeln!(out, "**Thread ID:** `{}`", thread.id);
        let _ = writeln!(out);

        for (i, comment) in thread.comments.iter().enumerate() {
            if i == 0 {
                if let Some(hunk) = &comment.diff_hunk {
                    let _ = writeln!(out, "```diff");
                    let _ = writeln!(out, "{}", trim_hunk(hunk, full));
                    let _ = writeln!(out, "```");
                    let _ = writeln!(out);
                }
            }
            let _ = writeln!(out, "**{}** ({}):", comment.author, format_date(&comment.created_at));
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", comment.body);
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(out, "## Discussion Comments ({})", comments.len());
    let _ = writeln!(out);
    if comments.is_empty() {
        let _ = writeln!(out, "*No discussion comments*");
    }
    for comment in comments {
        let _ = writeln!(out, "### {} ({})", comment.author, format_date(&comment.created_at));
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", comment.body);
        let _ = writeln!(out);
    }
    out
}

#[derive(Serialize)]
struct InfoJson<'a> {
    pr: &'a PullRequest,
    review_threads: &'a [ReviewThread],
    discussion_comments: &'a [DiscussionComment],
}

async fn info(gh: &GhClient, pr: &PullRequest, json: bool, full: bool, include_resolved: bool) -> anyhow::Result<()> {
    let (repo, threads) = load_threads(gh, pr).await?;
    let comments = gh.discussion_comments(&repo, pr.number).await?;

    if json {
        let output = InfoJson {
            pr,
            review_threads: &threads,
            discussion_comments: &comments,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print!("{}", render_info(pr, &threads, &comments, full, include_resolved));
    Ok(())
}

async fn files(gh: &GhClient, pr: &PullRequest) -> anyhow::Result<()> {
    for file in gh.pr_files(pr.number).await? {
        println!("{}", file);
    }
    Ok(())
}

async fn diff(gh: &GhClient, pr: &PullRequest) -> anyhow::Result<()> {
    let diff = gh.pr_diff(pr.number).await?;
    if !diff.is_empty() {
        println!("{}", diff);
    }
    Ok(())
}

/// `  ID  path:line  [status]  "preview"`
fn thread_row(thread: &ReviewThread) -> String {
    let status = if thread.is_resolved {
        "[resolved]".green()
    } else {
        "[unresolved]".yellow()
    };
    format!(
        "  {}  {}:{}  {}  \"{}\"",
        ui::dim(&thread.id),
        thread.path,
        thread.line_label(),
        status,
        thread.preview(PREVIEW_SHORT)
    )
}

async fn threads(gh: &GhClient, pr: &PullRequest, include_resolved: bool, json: bool) -> anyhow::Result<()> {
    let (_, mut threads) = load_threads(gh, pr).await?;
    if !include_resolved {
        threads.retain(|t| !t.is_resolved);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&threads)?);
        return Ok(());
    }

    if threads.is_empty() {
        println!("{}", ui::dim("No threads to display"));
        return Ok(());
    }
    for thread in &threads {
        println!("{}", thread_row(thread));
    }
    Ok(())
}

async fn list(
    gh: &GhClient,
    author: Option<String>,
    mine: bool,
    include_drafts: bool,
    json: bool,
) -> anyhow::Result<()> {
    let author = if mine {
        Some(gh.viewer_login().await?)
    } else {
        author
    };
    let prs = gh.list_open_prs(author.as_deref(), include_drafts).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prs)?);
        return Ok(());
    }

    if prs.is_empty() {
        println!("{}", ui::dim("No open PRs found"));
        return Ok(());
    }
    for pr in &prs {
        let draft = if pr.is_draft {
            " [draft]".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {}{} {} - {} {}",
            format!("#{}", pr.number).cyan().bold(),
            draft,
            pr.head_branch,
            pr.title,
            ui::dim(format!("@{}", pr.author))
        );
    }
    Ok(())
}

/// Multi-select over `candidates`; `None` when cancelled or nothing chosen
fn pick_threads(prompt: &str, candidates: &[ReviewThread], prompter: &dyn Prompter) -> Option<Vec<String>> {
    let options: Vec<String> = candidates.iter().map(|t| t.picker_label(PREVIEW_LONG)).collect();
    let picked = prompter.select_many(prompt, &options)?;
    let ids: Vec<String> = picked
        .into_iter()
        .filter_map(|i| candidates.get(i))
        .map(|t| t.id.clone())
        .collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

async fn resolve(
    gh: &GhClient,
    pr: &PullRequest,
    thread_ids: &[String],
    all: bool,
    prompter: &dyn Prompter,
) -> anyhow::Result<()> {
    let ids: Vec<String> = if all || thread_ids.is_empty() {
        let (_, threads) = load_threads(gh, pr).await?;
        let unresolved: Vec<ReviewThread> = threads.into_iter().filter(|t| !t.is_resolved).collect();

        if all {
            unresolved.into_iter().map(|t| t.id).collect()
        } else {
            if unresolved.is_empty() {
                println!("{}", ui::info("No unresolved threads"));
                return Ok(());
            }
            match pick_threads("Select threads to resolve", &unresolved, prompter) {
                Some(ids) => ids,
                None => {
                    ui::cancelled();
                    return Ok(());
                }
            }
        }
    } else {
        thread_ids.to_vec()
    };

    if ids.is_empty() {
        println!("{}", ui::dim("No threads to resolve"));
        return Ok(());
    }

    let mut results = Vec::with_capacity(ids.len());
    for id in &ids {
        results.push(gh.resolve_thread(id).await);
    }
    report(&results)
}

async fn unresolve(
    gh: &GhClient,
    pr: &PullRequest,
    thread_ids: &[String],
    prompter: &dyn Prompter,
) -> anyhow::Result<()> {
    let ids: Vec<String> = if thread_ids.is_empty() {
        let (_, threads) = load_threads(gh, pr).await?;
        let resolved: Vec<ReviewThread> = threads.into_iter().filter(|t| t.is_resolved).collect();
        if resolved.is_empty() {
            println!("{}", ui::info("No resolved threads"));
            return Ok(());
        }
        match pick_threads("Select threads to unresolve", &resolved, prompter) {
            Some(ids) => ids,
            None => {
                ui::cancelled();
                return Ok(());
            }
        }
    } else {
        thread_ids.to_vec()
    };

    let mut results = Vec::with_capacity(ids.len());
    for id in &ids {
        results.push(gh.unresolve_thread(id).await);
    }
    report(&results)
}

/// Unresolved threads first, original order otherwise
fn sort_for_reply(threads: &mut [ReviewThread]) {
    threads.sort_by_key(|t| t.is_resolved);
}

fn print_thread_context(thread: &ReviewThread) {
    println!();
    println!("--- Thread: {}:{} ---", thread.path, thread.line_label());
    for comment in &thread.comments {
        println!("@{} ({}):", comment.author, format_date(&comment.created_at));
        println!("{}", comment.body);
        println!();
    }
}

async fn reply(
    gh: &GhClient,
    pr: &PullRequest,
    thread_id: Option<&str>,
    message: Option<&str>,
    also_resolve: bool,
    prompter: &dyn Prompter,
) -> anyhow::Result<()> {
    let thread_id = match thread_id {
        Some(id) => workflow_github::review::check_thread_id(id)?.to_string(),
        None => {
            let (_, mut threads) = load_threads(gh, pr).await?;
            if threads.is_empty() {
                println!("{}", ui::info("No threads to reply to"));
                return Ok(());
            }
            sort_for_reply(&mut threads);

            let options: Vec<String> = threads.iter().map(|t| t.picker_label(PREVIEW_LONG)).collect();
            let Some(thread) = prompter
                .select("Select thread to reply to", &options)
                .and_then(|i| threads.get(i))
            else {
                ui::cancelled();
                return Ok(());
            };
            print_thread_context(thread);
            thread.id.clone()
        }
    };

    let message = match message {
        Some(m) => m.to_string(),
        None => match prompter.input("Reply", None) {
            Some(m) => m,
            None => {
                ui::cancelled();
                return Ok(());
            }
        },
    };

    let viewer = gh.viewer_login().await.ok();
    let pending = gh
        .pending_review(&pr.id, viewer.as_deref())
        .await
        .unwrap_or_else(|e| {
            debug!(error = %e, "Pending review lookup failed");
            None
        });

    let replied = gh.reply_to_thread(&thread_id, &message, &pr.id).await;
    let mut results = vec![replied.clone()];

    if replied.success {
        // Replies land in a pending review that must be submitted
        let submitted = gh
            .submit_pending_review(&pr.id, pending.as_ref().map(|r| r.id.as_str()))
            .await;
        if !submitted.success && pending.is_none() {
            results.push(submitted);
        }
        if also_resolve {
            results.push(gh.resolve_thread(&thread_id).await);
        }
    }
    report(&results)
}

async fn comment(gh: &GhClient, pr: &PullRequest, message: Option<&str>, prompter: &dyn Prompter) -> anyhow::Result<()> {
    let message = match message {
        Some(m) => m.to_string(),
        None => match prompter.input("Comment", None) {
            Some(m) => m,
            None => {
                ui::cancelled();
                return Ok(());
            }
        },
    };
    report(&[gh.post_comment(pr.number, &message).await])
}

async fn open(pr: &PullRequest) {
    println!("{}", ui::info(format!("Opening PR #{} in browser...", pr.number)));
    println!("  {}", pr.url);

    if !ui::open_url(&pr.url).await && ui::copy_to_clipboard(&pr.url).await {
        println!("{}", ui::dim("  (copied to clipboard)"));
    }
}

async fn checkout(pr: &PullRequest, name: Option<&str>, prompter: &dyn Prompter) -> anyhow::Result<()> {
    let repo = GitRepo::discover(&current_dir()?).await?;

    let Some(name) = wt::prompt_worktree_name(name, &pr.head_branch, prompter)? else {
        ui::cancelled();
        return Ok(());
    };

    let path = repo.worktree_path(&name);
    if path.exists() {
        println!("{}", ui::info(format!("Worktree '{}' already exists, switching to it...", name)));
        println!("{}", ui::info("Pulling latest changes..."));
        match GitRepo::new(&path).pull_ff_only().await {
            Ok(()) => println!("{}", ui::success("Updated to latest")),
            Err(e) => {
                debug!(error = %e, "Pull failed");
                println!("{}", ui::warn("Could not pull (may have local changes)"));
            }
        }
        request_directory_change(HandoffTarget::Worktree, &path);
        return Ok(());
    }

    println!("{}", ui::info(format!("Fetching PR #{}...", pr.number)));
    repo.fetch_pr_head(pr.number, &pr.head_branch)
        .await
        .map_err(|e| anyhow!("Failed to fetch PR #{}: {}", pr.number, e))?;

    let path = wt::create_worktree(&repo, &name, &pr.head_branch, false).await?;
    request_directory_change(HandoffTarget::Worktree, &path);
    Ok(())
}

async fn close(gh: &GhClient, pr: &PullRequest, force: bool, prompter: &dyn Prompter) -> anyhow::Result<()> {
    if !force && !ui::confirm(prompter, &ui::warn(format!("Close PR #{}?", pr.number)), false) {
        ui::cancelled();
        return Ok(());
    }
    report(&[gh.close(pr.number).await])
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_github::ThreadComment;

    fn sample_pr() -> PullRequest {
        PullRequest {
            number: 42,
            id: "PR_kw42".to_string(),
            title: "Add login".to_string(),
            body: None,
            url: "https://github.com/me/app/pull/42".to_string(),
            state: "OPEN".to_string(),
            author: "octocat".to_string(),
            base_branch: "main".to_string(),
            head_branch: "feature/login".to_string(),
            is_draft: true,
            mergeable: Some("MERGEABLE".to_string()),
            review_decision: None,
            additions: 12,
            deletions: 4,
            changed_files: 3,
        }
    }

    fn thread(id: &str, resolved: bool, hunk: Option<&str>) -> ReviewThread {
        ReviewThread {
            id: id.to_string(),
            path: "src/auth.rs".to_string(),
            line: Some(7),
            start_line: None,
            is_resolved: resolved,
            is_outdated: false,
            comments: vec![ThreadComment {
                id: format!("{}_c", id),
                author: "reviewer".to_string(),
                body: "Please check the token expiry".to_string(),
                created_at: "2024-05-01T10:00:00Z".to_string(),
                diff_hunk: hunk.map(str::to_string),
            }],
        }
    }

    #[test]
    fn test_action_menu_labels() {
        let labels: Vec<String> = PrAction::ALL.iter().map(|a| a.label(3)).collect();
        assert_eq!(labels.len(), 13);
        assert_eq!(labels[1], "[t] View threads (3 unresolved)");
        assert_eq!(labels.last().unwrap(), "[q] Quit");
        assert_eq!(PrAction::ALL[5], PrAction::Worktree);
    }

    #[test]
    fn test_trim_hunk() {
        let hunk = "@@ -1,7 +1,7 @@\n a\n b\n c\n d\n e\n f\n";
        assert_eq!(trim_hunk(hunk, false), " b\n c\n d\n e\n f");
        assert_eq!(trim_hunk(hunk, true).lines().count(), 7);
        assert_eq!(trim_hunk("one", false), "one");
    }

    #[test]
    fn test_render_info_unresolved_only() {
        let pr = sample_pr();
        let threads = vec![
            thread("PRRT_open", false, Some("@@ -1 +1 @@\n+let x = 1;")),
            thread("PRRT_done", true, None),
        ];
        let out = render_info(&pr, &threads, &[], false, false);

        assert!(out.starts_with("# PR #42: Add login [DRAFT]\n"));
        assert!(out.contains("**Mergeable:** MERGEABLE"));
        assert!(!out.contains("**Review Decision:**"));
        assert!(out.contains("*No description provided*"));
        assert!(out.contains("## Unresolved Review Comments (1)"));
        assert!(out.contains("### src/auth.rs:7"));
        assert!(out.contains("**Thread ID:** `PRRT_open`"));
        assert!(out.contains("```diff\n@@ -1 +1 @@\n+let x = 1;\n```"));
        assert!(out.contains("**reviewer** (2024-05-01 10:00):"));
        assert!(!out.contains("PRRT_done"));
        assert!(out.contains("*No discussion comments*"));
    }

    #[test]
    fn test_render_info_with_resolved_and_discussion() {
        let pr = PullRequest {
            is_draft: false,
            body: Some("Adds a login form".to_string()),
            ..sample_pr()
        };
        let threads = vec![thread("PRRT_done", true, None)];
        let comments = vec![DiscussionComment {
            id: "1".to_string(),
            author: "alice".to_string(),
            body: "Nice".to_string(),
            created_at: "2024-05-02T08:30:00Z".to_string(),
        }];
        let out = render_info(&pr, &threads, &comments, false, true);

        assert!(out.starts_with("# PR #42: Add login\n"));
        assert!(out.contains("## Review Comments (0 unresolved, 1 resolved)"));
        assert!(out.contains("### [RESOLVED] src/auth.rs:7"));
        assert!(out.contains("## Discussion Comments (1)"));
        assert!(out.contains("### alice (2024-05-02 08:30)"));
    }

    #[test]
    fn test_sort_for_reply_puts_unresolved_first() {
        let mut threads = vec![
            thread("a", true, None),
            thread("b", false, None),
            thread("c", true, None),
            thread("d", false, None),
        ];
        sort_for_reply(&mut threads);
        let ids: Vec<&str> = threads.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "d", "a", "c"]);
    }

    #[test]
    fn test_report_single_failure_is_error() {
        let err = report(&[ActionResult::failed("Failed to close PR")]).unwrap_err();
        assert_eq!(err.to_string(), "Failed to close PR");
        assert!(report(&[ActionResult::ok("PR closed")]).is_ok());

        let err = report(&[ActionResult::ok("a"), ActionResult::failed("b")]).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 actions failed");
    }

    #[test]
    fn test_thread_row_contains_id_and_preview() {
        colored::control::set_override(false);
        let row = thread_row(&thread("PRRT_x", false, None));
        assert_eq!(
            row,
            "  PRRT_x  src/auth.rs:7  [unresolved]  \"Please check the token expiry\""
        );
    }
}
