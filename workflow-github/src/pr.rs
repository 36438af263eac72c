//! Pull request operations

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ActionResult;
use crate::{Error, GhClient, Result};

/// Fields requested for a full pull request view
const VIEW_FIELDS: &str = "number,title,body,url,state,author,baseRefName,headRefName,reviewDecision,additions,deletions,changedFiles,isDraft,mergeable,id";

/// Fields requested when listing open pull requests
const LIST_FIELDS: &str = "number,title,headRefName,isDraft,id,author,url";

/// A pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// GraphQL node id, used by mutations
    pub id: String,
    /// Title
    pub title: String,
    /// Description
    pub body: Option<String>,
    /// Web URL
    pub url: String,
    /// OPEN, CLOSED or MERGED
    pub state: String,
    /// Author login
    pub author: String,
    /// Target branch
    pub base_branch: String,
    /// Source branch
    pub head_branch: String,
    /// Draft flag
    pub is_draft: bool,
    /// MERGEABLE, CONFLICTING or UNKNOWN
    pub mergeable: Option<String>,
    /// APPROVED, CHANGES_REQUESTED, REVIEW_REQUIRED
    pub review_decision: Option<String>,
    /// Lines added
    pub additions: u64,
    /// Lines removed
    pub deletions: u64,
    /// Files touched
    pub changed_files: u64,
}

impl PullRequest {
    /// Picker row: `#12 [draft] branch - title`
    pub fn picker_label(&self) -> String {
        let draft = if self.is_draft { " [draft]" } else { "" };
        format!("#{}{} {} - {}", self.number, draft, self.head_branch, self.title)
    }
}

/// Minimal pull request listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrSummary {
    /// PR number
    pub number: u64,
    /// Title
    pub title: String,
    /// Source branch
    #[serde(rename(deserialize = "headRefName"))]
    pub branch: String,
    /// Draft flag
    #[serde(rename(deserialize = "isDraft"))]
    pub is_draft: bool,
}

impl PrSummary {
    /// Picker row: `#12 [draft] branch - title`
    pub fn picker_label(&self) -> String {
        let draft = if self.is_draft { " [draft]" } else { "" };
        format!("#{}{} {} - {}", self.number, draft, self.branch, self.title)
    }
}

#[derive(Debug, Default, Deserialize)]
struct Login {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrJson {
    number: u64,
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    author: Option<Login>,
    #[serde(default)]
    base_ref_name: String,
    #[serde(default)]
    head_ref_name: String,
    #[serde(default)]
    is_draft: bool,
    #[serde(default)]
    mergeable: Option<String>,
    #[serde(default)]
    review_decision: Option<String>,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changed_files: u64,
}

impl From<PrJson> for PullRequest {
    fn from(pr: PrJson) -> Self {
        Self {
            number: pr.number,
            id: pr.id,
            title: pr.title,
            body: pr.body.filter(|b| !b.is_empty()),
            url: pr.url,
            state: pr.state.unwrap_or_else(|| "OPEN".to_string()),
            author: pr.author.map(|a| a.login).unwrap_or_default(),
            base_branch: pr.base_ref_name,
            head_branch: pr.head_ref_name,
            is_draft: pr.is_draft,
            mergeable: pr.mergeable,
            review_decision: pr.review_decision.filter(|d| !d.is_empty()),
            additions: pr.additions,
            deletions: pr.deletions,
            changed_files: pr.changed_files,
        }
    }
}

/// Parse `gh pr view --json` output
pub fn parse_pull_request(json: &str) -> Result<PullRequest> {
    let raw: PrJson = serde_json::from_str(json)?;
    Ok(raw.into())
}

/// Parse `gh pr list --json` output
pub fn parse_pull_request_list(json: &str) -> Result<Vec<PullRequest>> {
    let raw: Vec<PrJson> = serde_json::from_str(json)?;
    Ok(raw.into_iter().map(PullRequest::from).collect())
}

/// Render an ISO-8601 timestamp as `YYYY-MM-DD HH:MM`, or return it unchanged
pub fn format_date(iso: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(iso) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S") {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    iso.to_string()
}

impl GhClient {
    /// Open PRs with minimal fields, for worktree pickers
    pub async fn list_prs_simple(&self) -> Result<Vec<PrSummary>> {
        self.json(&[
            "pr",
            "list",
            "--json",
            "number,title,headRefName,isDraft",
            "--limit",
            "100",
        ])
        .await
    }

    /// Open PRs, optionally filtered by author and draft state
    pub async fn list_open_prs(&self, author: Option<&str>, include_drafts: bool) -> Result<Vec<PullRequest>> {
        let mut args = vec!["pr", "list", "--json", LIST_FIELDS];
        if let Some(author) = author {
            args.push("--author");
            args.push(author);
        }
        if !include_drafts {
            args.push("--draft=false");
        }

        let out = self.run(&args).await?;
        parse_pull_request_list(&out)
    }

    /// A specific PR, or the PR of the checked-out branch
    pub async fn view_pr(&self, number: Option<u64>) -> Result<PullRequest> {
        let num_str = number.map(|n| n.to_string());
        let mut args = vec!["pr", "view"];
        if let Some(n) = &num_str {
            args.push(n);
        }
        args.extend(["--json", VIEW_FIELDS]);

        match self.run(&args).await {
            Ok(out) => parse_pull_request(&out),
            Err(e) => {
                debug!(error = %e, ?number, "gh pr view failed");
                match number {
                    Some(n) => Err(Error::PrNotFound(n)),
                    None => {
                        let dir = self.cwd().unwrap_or_else(|| std::path::Path::new("."));
                        let branch = workflow_core::git::current_branch_at(dir)
                            .await
                            .unwrap_or_default();
                        Err(Error::NoPrForBranch(branch))
                    }
                }
            }
        }
    }

    /// Unified diff of a PR
    pub async fn pr_diff(&self, number: u64) -> Result<String> {
        self.run(&["pr", "diff", &number.to_string()]).await
    }

    /// Paths changed by a PR
    pub async fn pr_files(&self, number: u64) -> Result<Vec<String>> {
        let out = self
            .run(&[
                "pr",
                "view",
                &number.to_string(),
                "--json",
                "files",
                "--jq",
                ".files[].path",
            ])
            .await?;
        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Post a discussion comment
    pub async fn post_comment(&self, number: u64, message: &str) -> ActionResult {
        let result = self
            .run(&["pr", "comment", &number.to_string(), "--body", message])
            .await;
        ActionResult::from_result(result, "Comment posted", "Failed to post comment")
    }

    /// Submit an approving review
    pub async fn approve(&self, number: u64, message: Option<&str>) -> ActionResult {
        let num = number.to_string();
        let mut args = vec!["pr", "review", &num, "--approve"];
        if let Some(body) = message {
            args.extend(["--body", body]);
        }
        let result = self.run(&args).await;
        ActionResult::from_result(result, "PR approved", "Failed to approve PR")
    }

    /// Submit a review requesting changes
    pub async fn request_changes(&self, number: u64, message: &str) -> ActionResult {
        let result = self
            .run(&[
                "pr",
                "review",
                &number.to_string(),
                "--request-changes",
                "--body",
                message,
            ])
            .await;
        ActionResult::from_result(result, "Changes requested", "Failed to request changes")
    }

    /// Mark a draft PR ready for review
    pub async fn mark_ready(&self, number: u64) -> ActionResult {
        let result = self.run(&["pr", "ready", &number.to_string()]).await;
        ActionResult::from_result(
            result,
            "PR marked as ready for review",
            "Failed to mark PR ready",
        )
    }

    /// Convert a PR back to draft
    pub async fn mark_draft(&self, number: u64) -> ActionResult {
        let result = self
            .run(&["pr", "ready", &number.to_string(), "--undo"])
            .await;
        ActionResult::from_result(result, "PR converted to draft", "Failed to convert to draft")
    }

    /// Close a PR
    pub async fn close(&self, number: u64) -> ActionResult {
        let result = self.run(&["pr", "close", &number.to_string()]).await;
        ActionResult::from_result(result, "PR closed", "Failed to close PR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW_JSON: &str = r#"{
        "additions": 10,
        "author": {"id": "MDQ", "is_bot": false, "login": "octocat", "name": "Octo"},
        "baseRefName": "main",
        "body": "Fixes the thing",
        "changedFiles": 2,
        "deletions": 3,
        "headRefName": "fix/thing",
        "id": "PR_kwDOABC",
        "isDraft": true,
        "mergeable": "MERGEABLE",
        "number": 42,
        "reviewDecision": "",
        "state": "OPEN",
        "title": "Fix the thing",
        "url": "https://github.com/me/proj/pull/42"
    }"#;

    #[test]
    fn test_parse_view() {
        let pr = parse_pull_request(VIEW_JSON).unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.id, "PR_kwDOABC");
        assert_eq!(pr.author, "octocat");
        assert_eq!(pr.base_branch, "main");
        assert_eq!(pr.head_branch, "fix/thing");
        assert!(pr.is_draft);
        assert_eq!(pr.review_decision, None);
        assert_eq!(pr.mergeable.as_deref(), Some("MERGEABLE"));
        assert_eq!((pr.additions, pr.deletions, pr.changed_files), (10, 3, 2));
        assert_eq!(pr.picker_label(), "#42 [draft] fix/thing - Fix the thing");
    }

    #[test]
    fn test_parse_list_defaults_missing_fields() {
        let json = r#"[{
            "number": 7, "title": "Add docs", "headRefName": "docs",
            "isDraft": false, "id": "PR_x", "author": {"login": "me"},
            "url": "https://github.com/me/proj/pull/7"
        }]"#;
        let prs = parse_pull_request_list(json).unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].state, "OPEN");
        assert_eq!(prs[0].base_branch, "");
        assert_eq!(prs[0].body, None);
        assert_eq!(prs[0].additions, 0);
    }

    #[test]
    fn test_parse_summary() {
        let json = r#"[{"number": 3, "title": "T", "headRefName": "feat/a", "isDraft": true}]"#;
        let prs: Vec<PrSummary> = serde_json::from_str(json).unwrap();
        assert_eq!(prs[0].branch, "feat/a");
        assert_eq!(prs[0].picker_label(), "#3 [draft] feat/a - T");
    }

    #[test]
    fn test_parse_garbage_is_parse_error() {
        assert!(matches!(parse_pull_request("{"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-03-05T14:07:59Z"), "2024-03-05 14:07");
        assert_eq!(format_date("2024-03-05T14:07:59+02:00"), "2024-03-05 14:07");
        assert_eq!(format_date("2024-03-05T14:07:59"), "2024-03-05 14:07");
        assert_eq!(format_date("yesterday"), "yesterday");
        assert_eq!(format_date(""), "");
    }
}
