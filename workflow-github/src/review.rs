//! Review threads and discussion comments

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{ActionResult, RepoInfo};
use crate::graphql::Var;
use crate::{Error, GhClient, Result};

const REVIEW_THREADS_QUERY: &str = r#"
query($owner: String!, $repo: String!, $pr: Int!) {
  repository(owner: $owner, name: $repo) {
    pullRequest(number: $pr) {
      reviewThreads(first: 100) {
        nodes {
          id
          isResolved
          isOutdated
          path
          line
          startLine
          comments(first: 50) {
            nodes {
              id
              author { login }
              body
              createdAt
              diffHunk
            }
          }
        }
      }
    }
  }
}
"#;

const RESOLVE_MUTATION: &str = r#"
mutation($threadId: ID!) {
  resolveReviewThread(input: {threadId: $threadId}) {
    thread { isResolved }
  }
}
"#;

const UNRESOLVE_MUTATION: &str = r#"
mutation($threadId: ID!) {
  unresolveReviewThread(input: {threadId: $threadId}) {
    thread { isResolved }
  }
}
"#;

const THREAD_FIRST_COMMENT_QUERY: &str = r#"
query($threadId: ID!) {
  node(id: $threadId) {
    ... on PullRequestReviewThread {
      comments(first: 1) {
        nodes { id }
      }
    }
  }
}
"#;

const REPLY_MUTATION: &str = r#"
mutation($prId: ID!, $commentId: ID!, $body: String!) {
  addPullRequestReviewComment(input: {pullRequestId: $prId, inReplyTo: $commentId, body: $body}) {
    comment { id }
  }
}
"#;

const PENDING_REVIEW_QUERY: &str = r#"
query($prId: ID!) {
  node(id: $prId) {
    ... on PullRequest {
      reviews(first: 10, states: PENDING) {
        nodes {
          id
          author { login }
          state
        }
      }
    }
  }
}
"#;

const SUBMIT_REVIEW_MUTATION: &str = r#"
mutation($prId: ID!, $reviewId: ID!) {
  submitPullRequestReview(input: {pullRequestId: $prId, pullRequestReviewId: $reviewId, event: COMMENT}) {
    pullRequestReview { state }
  }
}
"#;

/// One comment inside a review thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadComment {
    /// Comment node id
    pub id: String,
    /// Author login
    pub author: String,
    /// Markdown body
    pub body: String,
    /// ISO-8601 creation time
    pub created_at: String,
    /// Diff context the comment is anchored to
    pub diff_hunk: Option<String>,
}

/// A review thread anchored to a file and line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewThread {
    /// Thread node id (`PRRT_...`)
    pub id: String,
    /// File path
    pub path: String,
    /// End line
    pub line: Option<u64>,
    /// Start line of a multi-line thread
    pub start_line: Option<u64>,
    /// Resolution state
    pub is_resolved: bool,
    /// The anchored code has since changed
    pub is_outdated: bool,
    /// Comments, oldest first
    pub comments: Vec<ThreadComment>,
}

impl ReviewThread {
    /// `line`, else `start_line`, else `?`
    pub fn line_label(&self) -> String {
        self.line
            .or(self.start_line)
            .map(|l| l.to_string())
            .unwrap_or_else(|| "?".to_string())
    }

    /// First comment body flattened to one line and cut to `max` chars
    pub fn preview(&self, max: usize) -> String {
        let Some(first) = self.comments.first() else {
            return String::new();
        };
        let mut preview: String = first.body.chars().take(max).collect::<String>().replace('\n', " ");
        if first.body.chars().count() > max {
            preview.push_str("...");
        }
        preview
    }

    /// Picker row: `path:line [status] - preview`
    pub fn picker_label(&self, preview_len: usize) -> String {
        let status = if self.is_resolved { "[resolved]" } else { "[unresolved]" };
        format!(
            "{}:{} {} - {}",
            self.path,
            self.line_label(),
            status,
            self.preview(preview_len)
        )
    }
}

/// A PR-level discussion comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscussionComment {
    /// REST comment id
    pub id: String,
    /// Author login
    pub author: String,
    /// Markdown body
    pub body: String,
    /// ISO-8601 creation time
    pub created_at: String,
}

/// A review still pending submission
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PendingReview {
    /// Review node id
    pub id: String,
    /// Author, if known
    #[serde(default, deserialize_with = "login_or_none")]
    pub author: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Login {
    #[serde(default)]
    login: String,
}

fn login_or_none<'de, D>(de: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let login: Option<Login> = Option::deserialize(de)?;
    Ok(login.map(|l| l.login).filter(|l| !l.is_empty()))
}

fn login_or_unknown(author: Option<Login>) -> String {
    author
        .map(|a| a.login)
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
struct ThreadsData {
    repository: Option<ThreadsRepo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadsRepo {
    pull_request: Option<ThreadsPr>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadsPr {
    #[serde(default)]
    review_threads: Nodes<ThreadNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadNode {
    id: String,
    #[serde(default)]
    is_resolved: bool,
    #[serde(default)]
    is_outdated: bool,
    path: Option<String>,
    line: Option<u64>,
    start_line: Option<u64>,
    #[serde(default)]
    comments: Nodes<CommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    id: String,
    author: Option<Login>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    created_at: String,
    diff_hunk: Option<String>,
}

impl From<ThreadNode> for ReviewThread {
    fn from(t: ThreadNode) -> Self {
        Self {
            id: t.id,
            path: t.path.unwrap_or_else(|| "unknown".to_string()),
            line: t.line,
            start_line: t.start_line,
            is_resolved: t.is_resolved,
            is_outdated: t.is_outdated,
            comments: t
                .comments
                .nodes
                .into_iter()
                .map(|c| ThreadComment {
                    id: c.id,
                    author: login_or_unknown(c.author),
                    body: c.body,
                    created_at: c.created_at,
                    diff_hunk: c.diff_hunk,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssueCommentJson {
    id: serde_json::Value,
    user: Option<Login>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct NodeData<T> {
    node: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ThreadCommentIds {
    #[serde(default)]
    comments: Nodes<IdNode>,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PrReviews {
    #[serde(default)]
    reviews: Nodes<PendingReview>,
}

/// Convert the review-thread query payload
fn threads_from_data(data: ThreadsData) -> Vec<ReviewThread> {
    data.repository
        .and_then(|r| r.pull_request)
        .map(|pr| {
            pr.review_threads
                .nodes
                .into_iter()
                .map(ReviewThread::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse the REST issue-comments payload
pub fn parse_discussion_comments(json: &str) -> Result<Vec<DiscussionComment>> {
    let raw: Vec<IssueCommentJson> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|c| DiscussionComment {
            id: match c.id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
            author: login_or_unknown(c.user),
            body: c.body,
            created_at: c.created_at,
        })
        .collect())
}

/// Pick the first pending review, restricted to `viewer` when given
fn select_pending(reviews: Vec<PendingReview>, viewer: Option<&str>) -> Option<PendingReview> {
    reviews
        .into_iter()
        .find(|r| viewer.is_none() || r.author.as_deref() == viewer)
}

impl GhClient {
    /// Review threads of a PR
    pub async fn review_threads(&self, repo: &RepoInfo, number: u64) -> Result<Vec<ReviewThread>> {
        let data: ThreadsData = self
            .graphql(
                REVIEW_THREADS_QUERY,
                &[
                    ("owner", Var::Str(&repo.owner)),
                    ("repo", Var::Str(&repo.name)),
                    ("pr", Var::Int(number)),
                ],
            )
            .await?;
        Ok(threads_from_data(data))
    }

    /// PR-level discussion comments
    pub async fn discussion_comments(&self, repo: &RepoInfo, number: u64) -> Result<Vec<DiscussionComment>> {
        let endpoint = format!("repos/{}/{}/issues/{}/comments", repo.owner, repo.name, number);
        let out = self.run(&["api", &endpoint]).await?;
        parse_discussion_comments(&out)
    }

    /// Resolve a review thread
    pub async fn resolve_thread(&self, thread_id: &str) -> ActionResult {
        let result = self
            .graphql::<serde_json::Value>(RESOLVE_MUTATION, &[("threadId", Var::Str(thread_id))])
            .await;
        ActionResult::from_result(
            result,
            format!("Resolved thread {}", thread_id),
            format!("Failed to resolve thread {}", thread_id),
        )
    }

    /// Reopen a resolved review thread
    pub async fn unresolve_thread(&self, thread_id: &str) -> ActionResult {
        let result = self
            .graphql::<serde_json::Value>(UNRESOLVE_MUTATION, &[("threadId", Var::Str(thread_id))])
            .await;
        ActionResult::from_result(
            result,
            format!("Unresolved thread {}", thread_id),
            format!("Failed to unresolve thread {}", thread_id),
        )
    }

    async fn first_comment_id(&self, thread_id: &str) -> Result<Option<String>> {
        let data: NodeData<ThreadCommentIds> = self
            .graphql(
                THREAD_FIRST_COMMENT_QUERY,
                &[("threadId", Var::Str(thread_id))],
            )
            .await?;
        Ok(data
            .node
            .and_then(|n| n.comments.nodes.into_iter().next())
            .map(|c| c.id))
    }

    /// Reply to a review thread, answering its first comment
    pub async fn reply_to_thread(&self, thread_id: &str, message: &str, pr_id: &str) -> ActionResult {
        let comment_id = match self.first_comment_id(thread_id).await {
            Ok(Some(id)) => id,
            Ok(None) => return ActionResult::failed(format!("No comments found in thread {}", thread_id)),
            Err(e) => {
                debug!(error = %e, "Thread lookup failed");
                return ActionResult::failed(format!("Failed to get thread info: {}", thread_id));
            }
        };

        let result = self
            .graphql::<serde_json::Value>(
                REPLY_MUTATION,
                &[
                    ("prId", Var::Str(pr_id)),
                    ("commentId", Var::Str(&comment_id)),
                    ("body", Var::Str(message)),
                ],
            )
            .await;
        ActionResult::from_result(
            result,
            format!("Replied to thread {}", thread_id),
            format!("Failed to reply to thread {}", thread_id),
        )
    }

    /// The viewer's pending review on a PR, if any
    pub async fn pending_review(&self, pr_id: &str, viewer: Option<&str>) -> Result<Option<PendingReview>> {
        let data: NodeData<PrReviews> = self
            .graphql(PENDING_REVIEW_QUERY, &[("prId", Var::Str(pr_id))])
            .await?;
        let reviews = data.node.map(|n| n.reviews.nodes).unwrap_or_default();
        Ok(select_pending(reviews, viewer))
    }

    /// Submit a pending review as a plain comment review
    pub async fn submit_pending_review(&self, pr_id: &str, review_id: Option<&str>) -> ActionResult {
        let review_id = match review_id {
            Some(id) => id.to_string(),
            None => match self.pending_review(pr_id, None).await {
                Ok(Some(review)) => review.id,
                Ok(None) => return ActionResult::failed("No pending review to submit"),
                Err(e) => {
                    debug!(error = %e, "Pending review lookup failed");
                    return ActionResult::failed("No pending review to submit");
                }
            },
        };

        let result = self
            .graphql::<serde_json::Value>(
                SUBMIT_REVIEW_MUTATION,
                &[("prId", Var::Str(pr_id)), ("reviewId", Var::Str(&review_id))],
            )
            .await;
        ActionResult::from_result(result, "Review submitted", "Failed to submit review")
    }
}

/// Error for a thread id the user typed that doesn't look like one
pub fn check_thread_id(id: &str) -> Result<&str> {
    if id.is_empty() || id.chars().any(|c| c.is_whitespace()) {
        return Err(Error::Other(format!("Invalid thread id: {:?}", id)));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::decode_response;

    const THREADS_BODY: &str = r#"{
      "data": {
        "repository": {
          "pullRequest": {
            "reviewThreads": {
              "nodes": [
                {
                  "id": "PRRT_one",
                  "isResolved": false,
                  "isOutdated": true,
                  "path": "src/main.rs",
                  "line": null,
                  "startLine": 12,
                  "comments": {
                    "nodes": [
                      {
                        "id": "PRRC_a",
                        "author": {"login": "reviewer"},
                        "body": "Consider handling the error case here instead of\nunwrapping",
                        "createdAt": "2024-05-01T10:00:00Z",
                        "diffHunk": "@@ -1,3 +1,4 @@"
                      }
                    ]
                  }
                },
                {
                  "id": "PRRT_two",
                  "isResolved": true,
                  "isOutdated": false,
                  "path": "README.md",
                  "line": 3,
                  "startLine": null,
                  "comments": {
                    "nodes": [
                      {"id": "PRRC_b", "author": null, "body": "ok", "createdAt": "2024-05-02T10:00:00Z", "diffHunk": null}
                    ]
                  }
                }
              ]
            }
          }
        }
      }
    }"#;

    #[test]
    fn test_parse_threads() {
        let data: ThreadsData = decode_response(THREADS_BODY).unwrap();
        let threads = threads_from_data(data);
        assert_eq!(threads.len(), 2);

        let first = &threads[0];
        assert_eq!(first.id, "PRRT_one");
        assert!(!first.is_resolved);
        assert!(first.is_outdated);
        assert_eq!(first.line_label(), "12");
        assert_eq!(first.comments[0].author, "reviewer");
        assert_eq!(first.comments[0].diff_hunk.as_deref(), Some("@@ -1,3 +1,4 @@"));

        let second = &threads[1];
        assert!(second.is_resolved);
        assert_eq!(second.line_label(), "3");
        assert_eq!(second.comments[0].author, "unknown");
    }

    #[test]
    fn test_missing_pull_request_is_empty() {
        let data: ThreadsData =
            decode_response(r#"{"data": {"repository": {"pullRequest": null}}}"#).unwrap();
        assert!(threads_from_data(data).is_empty());
    }

    #[test]
    fn test_thread_preview_and_label() {
        let data: ThreadsData = decode_response(THREADS_BODY).unwrap();
        let threads = threads_from_data(data);

        let preview = threads[0].preview(40);
        assert_eq!(preview, "Consider handling the error case here in...");
        assert!(!preview.contains('\n'));
        assert_eq!(threads[1].preview(40), "ok");
        assert_eq!(
            threads[1].picker_label(50),
            "README.md:3 [resolved] - ok"
        );
    }

    #[test]
    fn test_parse_discussion_comments() {
        let json = r#"[
            {"id": 991, "user": {"login": "alice"}, "body": "Looks good", "created_at": "2024-05-01T10:00:00Z"},
            {"id": 992, "user": null, "body": "", "created_at": ""}
        ]"#;
        let comments = parse_discussion_comments(json).unwrap();
        assert_eq!(comments[0].id, "991");
        assert_eq!(comments[0].author, "alice");
        assert_eq!(comments[1].author, "unknown");
    }

    #[test]
    fn test_pending_review_selection() {
        let data: NodeData<PrReviews> = decode_response(
            r#"{"data": {"node": {"reviews": {"nodes": [
                {"id": "PRR_1", "author": {"login": "bob"}, "state": "PENDING"},
                {"id": "PRR_2", "author": {"login": "me"}, "state": "PENDING"}
            ]}}}}"#,
        )
        .unwrap();
        let reviews = data.node.unwrap().reviews.nodes;

        assert_eq!(select_pending(reviews.clone(), Some("me")).unwrap().id, "PRR_2");
        assert_eq!(select_pending(reviews.clone(), None).unwrap().id, "PRR_1");
        assert!(select_pending(reviews, Some("carol")).is_none());
    }

    #[test]
    fn test_first_comment_payload() {
        let data: NodeData<ThreadCommentIds> = decode_response(
            r#"{"data": {"node": {"comments": {"nodes": [{"id": "PRRC_first"}]}}}}"#,
        )
        .unwrap();
        assert_eq!(data.node.unwrap().comments.nodes[0].id, "PRRC_first");
    }

    #[test]
    fn test_check_thread_id() {
        assert!(check_thread_id("PRRT_kwDOABC123_abc456").is_ok());
        assert!(check_thread_id("").is_err());
        assert!(check_thread_id("PRRT x").is_err());
    }
}
