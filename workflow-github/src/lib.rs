//! GitHub integration for workflow-tools
//!
//! Everything goes through the `gh` CLI so authentication stays with the
//! user's existing `gh auth` setup. REST-shaped calls use `gh pr`/`gh repo`
//! subcommands with `--json`; review threads go through `gh api graphql`.

mod client;
mod error;
pub mod graphql;
pub mod pr;
pub mod repo;
pub mod review;

pub use client::{ActionResult, GhClient, RepoInfo};
pub use error::{Error, Result};
pub use graphql::Var;
pub use pr::{PrSummary, PullRequest};
pub use repo::{OwnedRepo, SearchHit, Visibility};
pub use review::{DiscussionComment, PendingReview, ReviewThread, ThreadComment};
