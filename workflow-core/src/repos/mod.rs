//! Repository discovery and the on-disk repository cache

mod cache;
mod discovery;
mod record;

pub use cache::{find_in, RepoCache, CACHE_FILE};
pub use discovery::{discover_repos, PRUNED_DIRS};
pub use record::{RemoteKind, RepoRecord};
