//! TTL-based JSON cache of discovered repositories
//!
//! The cache is a single `repos.json` file. Its age is taken from the file's
//! modification time, so there is no stored timestamp. An unreadable, corrupt
//! or stale file is a cache miss and triggers a rescan.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::discovery::discover_repos;
use super::record::RepoRecord;
use crate::config::ReposConfig;
use crate::Result;

/// Cache file name inside the cache directory
pub const CACHE_FILE: &str = "repos.json";

/// Repository cache bound to a directory, TTL and scan roots
#[derive(Debug, Clone)]
pub struct RepoCache {
    dir: PathBuf,
    ttl: Duration,
    scan_paths: Vec<PathBuf>,
    scan_timeout: Duration,
}

impl RepoCache {
    /// Create a cache stored in `dir`
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, scan_paths: Vec<PathBuf>, scan_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            scan_paths,
            scan_timeout,
        }
    }

    /// Create a cache from the `[repos]` configuration section
    pub fn from_config(config: &ReposConfig) -> Result<Self> {
        Ok(Self::new(
            config.cache_dir()?,
            config.cache_ttl,
            config.scan_paths.clone(),
            config.scan_timeout,
        ))
    }

    /// Location of the cache file
    pub fn path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    /// Scan roots used on a miss
    pub fn scan_paths(&self) -> &[PathBuf] {
        &self.scan_paths
    }

    /// Whether the cache file exists and is younger than the TTL at `now`
    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        let Ok(modified) = std::fs::metadata(self.path()).and_then(|m| m.modified()) else {
            return false;
        };
        match now.duration_since(modified) {
            Ok(age) => age < self.ttl,
            // Modified "in the future": treat as just written
            Err(_) => true,
        }
    }

    /// Read the cache if it is valid; any failure is a miss
    pub fn load(&self) -> Option<Vec<RepoRecord>> {
        if !self.is_valid_at(SystemTime::now()) {
            debug!(path = %self.path().display(), "Repository cache missing or stale");
            return None;
        }

        let contents = match std::fs::read_to_string(self.path()) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "Repository cache unreadable");
                return None;
            }
        };

        match serde_json::from_str::<Vec<RepoRecord>>(&contents) {
            Ok(entries) => Some(entries),
            Err(e) => {
                debug!(error = %e, "Repository cache corrupt, rescanning");
                None
            }
        }
    }

    /// Persist `entries`, replacing the cache file atomically
    pub fn save(&self, entries: &[RepoRecord]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(entries)?;

        let staging = self
            .dir
            .join(format!(".{}.{}.tmp", CACHE_FILE, std::process::id()));
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, self.path())?;
        Ok(())
    }

    fn save_or_warn(&self, entries: &[RepoRecord]) {
        if let Err(e) = self.save(entries) {
            warn!(error = %e, path = %self.path().display(), "Failed to write repository cache");
        }
    }

    /// Return the repository list and whether it came from the cache.
    ///
    /// `force_refresh` always rescans and overwrites the cache.
    pub async fn get(&self, force_refresh: bool) -> (Vec<RepoRecord>, bool) {
        if !force_refresh {
            if let Some(entries) = self.load() {
                debug!(repos = entries.len(), "Repository cache hit");
                return (entries, true);
            }
        }

        let entries = discover_repos(&self.scan_paths, self.scan_timeout).await;
        self.save_or_warn(&entries);
        (entries, false)
    }

    /// Add the repository at `path`, unless a record with that path exists
    pub async fn add(&self, path: &Path) -> Result<RepoRecord> {
        let path = path.canonicalize()?;
        let (mut entries, _) = self.get(false).await;

        if let Some(existing) = entries.iter().find(|r| r.path == path) {
            return Ok(existing.clone());
        }

        let record = RepoRecord::inspect(&path).await;
        entries.push(record.clone());
        entries.sort_by_key(|r| r.name.to_lowercase());
        self.save(&entries)?;
        debug!(path = %path.display(), "Added repository to cache");
        Ok(record)
    }

    /// Drop the record for `path`; absent paths are a no-op
    pub async fn remove(&self, path: &Path) -> Result<()> {
        let (mut entries, _) = self.get(false).await;
        let before = entries.len();
        entries.retain(|r| r.path != path);
        if entries.len() != before {
            debug!(path = %path.display(), "Removed repository from cache");
        }
        self.save(&entries)
    }

    /// Look up a repository by path or name
    pub async fn find(&self, query: &str) -> Option<RepoRecord> {
        let (entries, _) = self.get(false).await;
        find_in(&entries, query).cloned()
    }

    /// Delete the cache file, tolerating its absence
    pub fn invalidate(&self) -> Result<()> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Find a record by exact path, then exact name, then case-insensitive name
pub fn find_in<'a>(entries: &'a [RepoRecord], query: &str) -> Option<&'a RepoRecord> {
    entries
        .iter()
        .find(|r| r.path.as_os_str() == query)
        .or_else(|| entries.iter().find(|r| r.name == query))
        .or_else(|| entries.iter().find(|r| r.name.eq_ignore_ascii_case(query)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::RemoteKind;
    use filetime::FileTime;

    fn cache_in(dir: &Path, scan_root: &Path, ttl: Duration) -> RepoCache {
        RepoCache::new(
            dir.join("cache"),
            ttl,
            vec![scan_root.to_path_buf()],
            Duration::from_secs(30),
        )
    }

    fn record(path: &str) -> RepoRecord {
        RepoRecord::new(path, None)
    }

    async fn git_init(path: &Path) {
        std::fs::create_dir_all(path).unwrap();
        crate::process::run_captured("git", &["init", "-q"], Some(path))
            .await
            .unwrap();
    }

    #[test]
    fn test_ttl_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), dir.path(), Duration::from_secs(1));
        cache.save(&[record("/src/a")]).unwrap();

        let written = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        filetime::set_file_mtime(cache.path(), FileTime::from_system_time(written)).unwrap();

        assert!(cache.is_valid_at(written + Duration::from_millis(500)));
        assert!(!cache.is_valid_at(written + Duration::from_millis(1100)));
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), dir.path(), Duration::from_secs(3600));
        assert!(!cache.is_valid_at(SystemTime::now()));
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), dir.path(), Duration::from_secs(3600));
        let entries = vec![record("/src/a"), record("/src/b")];
        cache.save(&entries).unwrap();
        assert_eq!(cache.load().unwrap(), entries);
    }

    #[test]
    fn test_stale_cache_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), dir.path(), Duration::from_secs(60));
        cache.save(&[record("/src/a")]).unwrap();

        let old = SystemTime::now() - Duration::from_secs(120);
        filetime::set_file_mtime(cache.path(), FileTime::from_system_time(old)).unwrap();
        assert!(cache.load().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_cache_triggers_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan");
        std::fs::create_dir_all(&scan).unwrap();
        let cache = cache_in(dir.path(), &scan, Duration::from_secs(3600));

        std::fs::create_dir_all(dir.path().join("cache")).unwrap();
        std::fs::write(cache.path(), "{not json at all").unwrap();
        assert!(cache.load().is_none());

        let (entries, from_cache) = cache.get(false).await;
        assert!(entries.is_empty());
        assert!(!from_cache);

        // The rescan rewrote a valid file
        let (_, from_cache) = cache.get(false).await;
        assert!(from_cache);
    }

    #[tokio::test]
    async fn test_truncated_cache_triggers_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan");
        std::fs::create_dir_all(&scan).unwrap();
        let cache = cache_in(dir.path(), &scan, Duration::from_secs(3600));

        cache.save(&[record("/src/a")]).unwrap();
        let full = std::fs::read_to_string(cache.path()).unwrap();
        std::fs::write(cache.path(), &full[..full.len() / 2]).unwrap();

        let (entries, from_cache) = cache.get(false).await;
        assert!(entries.is_empty());
        assert!(!from_cache);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan");
        git_init(&scan.join("fresh")).await;
        let cache = cache_in(dir.path(), &scan, Duration::from_secs(3600));
        cache.save(&[record("/src/stale")]).unwrap();

        let (entries, from_cache) = cache.get(false).await;
        assert!(from_cache);
        assert_eq!(entries[0].name, "stale");

        let (entries, from_cache) = cache.get(true).await;
        assert!(!from_cache);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "fresh");
    }

    #[tokio::test]
    async fn test_add_and_remove_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan");
        std::fs::create_dir_all(&scan).unwrap();
        let repo = dir.path().join("elsewhere").join("added");
        git_init(&repo).await;
        let cache = cache_in(dir.path(), &scan, Duration::from_secs(3600));

        let added = cache.add(&repo).await.unwrap();
        assert_eq!(added.name, "added");
        assert_eq!(added.remote_type, RemoteKind::Local);
        cache.add(&repo).await.unwrap();

        let (entries, _) = cache.get(false).await;
        assert_eq!(entries.len(), 1);

        let canonical = repo.canonicalize().unwrap();
        cache.remove(&canonical).await.unwrap();
        cache.remove(&canonical).await.unwrap();
        cache.remove(Path::new("/never/there")).await.unwrap();
        let (entries, _) = cache.get(false).await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_add_keeps_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan");
        std::fs::create_dir_all(&scan).unwrap();
        let cache = cache_in(dir.path(), &scan, Duration::from_secs(3600));
        cache
            .save(&[record("/src/alpha"), record("/src/zulu")])
            .unwrap();

        let repo = dir.path().join("Mike");
        git_init(&repo).await;
        cache.add(&repo).await.unwrap();

        let (entries, _) = cache.get(false).await;
        let names: Vec<&str> = entries.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Mike", "zulu"]);
    }

    #[test]
    fn test_find_tiers() {
        let entries = vec![record("/a/foo"), record("/b/foo"), record("/c/Bar")];

        assert_eq!(find_in(&entries, "/a/foo").unwrap().path, PathBuf::from("/a/foo"));
        assert_eq!(find_in(&entries, "/b/foo").unwrap().path, PathBuf::from("/b/foo"));
        // Ambiguous name resolves to the first in sorted order
        assert_eq!(find_in(&entries, "foo").unwrap().path, PathBuf::from("/a/foo"));
        assert_eq!(find_in(&entries, "bar").unwrap().name, "Bar");
        assert!(find_in(&entries, "missing").is_none());
    }

    #[test]
    fn test_find_exact_name_beats_case_insensitive() {
        let entries = vec![record("/x/Tool"), record("/y/tool")];
        assert_eq!(find_in(&entries, "tool").unwrap().path, PathBuf::from("/y/tool"));
        assert_eq!(find_in(&entries, "TOOL").unwrap().path, PathBuf::from("/x/Tool"));
    }

    #[test]
    fn test_invalidate_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), dir.path(), Duration::from_secs(3600));
        cache.invalidate().unwrap();

        cache.save(&[record("/src/a")]).unwrap();
        assert!(cache.path().exists());
        cache.invalidate().unwrap();
        assert!(!cache.path().exists());
    }
}
