//! Directory-change handoff to the invoking shell
//!
//! A child process cannot change its parent shell's directory. The shell
//! wrapper exports a per-shell file path (`WT_CD_FILE` / `RP_CD_FILE`),
//! runs the tool, and `cd`s to whatever path the tool left in that file.
//! The file must resolve inside the system temp directory or nothing is
//! written.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::validate::validate_temp_path;

/// Prefix of the human-readable line printed on every handoff
pub const SWITCH_MARKER: &str = "Switching to ";

/// Which shell variable names the handoff file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffTarget {
    /// `wt` and `pr` commands
    Worktree,
    /// `rp` commands
    Repo,
}

impl HandoffTarget {
    /// Environment variable holding the handoff file path
    pub fn env_var(&self) -> &'static str {
        match self {
            HandoffTarget::Worktree => "WT_CD_FILE",
            HandoffTarget::Repo => "RP_CD_FILE",
        }
    }

    /// Resolved handoff file, if the variable is set and points into the temp dir
    pub fn handoff_file(&self) -> Option<PathBuf> {
        let raw = std::env::var(self.env_var()).ok()?;
        if raw.is_empty() {
            return None;
        }
        match validate_temp_path(&raw) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(var = self.env_var(), error = %e, "Ignoring handoff file outside temp dir");
                None
            }
        }
    }
}

/// Write `path` to the handoff file. Returns whether a file was written.
///
/// Write failures are logged and swallowed.
pub fn write_handoff(target: HandoffTarget, path: &Path) -> bool {
    let Some(file) = target.handoff_file() else {
        return false;
    };

    match std::fs::write(&file, path.to_string_lossy().as_bytes()) {
        Ok(()) => {
            debug!(file = %file.display(), target = %path.display(), "Wrote handoff file");
            true
        }
        Err(e) => {
            warn!(file = %file.display(), error = %e, "Failed to write handoff file");
            false
        }
    }
}

/// Ask the invoking shell to change into `path`, reporting to `out`
pub fn request_directory_change_to<W: Write>(target: HandoffTarget, path: &Path, out: &mut W) {
    write_handoff(target, path);
    // Output errors (closed stdout) must not fail the command
    let _ = writeln!(out, "{}{}", SWITCH_MARKER, path.display());
}

/// Ask the invoking shell to change into `path`
pub fn request_directory_change(target: HandoffTarget, path: &Path) {
    request_directory_change_to(target, path, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn run_with_env(value: Option<&str>, target_path: &Path) -> String {
        match value {
            Some(v) => std::env::set_var("WT_CD_FILE", v),
            None => std::env::remove_var("WT_CD_FILE"),
        }
        let mut out = Vec::new();
        request_directory_change_to(HandoffTarget::Worktree, target_path, &mut out);
        std::env::remove_var("WT_CD_FILE");
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_env_var_names() {
        assert_eq!(HandoffTarget::Worktree.env_var(), "WT_CD_FILE");
        assert_eq!(HandoffTarget::Repo.env_var(), "RP_CD_FILE");
    }

    #[test]
    #[serial]
    fn test_unset_only_prints() {
        let out = run_with_env(None, Path::new("/src/proj"));
        assert_eq!(out, "Switching to /src/proj\n");
    }

    #[test]
    #[serial]
    fn test_writes_path_without_newline() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(format!(".wt_cd_{}", std::process::id()));

        let out = run_with_env(Some(file.to_str().unwrap()), Path::new("/src/proj"));
        assert_eq!(out, "Switching to /src/proj\n");
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "/src/proj");
    }

    #[test]
    #[serial]
    fn test_rejects_path_outside_temp() {
        let escape_name = format!("wt_handoff_escape_{}", std::process::id());
        let temp = std::env::temp_dir();
        let traversal = format!("{}/../{}", temp.display(), escape_name);
        let escaped = crate::validate::resolve_lenient(Path::new(&traversal));

        let out = run_with_env(Some(&traversal), Path::new("/src/proj"));
        assert_eq!(out, "Switching to /src/proj\n");
        assert!(!escaped.exists());
    }

    #[test]
    #[serial]
    fn test_rejects_absolute_outside_temp() {
        let outside = format!("/wt_handoff_outside_{}", std::process::id());
        let out = run_with_env(Some(&outside), Path::new("/x"));
        assert_eq!(out, "Switching to /x\n");
        assert!(!Path::new(&outside).exists());
    }

    #[test]
    #[serial]
    fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory missing, so the write fails
        let file = dir.path().join("missing").join("cd_file");
        std::env::set_var("WT_CD_FILE", &file);
        let written = write_handoff(HandoffTarget::Worktree, Path::new("/src"));
        std::env::remove_var("WT_CD_FILE");
        assert!(!written);
    }
}
