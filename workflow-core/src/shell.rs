//! Shell integration script generation
//!
//! The wrappers export per-shell handoff file paths and define `wt`, `pr`,
//! `rp` and `tm` functions that forward to the binary and `cd` to whatever
//! path it left behind.

use std::path::Path;

use crate::{Error, Result};

/// Marker line identifying an installed block in an rc file
pub const INSTALL_MARKER: &str = "workflow-tools install --print";

/// Block appended to the user's rc file
pub const INSTALL_BLOCK: &str = r#"# workflow-tools shell integration
export PATH="$HOME/.local/bin:$PATH"
eval "$(workflow-tools install --print)""#;

/// Supported interactive shells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    /// zsh
    Zsh,
    /// bash
    Bash,
}

impl Shell {
    /// Detect from a `$SHELL` value
    pub fn detect(shell_path: &str) -> Option<Self> {
        if shell_path.contains("zsh") {
            Some(Shell::Zsh)
        } else if shell_path.contains("bash") {
            Some(Shell::Bash)
        } else {
            None
        }
    }

    /// rc file under `home`
    pub fn rc_file(&self, home: &Path) -> std::path::PathBuf {
        match self {
            Shell::Zsh => home.join(".zshrc"),
            Shell::Bash => home.join(".bashrc"),
        }
    }
}

impl std::str::FromStr for Shell {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zsh" => Ok(Shell::Zsh),
            "bash" => Ok(Shell::Bash),
            other => Err(Error::validation(format!("Unsupported shell: {}", other))),
        }
    }
}

/// Single-quote `word` for POSIX shells
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// `binary` must already be quoted
fn cd_wrapper(func: &str, binary: &str, env_var: &str) -> String {
    format!(
        r#"{func}() {{
    rm -f "${env_var}"
    {binary} {func} "$@"
    local exit_code=$?
    if [[ -f "${env_var}" ]]; then
        cd "$(cat "${env_var}")"
        rm -f "${env_var}"
    fi
    return $exit_code
}}
"#
    )
}

/// Shell functions for `wt`, `pr`, `rp` and `tm`.
///
/// zsh and bash accept the same syntax for these functions, so `shell` only
/// labels the header.
pub fn wrapper_script(shell: Shell, binary: &str) -> String {
    let binary = shell_quote(binary);
    let binary = binary.as_str();
    let label = match shell {
        Shell::Zsh => "zsh",
        Shell::Bash => "bash",
    };

    let mut script = format!(
        r#"
# workflow-tools shell integration ({label})
export WT_CD_FILE="${{TMPDIR:-/tmp}}/.wt_cd_$$"
export RP_CD_FILE="${{TMPDIR:-/tmp}}/.rp_cd_$$"

"#
    );

    script.push_str("# wt: worktree management with cd support\n");
    script.push_str(&cd_wrapper("wt", binary, "WT_CD_FILE"));
    script.push_str("\n# pr: pull request management with cd support\n");
    script.push_str(&cd_wrapper("pr", binary, "WT_CD_FILE"));
    script.push_str("\n# rp: repository management with cd support\n");
    script.push_str(&cd_wrapper("rp", binary, "RP_CD_FILE"));
    script.push_str(&format!(
        "\n# tm: tmux session management\ntm() {{\n    {binary} tm \"$@\"\n}}\n"
    ));
    script
}

/// Whether `rc_contents` already sources the integration
pub fn is_installed(rc_contents: &str) -> bool {
    rc_contents.contains(INSTALL_MARKER)
}

/// Append the install block to `rc_file` unless present.
///
/// Returns `false` when it was already installed.
pub fn install_into(rc_file: &Path) -> Result<bool> {
    if rc_file.exists() && is_installed(&std::fs::read_to_string(rc_file)?) {
        return Ok(false);
    }

    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(rc_file)?;
    writeln!(file, "\n{}", INSTALL_BLOCK)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_shell() {
        assert_eq!(Shell::detect("/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(Shell::detect("/usr/local/bin/bash"), Some(Shell::Bash));
        assert_eq!(Shell::detect("/usr/bin/fish"), None);
        assert!("fish".parse::<Shell>().is_err());
        assert_eq!("bash".parse::<Shell>().unwrap(), Shell::Bash);
    }

    #[test]
    fn test_wrapper_uses_handoff_vars() {
        let script = wrapper_script(Shell::Zsh, "/home/me/.local/bin/workflow-tools");
        assert!(script.contains(r#"export WT_CD_FILE="${TMPDIR:-/tmp}/.wt_cd_$$""#));
        assert!(script.contains(r#"export RP_CD_FILE="${TMPDIR:-/tmp}/.rp_cd_$$""#));
        assert!(script.contains("wt() {\n    rm -f \"$WT_CD_FILE\""));
        assert!(script.contains("pr() {\n    rm -f \"$WT_CD_FILE\""));
        assert!(script.contains("rp() {\n    rm -f \"$RP_CD_FILE\""));
        assert!(script.contains("'/home/me/.local/bin/workflow-tools' rp \"$@\""));
        assert!(script.contains("return $exit_code"));
    }

    #[test]
    fn test_binary_path_is_quoted() {
        assert_eq!(shell_quote("/opt/it's/wf"), r"'/opt/it'\''s/wf'");

        let script = wrapper_script(Shell::Bash, "/opt/$(touch x)/\"wf`id`");
        assert!(script.contains("'/opt/$(touch x)/\"wf`id`' wt \"$@\""));
        assert!(script.contains("'/opt/$(touch x)/\"wf`id`' tm \"$@\""));
    }

    #[test]
    fn test_tm_wrapper_has_no_handoff() {
        let script = wrapper_script(Shell::Bash, "workflow-tools");
        let tm = script.split("tm() {").nth(1).unwrap();
        assert!(!tm.contains("CD_FILE"));
    }

    #[test]
    fn test_install_appends_once() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".zshrc");
        std::fs::write(&rc, "alias ll='ls -l'\n").unwrap();

        assert!(install_into(&rc).unwrap());
        assert!(!install_into(&rc).unwrap());

        let contents = std::fs::read_to_string(&rc).unwrap();
        assert!(contents.starts_with("alias ll='ls -l'\n"));
        assert_eq!(contents.matches(INSTALL_MARKER).count(), 1);
        assert!(contents.contains(r#"export PATH="$HOME/.local/bin:$PATH""#));
    }

    #[test]
    fn test_install_creates_missing_rc() {
        let dir = tempfile::tempdir().unwrap();
        let rc = Shell::Bash.rc_file(dir.path());
        assert!(install_into(&rc).unwrap());
        assert!(is_installed(&std::fs::read_to_string(&rc).unwrap()));
    }
}
