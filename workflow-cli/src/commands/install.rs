//! Shell integration (`install`)

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};
use clap::{Args, ValueEnum};
use workflow_core::shell::{install_into, wrapper_script, Shell};

use crate::ui;

const BINARY_NAME: &str = "workflow-tools";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShellChoice {
    Zsh,
    Bash,
    /// Detect from $SHELL
    Auto,
}

/// Install shell integration (cd support and aliases)
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Shell to install for
    #[arg(long, value_enum, default_value_t = ShellChoice::Auto)]
    pub shell: ShellChoice,

    /// Print the shell script instead of installing
    #[arg(long = "print")]
    pub print_only: bool,
}

impl InstallArgs {
    /// Execute the install command
    pub async fn execute(&self) -> anyhow::Result<()> {
        let shell = resolve_shell(self.shell, &std::env::var("SHELL").unwrap_or_default())?;

        if self.print_only {
            println!("{}", wrapper_script(shell, &find_binary()));
            return Ok(());
        }

        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        let rc_file = shell.rc_file(&home);

        if install_into(&rc_file)? {
            println!("{}", ui::success(format!("Installed to {}", rc_file.display())));
        } else {
            println!("{}", ui::info(format!("Already installed in {}", rc_file.display())));
        }
        offer_source_command(&rc_file).await;
        Ok(())
    }
}

fn resolve_shell(choice: ShellChoice, shell_env: &str) -> anyhow::Result<Shell> {
    match choice {
        ShellChoice::Zsh => Ok(Shell::Zsh),
        ShellChoice::Bash => Ok(Shell::Bash),
        ShellChoice::Auto => match Shell::detect(shell_env) {
            Some(shell) => Ok(shell),
            None => bail!("Unknown shell: {}. Use --shell to specify.", shell_env),
        },
    }
}

/// Absolute path of the binary on PATH, else its bare name
fn find_binary() -> String {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(BINARY_NAME))
                .find(|candidate| candidate.is_file())
        })
        .map(|path: PathBuf| path.display().to_string())
        .unwrap_or_else(|| BINARY_NAME.to_string())
}

async fn offer_source_command(rc_file: &Path) {
    let source_cmd = format!("source {}", rc_file.display());
    println!("{}", ui::dim(format!("  Restart your shell or run: {}", source_cmd)));
    if ui::copy_to_clipboard(&source_cmd).await {
        println!("{}", ui::dim("  (copied to clipboard)"));
    }
}
