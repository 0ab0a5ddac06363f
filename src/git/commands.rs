use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;
use tracing::debug;

use super::error::{CommandError, GitError, GitResult};

/// Per-session file that receives git's stderr.
///
/// Truncated before every invocation so a failure only ever reports the
/// stderr of the command that failed. Removed when dropped.
pub struct StderrScratch {
    file: NamedTempFile,
}

impl StderrScratch {
    pub fn new() -> GitResult<Self> {
        let file = tempfile::Builder::new()
            .prefix("mdreview-stderr-")
            .tempfile()?;
        Ok(Self { file })
    }

    pub fn truncate(&self) -> GitResult<()> {
        self.file.as_file().set_len(0)?;
        Ok(())
    }

    pub fn stdio(&self) -> GitResult<Stdio> {
        Ok(Stdio::from(self.file.reopen()?))
    }

    pub fn contents(&self) -> GitResult<String> {
        let bytes = fs::read(self.file.path())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Runs git against the shared working directory.
///
/// Implementations mutate the checkout in place; callers must hold the
/// repository lock for the whole call.
pub trait CommandRunner: Send + Sync {
    fn run(&self, workdir: &Path, args: &[&str], scratch: &StderrScratch) -> GitResult<String>;
}

pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Collisions and conflicts are recognised by git's English messages,
    /// so translations stay off whatever the caller's locale.
    fn command(&self, workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(workdir)
            .env("LC_ALL", "C")
            .env_remove("LANGUAGE")
            .stdin(Stdio::null());
        cmd
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl CommandRunner for GitCli {
    fn run(
        &self,
        workdir: &Path,
        args: &[&str],
        scratch: &StderrScratch,
    ) -> GitResult<String> {
        scratch.truncate()?;
        debug!(args = ?args, "running git");

        let output = self
            .command(workdir)
            .args(args)
            .stderr(scratch.stdio()?)
            .output()
            .map_err(|source| GitError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError {
                args: args.iter().map(|a| a.to_string()).collect(),
                code: output.status.code(),
                stderr: scratch.contents()?,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            }
            .into());
        }

        String::from_utf8(output.stdout).map_err(|_| GitError::NonUtf8Output {
            args: args.join(" "),
        })
    }
}
