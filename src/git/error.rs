use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A git invocation that exited unsuccessfully.
///
/// Carries git's stderr (read back from the session scratch file) so the
/// diagnostic can be shown to whoever triggered the operation.
#[derive(Debug, Clone)]
pub struct CommandError {
    pub args: Vec<String>,
    pub code: Option<i32>,
    pub stderr: String,
    pub stdout: String,
}

impl CommandError {
    /// True when either stream mentions `needle`. git splits merge and
    /// branch diagnostics between stdout and stderr depending on version.
    pub fn mentions(&self, needle: &str) -> bool {
        self.stderr.contains(needle) || self.stdout.contains(needle)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "git {}", self.args.join(" "))?;
        match self.code {
            Some(code) => write!(f, " exited with status {code}")?,
            None => write!(f, " was terminated by a signal")?,
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {stderr}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CommandError {}

/// git output that did not have the expected shape.
#[derive(Debug, Clone, Error)]
#[error("unexpected {what} output: {detail}")]
pub struct ParseError {
    pub what: &'static str,
    pub detail: String,
}

impl ParseError {
    pub fn new(what: &'static str, detail: impl Into<String>) -> Self {
        Self {
            what,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GitError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git {args} produced output that is not valid UTF-8")]
    NonUtf8Output { args: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("merging {from} left unresolved conflicts: {source}")]
    MergeConflict {
        from: String,
        #[source]
        source: CommandError,
    },

    #[error("branch {name} already exists")]
    BranchExists {
        name: String,
        #[source]
        source: CommandError,
    },

    #[error("cannot derive a branch name from {0:?}")]
    InvalidBranchName(String),

    #[error("invalid treeish {0:?}")]
    InvalidTreeish(String),

    #[error("invalid document identifier {0:?}")]
    InvalidDocument(String),

    #[error("cannot {0} master")]
    RootBranch(&'static str),

    #[error("branch {0} is already closed")]
    AlreadyClosed(String),

    #[error("{path} is not a git working tree: {source}")]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("failed to initialise document store at {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },
}

pub type GitResult<T> = Result<T, GitError>;
