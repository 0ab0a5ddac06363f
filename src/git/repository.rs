use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use git2::{RepositoryInitOptions, Signature};
use tracing::info;

use super::commands::{CommandRunner, GitCli};
use super::error::{GitError, GitResult};
use super::naming::MASTER;
use super::session::CheckoutSession;
use super::types::Identity;

/// The one shared working directory and the lock that serializes every
/// checkout of it.
pub struct Repository {
    workdir: PathBuf,
    runner: Box<dyn CommandRunner>,
    lock: Mutex<()>,
}

impl Repository {
    pub fn open(path: &Path, runner: Box<dyn CommandRunner>) -> GitResult<Self> {
        let repo = git2::Repository::open(path).map_err(|source| GitError::NotARepository {
            path: path.to_path_buf(),
            source,
        })?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::NotARepository {
                path: path.to_path_buf(),
                source: git2::Error::from_str("bare repositories are not supported"),
            })?
            .to_path_buf();
        Ok(Self::with_runner(workdir, runner))
    }

    /// Wrap `workdir` without validating it. Used when the runner is not
    /// the real git binary.
    pub fn with_runner(workdir: PathBuf, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            workdir,
            runner,
            lock: Mutex::new(()),
        }
    }

    /// Create a document store at `path`: HEAD on master with an empty
    /// root commit, so the first checkout has something to check out.
    pub fn init(path: &Path, author: &Identity) -> GitResult<Self> {
        let init_err = |source: git2::Error| GitError::Init {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(path)?;
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(MASTER);
        let repo = git2::Repository::init_opts(path, &opts).map_err(init_err)?;

        if repo.head().is_err() {
            let tree_id = repo
                .index()
                .and_then(|mut index| index.write_tree())
                .map_err(init_err)?;
            let tree = repo.find_tree(tree_id).map_err(init_err)?;
            let sig = Signature::now(&author.name, &author.email).map_err(init_err)?;
            repo.commit(Some("HEAD"), &sig, &sig, "Create document store", &tree, &[])
                .map_err(init_err)?;
            info!(path = %path.display(), "initialised document store");
        }

        Self::open(path, Box::new(GitCli::default()))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Block until no other session holds the working directory.
    ///
    /// A poisoned lock is taken over: the next checkout is forced, so a
    /// half-finished operation cannot leak into it.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a session on `treeish`, or master when none is given.
    pub fn checkout(
        &self,
        treeish: Option<&str>,
        identity: &Identity,
    ) -> GitResult<CheckoutSession<'_>> {
        let treeish = treeish.filter(|t| !t.trim().is_empty()).unwrap_or(MASTER);
        CheckoutSession::open(self, treeish, identity)
    }
}
