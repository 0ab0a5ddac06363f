use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::MutexGuard;

use tracing::{debug, info, warn};

use super::branches::build_forest;
use super::commands::StderrScratch;
use super::error::{GitError, GitResult};
use super::naming::{self, MASTER};
use super::parser::{self, strip_markdown_suffix};
use super::repository::Repository;
use super::types::{BranchEntry, BranchNode, Commit, CurrentBranch, FileChanges, Identity};

/// Content returned for a document that does not exist yet.
pub const EMPTY_DOCUMENT: &str = "Nothing here yet :)";

// Paths are printed verbatim; git would otherwise octal-escape non-ASCII.
const DIFF_ARGS: [&str; 7] = [
    "-c",
    "core.quotePath=false",
    "diff",
    "--no-color",
    "-p",
    "-U9999999",
    "--word-diff=plain",
];
const LOG_ARGS: [&str; 7] = [
    "-c",
    "core.quotePath=false",
    "log",
    "--no-color",
    "-U4",
    "--word-diff=plain",
    "--date=iso-strict",
];

/// Exclusive view of the working directory checked out at one treeish.
///
/// Holds the repository lock until dropped. Field order matters: the
/// scratch file is removed before the lock is released.
pub struct CheckoutSession<'repo> {
    repo: &'repo Repository,
    treeish: String,
    scratch: StderrScratch,
    _guard: MutexGuard<'repo, ()>,
}

impl<'repo> CheckoutSession<'repo> {
    pub(crate) fn open(
        repo: &'repo Repository,
        treeish: &str,
        identity: &Identity,
    ) -> GitResult<Self> {
        let treeish = naming::validate_treeish(treeish)?.to_string();
        let guard = repo.lock();
        debug!(%treeish, "acquired working directory");

        // Any early return from here drops `session`, releasing the lock.
        let session = Self {
            repo,
            treeish,
            scratch: StderrScratch::new()?,
            _guard: guard,
        };
        session.git(&["config", "--replace-all", "user.name", &identity.name])?;
        session.git(&["config", "--replace-all", "user.email", &identity.email])?;
        session.abandon_unfinished_merge();
        session.git(&["checkout", "-f", &session.treeish])?;
        Ok(session)
    }

    pub fn treeish(&self) -> &str {
        &self.treeish
    }

    fn git(&self, args: &[&str]) -> GitResult<String> {
        self.repo
            .runner()
            .run(self.repo.workdir(), args, &self.scratch)
    }

    fn succeeds(&self, args: &[&str]) -> bool {
        self.git(args).is_ok()
    }

    /// A conflicted `update` from an earlier session leaves MERGE_HEAD
    /// behind; committing on top of it would record a bogus merge.
    fn abandon_unfinished_merge(&self) {
        if !self.succeeds(&["rev-parse", "-q", "--verify", "MERGE_HEAD"]) {
            return;
        }
        match self.git(&["merge", "--abort"]) {
            Ok(_) => info!("aborted merge left unfinished by an earlier session"),
            Err(err) => warn!(error = %err, "could not abort unfinished merge"),
        }
    }

    fn has_parent(&self, treeish: &str) -> bool {
        let parent = format!("{treeish}^");
        self.succeeds(&["rev-parse", "-q", "--verify", &parent])
    }

    fn document_path(&self, id: &str) -> GitResult<(String, PathBuf)> {
        let relative = Path::new(id);
        let well_formed = !id.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(GitError::InvalidDocument(id.to_string()));
        }
        let file = format!("{id}.md");
        let path = self.repo.workdir().join(&file);
        Ok((file, path))
    }

    pub fn list_documents(&self) -> GitResult<Vec<String>> {
        let output = self.git(&["ls-files", "-z"])?;
        Ok(output
            .split('\0')
            .filter(|f| f.ends_with(".md"))
            .map(|f| strip_markdown_suffix(f).to_string())
            .collect())
    }

    pub fn read_document(&self, id: &str) -> GitResult<String> {
        let (_, path) = self.document_path(id)?;
        if !path.exists() {
            return Ok(EMPTY_DOCUMENT.to_string());
        }
        Ok(fs::read_to_string(path)?)
    }

    pub fn document_exists(&self, id: &str) -> GitResult<bool> {
        let (_, path) = self.document_path(id)?;
        Ok(path.is_file())
    }

    pub fn write_document(&self, id: &str, content: &str) -> GitResult<()> {
        let (file, path) = self.document_path(id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        self.git(&["add", "--", &file])?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> GitResult<()> {
        self.git(&["commit", "-m", message])?;
        info!(treeish = %self.treeish, "committed");
        Ok(())
    }

    /// Changes this treeish makes relative to master, or relative to its own
    /// parent commit when it has not diverged from master.
    pub fn diff_against_parent(&self) -> GitResult<FileChanges> {
        let range = format!("{MASTER}...{}", self.treeish);
        let mut args = DIFF_ARGS.to_vec();
        args.push(&range);
        let changes = parser::parse_diff(&self.git(&args)?)?;
        if !changes.is_empty() || !self.has_parent(&self.treeish) {
            return Ok(changes);
        }

        let parent = format!("{}^", self.treeish);
        let mut args = DIFF_ARGS.to_vec();
        args.extend([parent.as_str(), self.treeish.as_str()]);
        Ok(parser::parse_diff(&self.git(&args)?)?)
    }

    /// Commits unique to this treeish, most recent first. Falls back to the
    /// tip commit alone when nothing is ahead of master.
    pub fn log(&self) -> GitResult<Vec<Commit>> {
        let range = format!("{MASTER}..{}", self.treeish);
        let mut args = LOG_ARGS.to_vec();
        args.push(&range);
        let commits = parser::parse_log(&self.git(&args)?)?;
        if !commits.is_empty() {
            return Ok(commits);
        }

        let fallback = if self.has_parent(&self.treeish) {
            format!("{0}^..{0}", self.treeish)
        } else {
            self.treeish.clone()
        };
        let mut args = LOG_ARGS.to_vec();
        args.push(&fallback);
        Ok(parser::parse_log(&self.git(&args)?)?)
    }

    /// Branch off the current treeish, named after `description`.
    pub fn create_branch(&mut self, description: &str, handle_duplicates: bool) -> GitResult<String> {
        let parent = self.treeish.clone();
        self.create_branch_under(&parent, description, handle_duplicates)
    }

    /// Branch off the current checkout, naming the branch as a child of
    /// `parent`. The session follows the new branch.
    pub fn create_branch_under(
        &mut self,
        parent: &str,
        description: &str,
        handle_duplicates: bool,
    ) -> GitResult<String> {
        let slug = naming::slugify(description);
        if slug.is_empty() {
            return Err(GitError::InvalidBranchName(description.to_string()));
        }
        let base = naming::qualify(parent, &slug);

        for candidate in naming::candidates(&base) {
            match self.git(&["branch", &candidate]) {
                Ok(_) => {
                    self.git(&["checkout", &candidate])?;
                    info!(branch = %candidate, from = %self.treeish, "created branch");
                    self.treeish = candidate.clone();
                    return Ok(candidate);
                }
                Err(GitError::Command(err)) if err.mentions("already exists") => {
                    if !handle_duplicates {
                        return Err(GitError::BranchExists {
                            name: candidate,
                            source: err,
                        });
                    }
                    debug!(branch = %candidate, "branch name taken, trying next");
                }
                Err(err) => return Err(err),
            }
        }
        unreachable!("candidate names are unbounded")
    }

    fn branch_entries(&self) -> GitResult<Vec<BranchEntry>> {
        let output = self.git(&["branch", "-v", "--no-color"])?;
        Ok(parser::parse_branch_list(&output)?)
    }

    pub fn list_branches(&self) -> GitResult<Vec<BranchNode>> {
        Ok(build_forest(&self.branch_entries()?, &self.treeish))
    }

    pub fn current_branch(&self) -> GitResult<CurrentBranch> {
        let current = self
            .branch_entries()?
            .into_iter()
            .find(|e| e.current && !e.detached);
        Ok(match current {
            Some(entry) => CurrentBranch {
                name: entry.name,
                description: entry.subject,
                detached: false,
            },
            None => CurrentBranch {
                name: self.treeish.clone(),
                description: "No branch".to_string(),
                detached: true,
            },
        })
    }

    /// Documents that both this treeish and `into` changed since their
    /// merge base. `into` defaults to this treeish's parent.
    pub fn clashing_files(&self, into: Option<&str>) -> GitResult<Vec<String>> {
        let into = match into {
            Some(into) => naming::validate_treeish(into)?,
            None => naming::parent_of(&self.treeish),
        };
        let base = self.git(&["merge-base", &self.treeish, into])?;
        let output = self.git(&[
            "-c",
            "core.quotePath=false",
            "merge-tree",
            base.trim(),
            &self.treeish,
            into,
        ])?;
        Ok(parser::parse_clashes(&output))
    }

    fn merge_from(&self, from: &str) -> GitResult<()> {
        match self.git(&["merge", "--no-edit", from]) {
            Ok(_) => Ok(()),
            Err(GitError::Command(err)) if err.mentions("CONFLICT") => {
                Err(GitError::MergeConflict {
                    from: from.to_string(),
                    source: err,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Merge `from` into this checkout and delete it when it is a branch.
    pub fn merge(&self, from: &str) -> GitResult<()> {
        let from = naming::validate_treeish(from)?;
        self.merge_from(from)?;
        info!(%from, into = %self.treeish, "merged");

        if from == MASTER {
            return Ok(());
        }
        if let Err(err) = self.git(&["branch", "-d", from]) {
            warn!(%from, error = %err, "merged ref was not deleted");
        }
        Ok(())
    }

    /// Merge `from` (master by default) into this checkout. Returns false
    /// when the merge failed; conflict markers stay in the working tree.
    pub fn update(&self, from: Option<&str>) -> GitResult<bool> {
        let from = naming::validate_treeish(from.unwrap_or(MASTER))?;
        match self.merge_from(from) {
            Ok(()) => Ok(true),
            Err(err) => {
                info!(%from, into = %self.treeish, error = %err, "update did not merge cleanly");
                Ok(false)
            }
        }
    }

    /// Archive this branch under the `closed--` prefix.
    pub fn close(&mut self) -> GitResult<String> {
        if self.treeish == MASTER {
            return Err(GitError::RootBranch("close"));
        }
        if naming::is_closed(&self.treeish) {
            return Err(GitError::AlreadyClosed(self.treeish.clone()));
        }
        let closed = naming::closed_name(&self.treeish);
        self.git(&["branch", "-m", &self.treeish, &closed])?;
        info!(branch = %self.treeish, %closed, "closed branch");
        self.treeish = closed.clone();
        Ok(closed)
    }
}

impl Drop for CheckoutSession<'_> {
    fn drop(&mut self) {
        debug!(treeish = %self.treeish, "releasing working directory");
    }
}
