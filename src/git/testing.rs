//! Fixtures shared by the git-backed tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use super::commands::{CommandRunner, StderrScratch};
use super::error::{CommandError, GitResult};
use super::repository::Repository;
use super::types::Identity;

pub fn tester() -> Identity {
    Identity::new("Test User", "test@example.com")
}

/// A fresh document store on master with only the root commit.
pub fn store() -> (TempDir, Repository) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let repo = Repository::init(dir.path(), &tester()).expect("failed to init store");
    (dir, repo)
}

/// Commit `content` as `id` on master.
pub fn seed(repo: &Repository, id: &str, content: &str, message: &str) {
    let session = repo.checkout(None, &tester()).expect("checkout master");
    session.write_document(id, content).expect("write");
    session.commit(message).expect("commit");
}

/// Runner that never touches git. Records how many calls overlap and
/// sleeps inside each one to widen any race window.
#[derive(Default)]
pub struct OverlapProbe {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
}

impl OverlapProbe {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CommandRunner for OverlapProbe {
    fn run(&self, _workdir: &Path, args: &[&str], _scratch: &StderrScratch) -> GitResult<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        // No merge is ever in progress.
        if args.first() == Some(&"rev-parse") {
            return Err(CommandError {
                args: args.iter().map(|a| a.to_string()).collect(),
                code: Some(1),
                stderr: String::new(),
                stdout: String::new(),
            }
            .into());
        }
        Ok(String::new())
    }
}

impl CommandRunner for std::sync::Arc<OverlapProbe> {
    fn run(&self, workdir: &Path, args: &[&str], scratch: &StderrScratch) -> GitResult<String> {
        self.as_ref().run(workdir, args, scratch)
    }
}
