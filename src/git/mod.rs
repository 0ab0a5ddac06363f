pub mod branches;
pub mod commands;
pub mod error;
pub mod naming;
pub mod parser;
pub mod repository;
pub mod session;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use commands::GitCli;
pub use error::GitError;
pub use repository::Repository;
pub use types::{BranchNode, Commit, CurrentBranch, FileChanges, Identity};
