use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Document identifier -> diff body for that document.
pub type FileChanges = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub const ANONYMOUS_NAME: &'static str = "Anonymous";
    pub const ANONYMOUS_EMAIL: &'static str = "anonymous@inter.net";

    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Pick the author for a checkout: the authenticated identity wins,
    /// then the remembered one. Blank fields fall back to the anonymous
    /// defaults independently of each other.
    pub fn resolve(authenticated: Option<&Identity>, remembered: Option<&Identity>) -> Identity {
        let (name, email) = match authenticated.or(remembered) {
            Some(id) => (id.name.as_str(), id.email.as_str()),
            None => ("", ""),
        };
        let name = if name.trim().is_empty() {
            Self::ANONYMOUS_NAME
        } else {
            name
        };
        let email = if email.trim().is_empty() {
            Self::ANONYMOUS_EMAIL
        } else {
            email
        };
        Identity::new(name, email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub date: DateTime<FixedOffset>,
    pub message: String,
    pub files: FileChanges,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchNode {
    pub treeish: String,
    pub description: String,
    pub children: Vec<BranchNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentBranch {
    pub name: String,
    pub description: String,
    pub detached: bool,
}

/// One line of `git branch -v`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEntry {
    pub name: String,
    pub commit: String,
    pub subject: String,
    pub current: bool,
    pub detached: bool,
}
