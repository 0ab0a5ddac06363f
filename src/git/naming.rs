//! Branch naming: slugs, `--`-nested names, collision suffixes and the
//! parent of a treeish.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::error::{GitError, GitResult};

pub const MASTER: &str = "master";
pub const SEPARATOR: &str = "--";
pub const CLOSED: &str = "closed";
pub const CLOSED_PREFIX: &str = "closed--";

/// Turn free text into a token usable as a branch segment.
///
/// Accented letters are decomposed and lose their marks; whatever is still
/// not ASCII is dropped. Runs of whitespace and hyphens collapse into one `-`, so a slug never
/// contains the `--` separator.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.trim().nfkd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch == '-' || ch.is_whitespace() {
            pending_dash = true;
        }
    }
    slug.trim_matches('_').to_string()
}

/// `name` nested under `parent`; top-level when the parent is master.
pub fn qualify(parent: &str, name: &str) -> String {
    if parent == MASTER {
        name.to_string()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

/// `base`, `base-1`, `base-2`, ...
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((1u64..).map(move |n| format!("{base}-{n}")))
}

pub fn parent_of(treeish: &str) -> &str {
    match treeish.rsplit_once(SEPARATOR) {
        Some((CLOSED, _)) => MASTER,
        Some((parent, _)) => parent,
        None => MASTER,
    }
}

pub fn is_closed(treeish: &str) -> bool {
    treeish.starts_with(CLOSED_PREFIX)
}

pub fn closed_name(treeish: &str) -> String {
    format!("{CLOSED_PREFIX}{treeish}")
}

/// Reject names git would parse as an option.
pub fn validate_treeish(treeish: &str) -> GitResult<&str> {
    if treeish.is_empty() || treeish.starts_with('-') || treeish.chars().any(char::is_whitespace)
    {
        return Err(GitError::InvalidTreeish(treeish.to_string()));
    }
    Ok(treeish)
}
