//! Scrapers for git's textual output.
//!
//! Every function here is tied to one fixed output format; anything that
//! does not match is reported as a [`ParseError`] rather than guessed at.

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::ParseError;
use super::types::{BranchEntry, Commit, FileChanges};

const MARKDOWN_SUFFIX: &str = ".md";

static RE_FILE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^diff --git ").expect("valid file boundary regex"));

/// Post-image path of a `diff --git` line, quoted (group 1) or bare (group 2).
static RE_FILE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:"a/(?:[^"\\]|\\.)*"|a/.*?) (?:"b/((?:[^"\\]|\\.)*)"|b/(.*))$"#)
        .expect("valid file header regex")
});

/// Lines git writes straight after `diff --git`. Word diffs print context
/// without a prefix, so a document line can look like a file boundary; only
/// one followed by one of these is taken as the real thing.
const EXTENDED_HEADERS: [&str; 13] = [
    "index ",
    "old mode ",
    "new mode ",
    "deleted file mode ",
    "new file mode ",
    "copy from ",
    "copy to ",
    "rename from ",
    "rename to ",
    "similarity index ",
    "dissimilarity index ",
    "--- ",
    "Binary files ",
];

static RE_HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^@@.*@@.*$").expect("valid hunk header regex"));

static RE_COMMIT_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^commit ([0-9a-f]{40}|[0-9a-f]{64})(?: \(.*\))?$")
        .expect("valid commit header regex")
});

static RE_AUTHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Author:\s*(.*?)\s*<([^>]*)>\s*$").expect("valid author regex"));

static RE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Date:\s*(.+?)\s*$").expect("valid date regex"));

static RE_BRANCH_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([*+ ]) (\S+)\s+([0-9a-f]+)(?: (.*))?$").expect("valid branch line regex")
});

static RE_DETACHED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\* (\((?:no branch|HEAD detached)[^)]*\))\s+([0-9a-f]+)(?: (.*))?$")
        .expect("valid detached line regex")
});

static RE_CLASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:changed in both\n\s*base|added in both\n\s*our)\s+\d+ [0-9a-f]+ (.+)$")
        .expect("valid merge-tree regex")
});

pub fn strip_markdown_suffix(path: &str) -> &str {
    path.strip_suffix(MARKDOWN_SUFFIX).unwrap_or(path)
}

fn line_after(text: &str, start: usize) -> Option<&str> {
    let (_, after) = text[start..].split_once('\n')?;
    after.lines().next()
}

/// Offsets of the `diff --git` lines that really open a file section.
fn file_starts(text: &str) -> Vec<usize> {
    RE_FILE_BOUNDARY
        .find_iter(text)
        .map(|m| m.start())
        .filter(|&start| {
            line_after(text, start)
                .is_some_and(|line| EXTENDED_HEADERS.iter().any(|h| line.starts_with(h)))
        })
        .collect()
}

/// Undo git's C-style quoting of a path (the text between the quotes).
fn unquote_path(quoted: &str) -> Result<String, ParseError> {
    let bad = || ParseError::new("path", format!("bad quoted path {quoted:?}"));
    let mut bytes = Vec::with_capacity(quoted.len());
    let mut input = quoted.bytes();
    while let Some(byte) = input.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        let unescaped = match input.next().ok_or_else(bad)? {
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            first @ b'0'..=b'3' => {
                let mut value = first - b'0';
                for _ in 0..2 {
                    let digit = input
                        .next()
                        .filter(|d| (b'0'..=b'7').contains(d))
                        .ok_or_else(bad)?;
                    value = value * 8 + (digit - b'0');
                }
                value
            }
            other => other,
        };
        bytes.push(unescaped);
    }
    String::from_utf8(bytes).map_err(|_| bad())
}

/// Split a multi-file patch into document id -> hunk body.
///
/// The body is everything after the first hunk-header line of each file;
/// files without a hunk (empty or mode-only changes) map to "".
pub fn parse_diff(text: &str) -> Result<FileChanges, ParseError> {
    let mut files = FileChanges::new();
    if text.trim().is_empty() {
        return Ok(files);
    }

    let starts = file_starts(text);
    if starts.first() != Some(&0) {
        return Err(ParseError::new(
            "diff",
            "output does not open with a file header",
        ));
    }

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let section = &text[start + "diff --git ".len()..end];

        let header = section.lines().next().unwrap_or_default();
        let bad_header = || ParseError::new("diff", format!("bad file header {header:?}"));
        let caps = RE_FILE_HEADER.captures(header).ok_or_else(bad_header)?;
        let path = match (caps.get(1), caps.get(2)) {
            (Some(quoted), _) => unquote_path(quoted.as_str())?,
            (None, Some(bare)) => bare.as_str().to_string(),
            (None, None) => return Err(bad_header()),
        };

        let body = match RE_HUNK_HEADER.find(section) {
            Some(hunk) => {
                let rest = &section[hunk.end()..];
                rest.strip_prefix('\n').unwrap_or(rest)
            }
            None => "",
        };

        files.insert(strip_markdown_suffix(&path).to_string(), body.to_string());
    }

    Ok(files)
}

/// Parse `git log -U<n> --word-diff=plain --date=iso-strict` output into
/// commits, most recent first.
pub fn parse_log(text: &str) -> Result<Vec<Commit>, ParseError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // A `commit <id>` line inside a patch is document text unless git's
    // own Merge/Author line follows it.
    let headers: Vec<_> = RE_COMMIT_HEADER
        .captures_iter(text)
        .filter(|caps| {
            caps.get(0).is_some_and(|m| {
                line_after(text, m.start())
                    .is_some_and(|line| line.starts_with("Author:") || line.starts_with("Merge:"))
            })
        })
        .collect();
    let opens_with_header = headers
        .first()
        .and_then(|caps| caps.get(0))
        .is_some_and(|m| m.start() == 0);
    if !opens_with_header {
        return Err(ParseError::new("log", "output does not open with a commit header"));
    }

    let mut commits = Vec::with_capacity(headers.len());
    for (i, caps) in headers.iter().enumerate() {
        let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let block = &text[whole.end()..end];
        commits.push(parse_commit_block(id.as_str(), block)?);
    }

    Ok(commits)
}

fn parse_commit_block(id: &str, block: &str) -> Result<Commit, ParseError> {
    let (head, rest) = block.split_once("\n\n").unwrap_or((block, ""));

    let author = RE_AUTHOR
        .captures(head)
        .ok_or_else(|| ParseError::new("log", format!("commit {id} has no Author line")))?;
    let date = RE_DATE
        .captures(head)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ParseError::new("log", format!("commit {id} has no Date line")))?;
    let date = DateTime::parse_from_rfc3339(date.as_str()).map_err(|err| {
        ParseError::new("log", format!("commit {id} has date {:?}: {err}", date.as_str()))
    })?;

    let (message, patch) = match file_starts(rest).first() {
        Some(&start) => (&rest[..start], &rest[start..]),
        None => (rest, ""),
    };

    Ok(Commit {
        id: id.to_string(),
        author_name: author[1].to_string(),
        author_email: author[2].to_string(),
        date,
        message: dedent_message(message),
        files: parse_diff(patch)?,
    })
}

fn dedent_message(message: &str) -> String {
    message
        .lines()
        .map(|line| line.strip_prefix("    ").unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Parse `git branch -v --no-color`.
pub fn parse_branch_list(text: &str) -> Result<Vec<BranchEntry>, ParseError> {
    let mut entries = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        if let Some(caps) = RE_DETACHED_LINE.captures(line) {
            entries.push(BranchEntry {
                name: caps[1].to_string(),
                commit: caps[2].to_string(),
                subject: caps.get(3).map_or("", |m| m.as_str()).to_string(),
                current: true,
                detached: true,
            });
            continue;
        }

        let caps = RE_BRANCH_LINE
            .captures(line)
            .ok_or_else(|| ParseError::new("branch", format!("bad line {line:?}")))?;
        entries.push(BranchEntry {
            name: caps[2].to_string(),
            commit: caps[3].to_string(),
            subject: caps.get(4).map_or("", |m| m.as_str()).to_string(),
            current: &caps[1] == "*",
            detached: false,
        });
    }
    Ok(entries)
}

/// Markdown documents `git merge-tree <base> <a> <b>` reports as touched
/// on both sides.
pub fn parse_clashes(text: &str) -> Vec<String> {
    let mut clashes: Vec<String> = RE_CLASH
        .captures_iter(text)
        .filter_map(|caps| {
            let path = &caps[1];
            let path = match path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
                Some(quoted) => unquote_path(quoted).ok()?,
                None => path.to_string(),
            };
            path.strip_suffix(MARKDOWN_SUFFIX).map(|id| id.to_string())
        })
        .collect();
    clashes.dedup();
    clashes
}
