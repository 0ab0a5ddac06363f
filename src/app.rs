use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::cli::{Cli, Command};
use crate::config::{self, MdreviewConfig};
use crate::git::{BranchNode, Commit, FileChanges, GitCli, Identity, Repository};
use crate::workflow::{self, FixDraft, Review};

pub struct App {
    repo_path: PathBuf,
    git_program: String,
    identity: Identity,
    /// Identity given on the command line, if any.
    explicit_identity: Option<Identity>,
    json: bool,
}

impl App {
    pub fn new(cli: &Cli, config: &MdreviewConfig) -> Result<Self> {
        let repo_path = match cli.repo.clone().or_else(|| config.repo.clone()) {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let explicit_identity = if cli.name.is_some() || cli.email.is_some() {
            Some(Identity::new(
                cli.name.clone().unwrap_or_default(),
                cli.email.clone().unwrap_or_default(),
            ))
        } else {
            None
        };
        let identity = Identity::resolve(explicit_identity.as_ref(), config.identity.as_ref());

        Ok(Self {
            repo_path,
            git_program: config.git.clone().unwrap_or_else(|| "git".to_string()),
            identity,
            explicit_identity,
            json: cli.json,
        })
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(
            &self.repo_path,
            Box::new(GitCli::new(self.git_program.as_str())),
        )
        .with_context(|| format!("opening document store {}", self.repo_path.display()))
    }

    /// Run one command and return what should be printed.
    pub fn run(&self, command: Command) -> Result<String> {
        match command {
            Command::Init => {
                let repo = Repository::init(&self.repo_path, &self.identity)?;
                self.render(&repo.workdir().display().to_string(), |path| {
                    format!("initialised document store in {path}\n")
                })
            }
            Command::Ls { branch } => {
                let repo = self.open()?;
                let session = repo.checkout(branch.as_deref(), &self.identity)?;
                let docs = session.list_documents()?;
                self.render(&docs, |docs| lines(docs.iter()))
            }
            Command::Cat { document, branch } => {
                let repo = self.open()?;
                let session = repo.checkout(branch.as_deref(), &self.identity)?;
                let shown = ShownDocument {
                    exists: session.document_exists(&document)?,
                    content: session.read_document(&document)?,
                    document,
                };
                self.render(&shown, |d| d.content.clone())
            }
            Command::Edit {
                document,
                message,
                branch,
                file,
            } => {
                let source = read_source(file.as_deref())?;
                let repo = self.open()?;
                let created = workflow::save_edit(
                    &repo,
                    &self.identity,
                    branch.as_deref(),
                    &document,
                    &message,
                    &source,
                )?;
                self.render(&created, |b| format!("{b}\n"))
            }
            Command::Diff { branch } => {
                let repo = self.open()?;
                let session = repo.checkout(Some(&branch), &self.identity)?;
                let diff = session.diff_against_parent()?;
                self.render(&diff, render_changes)
            }
            Command::Log { branch } => {
                let repo = self.open()?;
                let session = repo.checkout(Some(&branch), &self.identity)?;
                let log = session.log()?;
                self.render(&log, |log| render_log(log))
            }
            Command::Branches { under } => {
                let repo = self.open()?;
                let session = repo.checkout(under.as_deref(), &self.identity)?;
                let forest = session.list_branches()?;
                self.render(&forest, |f| render_forest(f))
            }
            Command::Status { branch } => {
                let repo = self.open()?;
                let review = workflow::review(&repo, &self.identity, branch.as_deref())?;
                self.render(&review, render_review)
            }
            Command::Merge { branch, into } => {
                let repo = self.open()?;
                let into = workflow::merge_branch(&repo, &self.identity, &branch, into.as_deref())?;
                self.render(&into, |into| format!("merged {branch} into {into}\n"))
            }
            Command::Close { branch } => {
                let repo = self.open()?;
                let closed = workflow::close_branch(&repo, &self.identity, &branch)?;
                self.render(&closed, |c| format!("{c}\n"))
            }
            Command::Fix {
                branch,
                into,
                message: None,
                fields,
            } => {
                if !fields.is_empty() {
                    bail!("submitting documents needs --message");
                }
                let repo = self.open()?;
                let draft = workflow::prepare_fix(&repo, &self.identity, &branch, into.as_deref())?;
                self.render(&draft, render_draft)
            }
            Command::Fix {
                branch,
                into,
                message: Some(message),
                fields,
            } => {
                let fields = fields
                    .into_iter()
                    .map(|(key, value)| Ok((key, resolve_field_value(&value)?)))
                    .collect::<Result<Vec<_>>>()?;
                let documents = workflow::parse_submissions(
                    fields.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                )?;
                let repo = self.open()?;
                let created = workflow::submit_fix(
                    &repo,
                    &self.identity,
                    &branch,
                    into.as_deref(),
                    &message,
                    &documents,
                )?;
                self.render(&created, |b| format!("{b}\n"))
            }
            Command::Whoami { save } => {
                if save {
                    let Some(ref explicit) = self.explicit_identity else {
                        bail!("--save needs --name and/or --email");
                    };
                    let path = config::save_identity(explicit)?;
                    tracing::info!(path = %path.display(), "remembered identity");
                }
                self.render(&self.identity, |id| format!("{} <{}>\n", id.name, id.email))
            }
        }
    }

    fn render<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> Result<String> {
        if self.json {
            let mut out = serde_json::to_string_pretty(value)?;
            out.push('\n');
            Ok(out)
        } else {
            Ok(text(value))
        }
    }
}

#[derive(Serialize)]
struct ShownDocument {
    document: String,
    exists: bool,
    content: String,
}

/// `@path` reads the value from a file; anything else is taken literally.
fn resolve_field_value(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading field value from {path}"))
        }
        None => Ok(value.to_string()),
    }
}

fn read_source(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("reading document from stdin")?;
            Ok(source)
        }
    }
}

fn lines<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(|item| format!("{item}\n")).collect()
}

fn render_changes(changes: &FileChanges) -> String {
    let mut out = String::new();
    for (doc, body) in changes {
        out.push_str(&format!("=== {doc}\n"));
        out.push_str(body);
        if !body.is_empty() && !body.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn render_log(log: &[Commit]) -> String {
    let mut out = String::new();
    for commit in log {
        out.push_str(&format!(
            "commit {}\nAuthor: {} <{}>\nDate:   {}\n\n",
            commit.id,
            commit.author_name,
            commit.author_email,
            commit.date.to_rfc3339()
        ));
        for line in commit.message.lines() {
            out.push_str(&format!("    {line}\n"));
        }
        out.push('\n');
        out.push_str(&render_changes(&commit.files));
    }
    out
}

fn render_forest(forest: &[BranchNode]) -> String {
    fn walk(out: &mut String, nodes: &[BranchNode], depth: usize) {
        for node in nodes {
            out.push_str(&format!(
                "{:indent$}{}  {}\n",
                "",
                node.treeish,
                node.description,
                indent = depth * 2
            ));
            walk(out, &node.children, depth + 1);
        }
    }
    let mut out = String::new();
    walk(&mut out, forest, 0);
    out
}

fn render_review(review: &Review) -> String {
    let current = &review.current;
    let mut out = if current.detached {
        format!("{} (detached)\n", current.name)
    } else {
        format!("{}: {}\n", current.name, current.description)
    };
    out.push_str(&format!("parent: {}\n", review.parent));
    if !review.clashes.is_empty() {
        out.push_str(&format!("also changed on {}:\n", review.parent));
        out.push_str(&lines(review.clashes.iter()));
    }
    if !review.branches.is_empty() {
        out.push_str("\nopen branches:\n");
        out.push_str(&render_forest(&review.branches));
    }
    out.push('\n');
    out.push_str(&render_changes(&review.diff));
    out
}

fn render_draft(draft: &FixDraft) -> String {
    let mut out = String::new();
    if !draft.clean {
        out.push_str("merge left conflicts; resolve them and resubmit\n");
    }
    for (doc, content) in &draft.documents {
        out.push_str(&format!("=== {doc}\n"));
        out.push_str(content);
    }
    out
}
