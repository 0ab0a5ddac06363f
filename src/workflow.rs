//! Request-sized flows over a single checkout: what one "save", "merge",
//! "close" or "fix" does from start to finish.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::git::naming::{self, MASTER};
use crate::git::{BranchNode, Commit, CurrentBranch, FileChanges, GitError, Identity, Repository};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("submitted field {0}_source has no matching {0}_name")]
    MissingDocumentName(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// One document carried by a multi-document submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSubmission {
    pub name: String,
    pub source: String,
}

/// Pair every `<field>_source` with its `<field>_name`.
pub fn parse_submissions<'a, I>(fields: I) -> WorkflowResult<Vec<DocumentSubmission>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let fields: Vec<(&str, &str)> = fields.into_iter().collect();
    let mut documents = Vec::new();
    for (key, source) in &fields {
        let Some(field) = key.strip_suffix("_source") else {
            continue;
        };
        let name_key = format!("{field}_name");
        let name = fields
            .iter()
            .find(|(k, _)| *k == name_key)
            .map(|(_, v)| *v)
            .ok_or_else(|| WorkflowError::MissingDocumentName(field.to_string()))?;
        documents.push(DocumentSubmission {
            name: name.to_string(),
            source: source.to_string(),
        });
    }
    Ok(documents)
}

/// Commit an edit of `document` on a new branch named after `description`.
/// Returns the branch.
pub fn save_edit(
    repo: &Repository,
    identity: &Identity,
    treeish: Option<&str>,
    document: &str,
    description: &str,
    source: &str,
) -> WorkflowResult<String> {
    let mut session = repo.checkout(treeish, identity)?;
    let branch = session.create_branch(description, true)?;
    session.write_document(document, source)?;
    session.commit(description)?;
    Ok(branch)
}

#[derive(Debug, Serialize)]
pub struct Review {
    pub current: CurrentBranch,
    pub parent: String,
    pub diff: FileChanges,
    pub log: Vec<Commit>,
    pub clashes: Vec<String>,
    pub branches: Vec<BranchNode>,
}

/// Everything needed to judge a change before merging it.
pub fn review(repo: &Repository, identity: &Identity, treeish: Option<&str>) -> WorkflowResult<Review> {
    let session = repo.checkout(treeish, identity)?;
    let parent = naming::parent_of(session.treeish()).to_string();
    let clashes = if session.treeish() == MASTER {
        Vec::new()
    } else {
        session.clashing_files(None)?
    };
    Ok(Review {
        current: session.current_branch()?,
        parent,
        diff: session.diff_against_parent()?,
        log: session.log()?,
        clashes,
        branches: session.list_branches()?,
    })
}

/// Merge `treeish` into `into`, which defaults to its parent.
pub fn merge_branch(
    repo: &Repository,
    identity: &Identity,
    treeish: &str,
    into: Option<&str>,
) -> WorkflowResult<String> {
    let into = into.unwrap_or_else(|| naming::parent_of(treeish)).to_string();
    let session = repo.checkout(Some(&into), identity)?;
    session.merge(treeish)?;
    Ok(into)
}

pub fn close_branch(repo: &Repository, identity: &Identity, treeish: &str) -> WorkflowResult<String> {
    let mut session = repo.checkout(Some(treeish), identity)?;
    Ok(session.close()?)
}

#[derive(Debug, Serialize)]
pub struct FixDraft {
    pub clean: bool,
    pub documents: Vec<(String, String)>,
}

/// Bring `treeish` up to date with `into` and show every document as the
/// merge left it, conflict markers included.
pub fn prepare_fix(
    repo: &Repository,
    identity: &Identity,
    treeish: &str,
    into: Option<&str>,
) -> WorkflowResult<FixDraft> {
    let session = repo.checkout(Some(treeish), identity)?;
    let clean = session.update(into)?;
    let documents = session
        .list_documents()?
        .into_iter()
        .map(|id| {
            let content = session.read_document(&id)?;
            Ok((id, content))
        })
        .collect::<Result<Vec<_>, GitError>>()?;
    Ok(FixDraft { clean, documents })
}

/// Archive `treeish` and redo its work on a fresh child branch that has
/// merged `into`. Returns the new branch.
pub fn submit_fix(
    repo: &Repository,
    identity: &Identity,
    treeish: &str,
    into: Option<&str>,
    description: &str,
    documents: &[DocumentSubmission],
) -> WorkflowResult<String> {
    let mut session = repo.checkout(Some(treeish), identity)?;
    let original = session.treeish().to_string();
    session.close()?;
    let branch = session.create_branch_under(&original, description, true)?;
    if !session.update(into)? {
        info!(%branch, "fix starts from a conflicted merge; submitted documents resolve it");
    }
    for doc in documents {
        session.write_document(&doc.name, &doc.source)?;
    }
    session.commit(description)?;
    Ok(branch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::{seed, store, tester};

    #[test]
    fn submissions_pair_names_with_sources() {
        let fields = [
            ("description", "Rework"),
            ("a_name", "intro"),
            ("a_source", "hello"),
            ("b_source", "world"),
            ("b_name", "guides/setup"),
        ];
        let docs = parse_submissions(fields).unwrap();
        assert_eq!(
            docs,
            [
                DocumentSubmission {
                    name: "intro".into(),
                    source: "hello".into()
                },
                DocumentSubmission {
                    name: "guides/setup".into(),
                    source: "world".into()
                },
            ]
        );
    }

    #[test]
    fn submission_without_name_is_rejected() {
        let err = parse_submissions([("x_source", "body")]).unwrap_err();
        assert!(matches!(err, WorkflowError::MissingDocumentName(ref f) if f == "x"));
    }

    #[test]
    fn edit_then_review_then_merge() {
        let (_dir, repo) = store();
        seed(&repo, "intro", "hello\n", "init");

        let branch = save_edit(&repo, &tester(), None, "intro", "Add world", "hello world\n").unwrap();
        assert_eq!(branch, "add-world");

        let review = review(&repo, &tester(), Some(&branch)).unwrap();
        assert_eq!(review.parent, "master");
        assert_eq!(review.current.name, "add-world");
        assert!(review.diff["intro"].contains("{+world+}"));
        assert_eq!(review.log.len(), 1);
        assert!(review.clashes.is_empty());

        assert_eq!(merge_branch(&repo, &tester(), &branch, None).unwrap(), "master");
        let session = repo.checkout(None, &tester()).unwrap();
        assert_eq!(session.read_document("intro").unwrap(), "hello world\n");
        assert!(session.list_branches().unwrap().is_empty());
    }

    #[test]
    fn nested_edit_merges_into_its_parent() {
        let (_dir, repo) = store();
        seed(&repo, "intro", "hello\n", "init");
        let parent = save_edit(&repo, &tester(), None, "intro", "First", "one\n").unwrap();
        let child = save_edit(&repo, &tester(), Some(&parent), "intro", "Second", "two\n").unwrap();
        assert_eq!(child, "first--second");

        assert_eq!(merge_branch(&repo, &tester(), &child, None).unwrap(), "first");
        let session = repo.checkout(Some(&parent), &tester()).unwrap();
        assert_eq!(session.read_document("intro").unwrap(), "two\n");
    }

    #[test]
    fn fix_reopens_a_branch_against_newer_master() {
        let (_dir, repo) = store();
        seed(&repo, "intro", "hello\n", "init");
        let branch = save_edit(&repo, &tester(), None, "intro", "Branch edit", "from branch\n").unwrap();
        seed(&repo, "intro", "from master\n", "master edit");

        let draft = prepare_fix(&repo, &tester(), &branch, None).unwrap();
        assert!(!draft.clean);
        let (_, intro) = draft.documents.iter().find(|(id, _)| id == "intro").unwrap();
        assert!(intro.contains("<<<<<<<"));

        let docs = [DocumentSubmission {
            name: "intro".into(),
            source: "from both\n".into(),
        }];
        let fixed = submit_fix(&repo, &tester(), &branch, None, "Resolve", &docs).unwrap();
        assert_eq!(fixed, "branch-edit--resolve");

        let session = repo.checkout(Some(&fixed), &tester()).unwrap();
        assert_eq!(session.read_document("intro").unwrap(), "from both\n");
        // the fix carries master's history, so it no longer clashes
        assert!(session.clashing_files(Some(MASTER)).unwrap().is_empty());
        drop(session);

        let master = repo.checkout(None, &tester()).unwrap();
        let forest = master.list_branches().unwrap();
        let names: Vec<_> = forest.iter().map(|n| n.treeish.as_str()).collect();
        assert!(names.contains(&"closed"));
        assert!(names.contains(&"branch-edit"));
        let reopened = forest.iter().find(|n| n.treeish == "branch-edit").unwrap();
        assert_eq!(reopened.children[0].treeish, "branch-edit--resolve");
    }

    #[test]
    fn close_branch_returns_archived_name() {
        let (_dir, repo) = store();
        seed(&repo, "intro", "hello\n", "init");
        let branch = save_edit(&repo, &tester(), None, "intro", "Fix Typo", "hallo\n").unwrap();
        assert_eq!(close_branch(&repo, &tester(), &branch).unwrap(), "closed--fix-typo");
        assert!(close_branch(&repo, &tester(), MASTER).is_err());
    }
}
