use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "mdreview",
    version,
    about = "Review-oriented editing of markdown documents stored in git"
)]
pub struct Cli {
    /// Document store (defaults to `repo` in the config file, then the current directory)
    #[arg(long, global = true, env = "MDREVIEW_REPO")]
    pub repo: Option<PathBuf>,

    /// Author name for commits made by this command
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Author email for commits made by this command
    #[arg(long, global = true)]
    pub email: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a document store with an empty master branch
    Init,

    /// List the documents on a branch
    Ls {
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Print a document
    Cat {
        document: String,
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Commit new content for a document on a fresh branch
    Edit {
        document: String,
        /// What the edit does; also names the branch
        #[arg(short, long)]
        message: String,
        /// Branch to start from
        #[arg(short, long)]
        branch: Option<String>,
        /// Read the content from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Word diff of a branch against its parent
    Diff { branch: String },

    /// Commits a branch adds over master
    Log { branch: String },

    /// Open branches as a tree
    Branches {
        /// Only show children of this branch
        #[arg(short, long)]
        under: Option<String>,
    },

    /// Everything needed to review a branch
    Status { branch: Option<String> },

    /// Merge a branch into its parent (or `--into`)
    Merge {
        branch: String,
        #[arg(long)]
        into: Option<String>,
    },

    /// Archive a branch without merging it
    Close { branch: String },

    /// Redo a branch on top of its latest base
    Fix {
        branch: String,
        #[arg(long)]
        into: Option<String>,
        /// Description of the fix; without it the merged documents are printed
        #[arg(short, long)]
        message: Option<String>,
        /// Submitted form fields, `<doc>_name=...` and `<doc>_source=...`;
        /// a value starting with `@` is read from that file
        #[arg(long = "field", value_name = "NAME=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Show or remember the commit identity
    Whoami {
        /// Save `--name`/`--email` to the config file
        #[arg(long)]
        save: bool,
    },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty field name in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
