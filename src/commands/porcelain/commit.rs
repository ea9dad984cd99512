use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeBuilder};
use crate::errors::RepositoryError;
use std::fmt;

/// What a successful commit produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub oid: ObjectId,
    /// Branch that moved, `None` on a detached HEAD
    pub branch: Option<BranchName>,
    pub is_root: bool,
    pub short_message: String,
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let branch = match &self.branch {
            Some(branch) => branch.to_string(),
            None => String::from("detached HEAD"),
        };
        let root = if self.is_root { " (root-commit)" } else { "" };

        write!(
            f,
            "[{branch}{root} {}] {}",
            self.oid.to_short_oid(),
            self.short_message
        )
    }
}

impl Repository {
    /// Record the index as a new commit on top of HEAD
    pub async fn commit(&self, message: &str, allow_empty: bool) -> anyhow::Result<CommitOutcome> {
        let message = message.trim();
        if message.is_empty() {
            anyhow::bail!("aborting commit due to empty commit message");
        }

        let index = self.index();
        let mut index = index.lock().await;

        index.rehydrate()?;

        let tree_oid = TreeBuilder::build(index.entries())?
            .write_with(&mut |tree: &Tree| self.database().store(tree))?;
        let parent = self.refs().read_head()?;

        if !allow_empty {
            let unchanged = match &parent {
                Some(parent) => {
                    self.database().parse_object_as_commit(parent)?.tree_oid() == &tree_oid
                }
                None => index.is_empty(),
            };
            if unchanged {
                return Err(RepositoryError::EmptyCommit { tree: tree_oid }.into());
            }
        }

        let author = Author::load_from_env()?;
        let committer = Author::load_committer_from_env(&author)?;

        let commit = Commit::new(
            parent.iter().cloned().collect(),
            tree_oid,
            author,
            committer,
            message.to_string(),
        );
        let commit_oid = self.database().store(&commit)?;
        self.refs().update_head(commit_oid.clone())?;

        tracing::info!(commit = %commit_oid, tree = %commit.tree_oid(), "commit created");

        Ok(CommitOutcome {
            oid: commit_oid,
            branch: self.refs().current_branch()?,
            is_root: parent.is_none(),
            short_message: commit.short_message(),
        })
    }
}
