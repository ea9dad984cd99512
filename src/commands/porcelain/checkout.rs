use crate::areas::database::FlatTree;
use crate::areas::refs::RefTarget;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::objects::object_id::ObjectId;

const DETACHMENT_NOTICE: &str = r#"
You are in 'detached HEAD' state. You can look around, make experimental
changes and commit them, and you can discard any commits you make in this
state without impacting any branches by performing another checkout.

If you want to create a new branch to retain commits you create, you may
do so (now or later) by using the branch command. Example:

    gitpie branch <new-branch-name>
"#;

/// Where HEAD was and where a checkout left it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub target: String,
    pub previous_ref: SymRefName,
    pub previous_oid: Option<ObjectId>,
    /// The branch HEAD is attached to, or `HEAD` when detached
    pub new_ref: SymRefName,
    pub oid: Option<ObjectId>,
    /// First line of the message of the commit now checked out
    pub short_message: Option<String>,
}

impl CheckoutOutcome {
    /// Messages to print on stderr, in order
    pub fn report(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if self.previous_ref.is_detached_head()
            && let Some(previous_oid) = &self.previous_oid
            && self.oid.as_ref() != Some(previous_oid)
        {
            lines.push(format!("Previous HEAD position was {}", previous_oid.to_short_oid()));
        }

        if !self.previous_ref.is_detached_head() && self.new_ref.is_detached_head() {
            lines.push(format!("Note: checking out '{}'.\n{}", self.target, DETACHMENT_NOTICE));
        }

        if self.new_ref.is_detached_head() {
            if let Some(oid) = &self.oid {
                lines.push(format!(
                    "HEAD is now at {} {}",
                    oid.to_short_oid(),
                    self.short_message.as_deref().unwrap_or_default()
                ));
            }
        } else if self.new_ref == self.previous_ref {
            lines.push(format!("Already on '{}'", self.new_ref.short_name()));
        } else {
            lines.push(format!("Switched to branch '{}'", self.new_ref.short_name()));
        }

        lines
    }
}

impl Repository {
    /// Make the working tree, index and HEAD match the commit `target` names
    ///
    /// A branch name attaches HEAD to that branch; any other revision detaches
    /// it. With `force` local changes in the way are overwritten.
    pub async fn checkout(&self, target: &str, force: bool) -> anyhow::Result<CheckoutOutcome> {
        let previous_ref = self.refs().current_ref()?;
        let previous_oid = self.refs().read_head()?;

        let target_oid = Revision::try_parse(target)?.resolve(self)?;
        let short_message = self.database().parse_object_as_commit(&target_oid)?.short_message();
        let target_tree = self.database().flatten_commit_tree(&target_oid)?;
        let head_tree = match &previous_oid {
            Some(oid) => self.database().flatten_commit_tree(oid)?,
            None => FlatTree::new(),
        };

        let index = self.index();
        let mut index = index.lock().await;

        index.rehydrate()?;

        Migration::new(self, &mut index, head_tree, &target_tree).apply_changes(force)?;

        index.write_updates()?;

        let new_ref = match self.local_branch(target)? {
            Some(branch) => SymRefName::branch(&branch),
            None => SymRefName::head(),
        };
        let head_target = if new_ref.is_detached_head() {
            RefTarget::Direct(target_oid.clone())
        } else {
            RefTarget::Symbolic(new_ref.clone())
        };
        self.refs().set_head(&head_target)?;

        tracing::info!(target, oid = %target_oid, head = %head_target, "checked out");

        Ok(CheckoutOutcome {
            target: target.to_string(),
            previous_ref,
            previous_oid,
            new_ref,
            oid: Some(target_oid),
            short_message: Some(short_message),
        })
    }

    /// The branch `name` refers to, if a branch by that name exists
    pub(crate) fn local_branch(&self, name: &str) -> anyhow::Result<Option<BranchName>> {
        let Ok(branch) = BranchName::try_parse(name.to_string()) else {
            return Ok(None);
        };

        Ok(self
            .refs()
            .read(&SymRefName::branch(&branch))?
            .map(|_| branch))
    }
}
