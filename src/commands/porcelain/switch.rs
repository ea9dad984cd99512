use crate::areas::refs::RefTarget;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::commands::porcelain::checkout::CheckoutOutcome;
use crate::errors::RepositoryError;

impl Repository {
    /// Check out a branch, creating it at HEAD first when `create` is set
    ///
    /// Unlike `checkout`, only branch names are accepted, so HEAD always ends
    /// up attached.
    pub async fn switch(&self, name: &str, create: bool) -> anyhow::Result<CheckoutOutcome> {
        let branch = BranchName::try_parse(name.to_string())?;

        if create {
            if self.refs().read_head()?.is_none() {
                return self.switch_unborn(branch);
            }
            self.create_branch(name, None)?;
        } else if self.local_branch(name)?.is_none() {
            return Err(RepositoryError::ReferenceNotFound {
                name: SymRefName::branch(&branch).to_string(),
            }
            .into());
        }

        self.checkout(name, false).await
    }

    /// Nothing to check out yet, so only HEAD moves
    fn switch_unborn(&self, branch: BranchName) -> anyhow::Result<CheckoutOutcome> {
        let previous_ref = self.refs().current_ref()?;
        let new_ref = SymRefName::branch(&branch);

        if self.local_branch(branch.as_ref())?.is_some() {
            return Err(RepositoryError::ReferenceExists {
                name: branch.to_string(),
            }
            .into());
        }
        self.refs().set_head(&RefTarget::Symbolic(new_ref.clone()))?;
        tracing::info!(branch = %branch, "switched to unborn branch");

        Ok(CheckoutOutcome {
            target: branch.to_string(),
            previous_ref,
            previous_oid: None,
            new_ref,
            oid: None,
            short_message: None,
        })
    }
}
