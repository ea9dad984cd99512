use crate::areas::refs::HEAD_REF_NAME;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object_id::ObjectId;

/// One line of `branch` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchListing {
    pub name: SymRefName,
    pub is_current: bool,
}

impl Repository {
    /// Local branches in name order, the checked-out one flagged
    pub fn branches(&self) -> anyhow::Result<Vec<BranchListing>> {
        let current = self.refs().current_ref()?;

        Ok(self
            .refs()
            .list_branches()?
            .into_iter()
            .map(|name| BranchListing {
                is_current: name == current,
                name,
            })
            .collect())
    }

    /// Create a branch at `start`, HEAD when not given
    pub fn create_branch(&self, name: &str, start: Option<&str>) -> anyhow::Result<ObjectId> {
        let branch_name = BranchName::try_parse(name.to_string())?;
        let start_oid = Revision::try_parse(start.unwrap_or(HEAD_REF_NAME))?.resolve(self)?;

        self.refs().create_branch(&branch_name, start_oid.clone())?;
        tracing::info!(branch = %branch_name, oid = %start_oid, "branch created");

        Ok(start_oid)
    }

    /// Delete a branch that is not checked out, returning where it pointed
    pub fn delete_branch(&self, name: &str) -> anyhow::Result<ObjectId> {
        let branch_name = BranchName::try_parse(name.to_string())?;
        let oid = self.refs().delete_branch(&branch_name)?;
        tracing::info!(branch = %branch_name, oid = %oid, "branch deleted");

        Ok(oid)
    }
}
