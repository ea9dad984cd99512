use crate::areas::refs::HEAD_REF_NAME;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object_id::ObjectId;

impl Repository {
    pub fn tags(&self) -> anyhow::Result<Vec<SymRefName>> {
        self.refs().list_tags()
    }

    /// Create a lightweight tag on the commit `target` names, HEAD by default
    pub fn create_tag(&self, name: &str, target: Option<&str>) -> anyhow::Result<ObjectId> {
        let tag_name = BranchName::try_parse(name.to_string())?;
        let oid = Revision::try_parse(target.unwrap_or(HEAD_REF_NAME))?.resolve(self)?;

        self.refs().create_tag(&tag_name, oid.clone())?;
        tracing::info!(tag = %tag_name, oid = %oid, "tag created");

        Ok(oid)
    }
}
