use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::RepositoryError;
use std::path::PathBuf;

impl Repository {
    /// Entries of a tree, named directly or through a commit revision
    ///
    /// Without `recursive` subtrees are listed as entries; with it only the
    /// files below them are.
    pub fn ls_tree(
        &self,
        target: &str,
        recursive: bool,
    ) -> anyhow::Result<Vec<(PathBuf, DatabaseEntry)>> {
        let tree_oid = self.resolve_tree(target)?;

        if recursive {
            return Ok(self.database().flatten_tree(&tree_oid)?.into_iter().collect());
        }

        Ok(self
            .database()
            .parse_object_as_tree(&tree_oid)?
            .into_entries()
            .map(|(name, entry)| (PathBuf::from(name), entry))
            .collect())
    }

    fn resolve_tree(&self, target: &str) -> anyhow::Result<ObjectId> {
        match Revision::try_parse(target)?.resolve(self) {
            Ok(commit_oid) => Ok(self
                .database()
                .parse_object_as_commit(&commit_oid)?
                .tree_oid()
                .clone()),
            Err(error) => match RepositoryError::of(&error) {
                Some(RepositoryError::UnexpectedObjectType {
                    oid,
                    found: ObjectType::Tree,
                    ..
                }) => Ok(oid.clone()),
                _ => Err(error),
            },
        }
    }
}
