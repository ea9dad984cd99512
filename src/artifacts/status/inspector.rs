use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use derive_new::new;
use std::path::Path;

/// Pairwise comparisons between the working tree, the index and a tree
#[derive(new)]
pub struct Inspector<'r> {
    repository: &'r Repository,
}

impl<'r> Inspector<'r> {
    /// Hash of the working copy at `path`, as a blob
    pub fn hash_file(&self, path: &Path) -> anyhow::Result<ObjectId> {
        let data = self.repository.workspace().read_file(path)?;
        Blob::new(data).object_id()
    }

    fn is_content_changed(&self, index_entry: &IndexEntry) -> anyhow::Result<bool> {
        Ok(self.hash_file(&index_entry.name)? != index_entry.oid)
    }

    /// Size or mode differing means modified; equal size, mode and times
    /// means unchanged; anything else is settled by hashing the content.
    pub fn check_index_against_workspace(
        &self,
        entry: Option<&IndexEntry>,
        stat: Option<&EntryMetadata>,
    ) -> anyhow::Result<WorkspaceChangeType> {
        match (entry, stat) {
            (None, _) => Ok(WorkspaceChangeType::Untracked),
            (Some(_), None) => Ok(WorkspaceChangeType::Deleted),
            (Some(entry), Some(stat)) if !entry.stat_match(stat) => {
                Ok(WorkspaceChangeType::Modified)
            }
            (Some(entry), Some(stat)) if entry.times_match(stat) => Ok(WorkspaceChangeType::None),
            (Some(entry), Some(_)) if self.is_content_changed(entry)? => {
                Ok(WorkspaceChangeType::Modified)
            }
            _ => Ok(WorkspaceChangeType::None),
        }
    }

    pub fn check_index_against_head_tree(
        &self,
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&DatabaseEntry>,
    ) -> IndexChangeType {
        match (index_entry, head_entry) {
            (Some(index_entry), Some(head_entry))
                if head_entry.mode != index_entry.metadata.mode
                    || head_entry.oid != index_entry.oid =>
            {
                IndexChangeType::Modified
            }
            (Some(_), None) => IndexChangeType::Added,
            (None, Some(_)) => IndexChangeType::Deleted,
            _ => IndexChangeType::None,
        }
    }

    /// Whether the working copy at `path` already is `entry`
    pub fn workspace_matches(
        &self,
        path: &Path,
        stat: &EntryMetadata,
        entry: &DatabaseEntry,
    ) -> anyhow::Result<bool> {
        Ok(stat.mode == entry.mode && self.hash_file(path)? == entry.oid)
    }

    /// Whether a working directory holds any file the index does not track
    pub fn has_untracked_files(&self, dir_path: &Path, index: &Index) -> anyhow::Result<bool> {
        Ok(self
            .repository
            .workspace()
            .list_files(Some(dir_path))?
            .iter()
            .any(|path| index.entry_by_path(path).is_none()))
    }
}
