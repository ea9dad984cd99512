use crate::areas::database::FlatTree;
use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::status::file_change::{
    FileChange, FileChangeType, IndexChangeType, WorkspaceChangeType,
};
use crate::artifacts::status::inspector::Inspector;
use derive_new::new;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub type FileStatSet = BTreeMap<PathBuf, EntryMetadata>;
pub type ChangeSet = BTreeMap<PathBuf, FileChangeType>;
pub type FileSet = BTreeSet<PathBuf>;

/// Three-way comparison of HEAD, the index and the working tree
///
/// Paths with no change on either side are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusInfo {
    pub(crate) untracked_files: FileSet,
    pub(crate) changed_files: BTreeMap<PathBuf, FileChange>,
}

impl StatusInfo {
    pub fn untracked_files(&self) -> &FileSet {
        &self.untracked_files
    }

    pub fn changed_files(&self) -> &BTreeMap<PathBuf, FileChange> {
        &self.changed_files
    }

    pub fn change(&self, path: impl Into<PathBuf>) -> Option<FileChange> {
        self.changed_files.get(&path.into()).copied()
    }

    /// Changes staged in the index relative to HEAD
    pub fn index_changeset(&self) -> ChangeSet {
        self.changed_files
            .iter()
            .filter(|(_, change)| change.index_change != IndexChangeType::None)
            .map(|(path, change)| (path.clone(), FileChangeType::Index(change.index_change)))
            .collect()
    }

    /// Changes in the working tree not yet staged
    pub fn workspace_changeset(&self) -> ChangeSet {
        self.changed_files
            .iter()
            .filter(|(_, change)| change.workspace_change != WorkspaceChangeType::None)
            .map(|(path, change)| {
                (
                    path.clone(),
                    FileChangeType::Workspace(change.workspace_change),
                )
            })
            .collect()
    }

    /// No staged or unstaged changes; untracked files do not count
    pub fn is_clean(&self) -> bool {
        self.changed_files.is_empty()
    }

    /// `XY path` lines for tracked changes, then `?? path` for untracked files
    pub fn porcelain_lines(&self) -> Vec<String> {
        self.changed_files
            .iter()
            .map(|(path, change)| format!("{change} {}", path.display()))
            .chain(
                self.untracked_files
                    .iter()
                    .map(|path| format!("?? {}", path.display())),
            )
            .collect()
    }
}

#[derive(new)]
pub struct Status<'r> {
    repository: &'r Repository,
}

impl<'r> Status<'r> {
    /// Compute the status against an already loaded index
    pub fn initialize(&self, index: &Index) -> anyhow::Result<StatusInfo> {
        let inspector = Inspector::new(self.repository);

        let mut untracked_files = FileSet::new();
        let file_stats = self.scan_workspace(index, &mut untracked_files)?;
        let head_tree = self.load_head_tree()?;

        let mut changed_files = BTreeMap::new();
        self.check_index_entries(&file_stats, &head_tree, index, &inspector, &mut changed_files)?;
        self.collect_deleted_head_files(&head_tree, index, &mut changed_files);

        Ok(StatusInfo {
            untracked_files,
            changed_files,
        })
    }

    fn scan_workspace(
        &self,
        index: &Index,
        untracked_files: &mut FileSet,
    ) -> anyhow::Result<FileStatSet> {
        let mut file_stats = FileStatSet::new();

        for path in self.repository.workspace().list_files(None)? {
            if index.entry_by_path(&path).is_some() {
                let stat = self.repository.workspace().stat_file(&path)?;
                file_stats.insert(path, stat);
            } else {
                untracked_files.insert(path);
            }
        }

        Ok(file_stats)
    }

    fn load_head_tree(&self) -> anyhow::Result<FlatTree> {
        match self.repository.refs().read_head()? {
            Some(head_oid) => self.repository.database().flatten_commit_tree(&head_oid),
            None => Ok(FlatTree::new()),
        }
    }

    fn check_index_entries(
        &self,
        file_stats: &FileStatSet,
        head_tree: &FlatTree,
        index: &Index,
        inspector: &Inspector<'_>,
        changed_files: &mut BTreeMap<PathBuf, FileChange>,
    ) -> anyhow::Result<()> {
        for entry in index.entries() {
            let workspace_change =
                inspector.check_index_against_workspace(Some(entry), file_stats.get(&entry.name))?;
            let index_change =
                inspector.check_index_against_head_tree(Some(entry), head_tree.get(&entry.name));

            let change = FileChange::new(index_change, workspace_change);
            if !change.is_unmodified() {
                changed_files.insert(entry.name.clone(), change);
            }
        }

        Ok(())
    }

    fn collect_deleted_head_files(
        &self,
        head_tree: &FlatTree,
        index: &Index,
        changed_files: &mut BTreeMap<PathBuf, FileChange>,
    ) {
        for path in head_tree.keys() {
            if index.entry_by_path(path).is_none() {
                changed_files.entry(path.clone()).or_default().index_change =
                    IndexChangeType::Deleted;
            }
        }
    }
}
