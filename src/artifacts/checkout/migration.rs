//! Checkout migration and conflict detection
//!
//! Checking out a commit:
//!
//! 1. Diffs the target tree against the current index
//! 2. Detects conflicts with local changes on every path the diff touches
//! 3. Deletes, then writes, files in the working tree
//! 4. Rewrites the touched index entries with fresh stat data
//!
//! ## Conflict Detection
//!
//! - Stale files: unstaged modification the target does not already have
//! - Staged changes: index differs from both HEAD and the target
//! - Stale directories: a directory with untracked files where the target has a file
//! - Untracked overwrites: an untracked file, or untracked parent file, in the way
//!
//! ## Safety
//!
//! Every conflict is collected before the first write. Saving the index and
//! moving HEAD are left to the caller, after the working tree is updated.

use crate::areas::database::FlatTree;
use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::checkout::conflict::ConflictType;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{TreeChangeType, TreeDiff};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::inspector::Inspector;
use crate::errors::RepositoryError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Type of file system action required for checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Create new file
    Add,
    /// Delete file
    Delete,
    /// Modify existing file
    Modify,
}

/// Set of planned actions grouped by type
pub type ActionsSet = HashMap<ActionType, Vec<(PathBuf, Option<DatabaseEntry>)>>;

/// Set of detected conflicts grouped by type
pub type ConflictsSet = BTreeMap<ConflictType, BTreeSet<PathBuf>>;

/// Checkout migration planner and executor
pub struct Migration<'r> {
    repository: &'r Repository,
    /// Index to update
    index: &'r mut Index,
    /// Inspector for detecting local changes
    inspector: Inspector<'r>,
    /// Flattened tree of the commit HEAD points to before the checkout
    head_tree: FlatTree,
    /// Diff between the index and the target tree
    tree_diff: TreeDiff,
    /// Planned file system actions
    actions: ActionsSet,
    /// Detected conflicts
    conflicts: ConflictsSet,
}

impl<'r> Migration<'r> {
    pub fn new(
        repository: &'r Repository,
        index: &'r mut Index,
        head_tree: FlatTree,
        target_tree: &FlatTree,
    ) -> Self {
        let tree_diff = TreeDiff::compare(&index.flat_tree(), target_tree);
        let actions = HashMap::from([
            (ActionType::Add, Vec::new()),
            (ActionType::Delete, Vec::new()),
            (ActionType::Modify, Vec::new()),
        ]);

        Self {
            repository,
            index,
            inspector: Inspector::new(repository),
            head_tree,
            tree_diff,
            actions,
            conflicts: ConflictsSet::new(),
        }
    }

    pub fn actions(&self) -> &ActionsSet {
        &self.actions
    }

    pub fn conflicts(&self) -> &ConflictsSet {
        &self.conflicts
    }

    pub fn tree_diff(&self) -> &TreeDiff {
        &self.tree_diff
    }

    /// Plan, then update the working tree and the in-memory index
    ///
    /// With `force` no conflict detection takes place.
    pub fn apply_changes(&mut self, force: bool) -> anyhow::Result<()> {
        self.plan_changes(force)?;
        self.update_workspace()?;
        self.update_index()?;

        Ok(())
    }

    /// Record actions for every change, failing with `CheckoutConflict` if
    /// any of them would lose local work
    pub fn plan_changes(&mut self, force: bool) -> anyhow::Result<()> {
        let changes = self
            .tree_diff
            .changes()
            .iter()
            .map(|(path, change)| (path.clone(), change.clone()))
            .collect::<Vec<_>>();

        for (path, change) in &changes {
            if !force && let Some((conflict_type, conflict_path)) = self.detect_conflict(path, change)? {
                tracing::warn!(path = %conflict_path.display(), "checkout conflict: {conflict_type}");
                self.conflicts
                    .entry(conflict_type)
                    .or_default()
                    .insert(conflict_path);
            }
            self.record_change(path, change);
        }

        if !self.conflicts.is_empty() {
            let paths = self
                .conflicts
                .values()
                .flatten()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            return Err(RepositoryError::CheckoutConflict { paths }.into());
        }

        Ok(())
    }

    fn detect_conflict(
        &self,
        path: &Path,
        change: &TreeChangeType,
    ) -> anyhow::Result<Option<(ConflictType, PathBuf)>> {
        let entry = self.index.entry_by_path(path);
        let new_entry = change.new_entry();

        if self.index_differs_from_trees(entry, self.head_tree.get(path), new_entry) {
            return Ok(Some((ConflictType::StagedChange, path.to_path_buf())));
        }

        if new_entry.is_some()
            && let Some(parent) = self.untracked_parent(path)?
        {
            return Ok(Some((ConflictType::UntrackedOverwritten, parent)));
        }

        // nothing on disk means nothing to lose
        if !self.repository.workspace().exists(path) {
            return Ok(None);
        }
        let stat = self.repository.workspace().stat_file(path)?;

        if stat.mode.is_tree() {
            let has_untracked =
                new_entry.is_some() && self.inspector.has_untracked_files(path, self.index)?;
            return Ok(has_untracked.then(|| (ConflictType::StaleDirectory, path.to_path_buf())));
        }

        let already_target = match new_entry {
            Some(new_entry) => self.inspector.workspace_matches(path, &stat, new_entry)?,
            None => false,
        };

        match entry {
            Some(entry) => {
                let workspace_change =
                    self.inspector.check_index_against_workspace(Some(entry), Some(&stat))?;

                if workspace_change == WorkspaceChangeType::None || already_target {
                    Ok(None)
                } else {
                    Ok(Some((ConflictType::StaleFile, path.to_path_buf())))
                }
            }
            None if new_entry.is_some() && !already_target => {
                Ok(Some((ConflictType::UntrackedOverwritten, path.to_path_buf())))
            }
            None => Ok(None),
        }
    }

    /// A staged change is lost when the target carries neither HEAD's
    /// version nor the staged one
    fn index_differs_from_trees(
        &self,
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&DatabaseEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> bool {
        self.inspector.check_index_against_head_tree(index_entry, head_entry)
            != IndexChangeType::None
            && self.inspector.check_index_against_head_tree(index_entry, new_entry)
                != IndexChangeType::None
    }

    /// Closest ancestor of `path` that is an untracked file on disk
    fn untracked_parent(&self, path: &Path) -> anyhow::Result<Option<PathBuf>> {
        let workspace = self.repository.workspace();

        for parent in path.ancestors().skip(1) {
            if parent.as_os_str().is_empty() || !workspace.exists(parent) {
                continue;
            }

            if !workspace.stat_file(parent)?.mode.is_tree() && self.index.entry_by_path(parent).is_none() {
                return Ok(Some(parent.to_path_buf()));
            }
        }

        Ok(None)
    }

    fn record_change(&mut self, path: &Path, change: &TreeChangeType) {
        let (action_type, entry) = match change {
            TreeChangeType::Added(new_entry) => (ActionType::Add, Some(new_entry.clone())),
            TreeChangeType::Deleted(_) => (ActionType::Delete, None),
            TreeChangeType::Modified { new, .. } => (ActionType::Modify, Some(new.clone())),
        };

        self.actions
            .entry(action_type)
            .or_default()
            .push((path.to_path_buf(), entry));
    }

    fn planned(&self, action_type: ActionType) -> &[(PathBuf, Option<DatabaseEntry>)] {
        self.actions.get(&action_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Deletions first, so files replacing emptied directories can be written
    fn update_workspace(&self) -> anyhow::Result<()> {
        let workspace = self.repository.workspace();

        for (path, _) in self.planned(ActionType::Delete) {
            workspace.remove_file(path)?;
        }

        for action_type in [ActionType::Modify, ActionType::Add] {
            for (path, entry) in self.planned(action_type) {
                let Some(entry) = entry else {
                    anyhow::bail!("entry must be provided for {action_type:?} of {}", path.display());
                };

                let blob = self.repository.database().parse_object_as_blob(&entry.oid)?;
                workspace.write_file(path, blob.content(), entry.mode)?;
                tracing::debug!(path = %path.display(), oid = %entry.oid, "checked out file");
            }
        }

        Ok(())
    }

    fn update_index(&mut self) -> anyhow::Result<()> {
        let deletions = self.planned(ActionType::Delete).to_vec();
        for (path, _) in deletions {
            self.index.remove(&path);
        }

        let writes = [ActionType::Modify, ActionType::Add]
            .into_iter()
            .flat_map(|action_type| self.planned(action_type).to_vec())
            .collect::<Vec<_>>();
        for (path, entry) in writes {
            let Some(entry) = entry else {
                continue;
            };

            let stat = self.repository.workspace().stat_file(&path)?;
            self.index.add(IndexEntry::new(path, entry.oid, stat))?;
        }

        Ok(())
    }
}
