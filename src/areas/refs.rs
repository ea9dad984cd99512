//! References (branches, HEAD, tags)
//!
//! References are human-readable names pointing to commits. They can be:
//! - Direct: containing a commit hash
//! - Symbolic: pointing to another reference (e.g., HEAD -> refs/heads/master)
//!
//! ## File Format
//!
//! References are stored as text files containing either:
//! - A 40-character hex hash followed by a newline (direct reference)
//! - `ref: <name>` followed by a newline for symbolic references
//!
//! A branch file that is missing or empty is unborn: HEAD of a fresh
//! repository points at one.

use crate::areas::database::Database;
use crate::areas::lockfile;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::branch::{HEADS_PREFIX, TAGS_PREFIX};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use anyhow::Context;
use derive_new::new;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use walkdir::WalkDir;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// Content of a reference file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    Direct(ObjectId),
    Symbolic(SymRefName),
}

impl RefTarget {
    fn parse(content: &str) -> anyhow::Result<Option<RefTarget>> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref_match) = symref_match {
            Ok(Some(RefTarget::Symbolic(SymRefName::new(
                symref_match[1].to_string(),
            ))))
        } else {
            Ok(Some(RefTarget::Direct(ObjectId::try_parse(
                content.to_string(),
            )?)))
        }
    }
}

impl std::fmt::Display for RefTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefTarget::Direct(oid) => write!(f, "{oid}"),
            RefTarget::Symbolic(name) => write!(f, "ref: {name}"),
        }
    }
}

/// References manager rooted at the repository directory
#[derive(Debug, new)]
pub struct Refs {
    /// Path to the repository directory (typically `.gitpie`)
    path: Box<Path>,
}

impl Refs {
    /// Read a reference file without following it
    ///
    /// Missing and empty files both read as `None`.
    pub fn read(&self, name: &SymRefName) -> anyhow::Result<Option<RefTarget>> {
        let path = self.path.join(name.as_ref_path());
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("unable to read ref file {}", path.display()))?;

        RefTarget::parse(&content).with_context(|| format!("malformed reference {name}"))
    }

    /// Full reference name for a user-supplied one
    ///
    /// Looked up as given, then under `refs/`, `refs/heads/` and `refs/tags/`.
    /// A name is only taken as given when it is a full `refs/...` name or an
    /// upper-case top-level name like `HEAD`, so the repository's own files
    /// (`index`, `objects`) never shadow a branch or tag.
    pub fn expand(&self, name: &str) -> Option<SymRefName> {
        let as_given = name.starts_with("refs/")
            || (!name.is_empty() && name.bytes().all(|b| b.is_ascii_uppercase() || b == b'_'));

        [
            as_given.then(|| name.to_string()),
            Some(format!("refs/{name}")),
            Some(format!("{HEADS_PREFIX}{name}")),
            Some(format!("{TAGS_PREFIX}{name}")),
        ]
        .into_iter()
        .flatten()
        .map(SymRefName::new)
        .find(|candidate| self.path.join(candidate.as_ref_path()).is_file())
    }

    /// Follow a reference to the commit hash it ultimately names
    pub fn resolve(&self, name: &str, database: &Database) -> anyhow::Result<ObjectId> {
        let start = self
            .expand(name)
            .ok_or_else(|| RepositoryError::ReferenceNotFound {
                name: name.to_string(),
            })?;

        let oid = match self.follow(&start)? {
            (_, Some(oid)) => oid,
            (last, None) => {
                return Err(RepositoryError::UnbornReference {
                    name: name.to_string(),
                    target: last.to_string(),
                }
                .into());
            }
        };

        if !database.exists(&oid) {
            return Err(RepositoryError::DanglingReference {
                name: name.to_string(),
                oid,
            }
            .into());
        }

        Ok(oid)
    }

    /// Walk a symbolic chain to its last reference and the hash stored there
    fn follow(&self, start: &SymRefName) -> anyhow::Result<(SymRefName, Option<ObjectId>)> {
        let mut visited = HashSet::new();
        let mut current = start.clone();

        loop {
            if !visited.insert(current.clone()) {
                return Err(RepositoryError::ReferenceCycle {
                    name: start.to_string(),
                }
                .into());
            }

            match self.read(&current)? {
                Some(RefTarget::Symbolic(next)) => current = next,
                Some(RefTarget::Direct(oid)) => return Ok((current, Some(oid))),
                None => return Ok((current, None)),
            }
        }
    }

    /// Commit HEAD points to, `None` while the current branch is unborn
    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        Ok(self.follow(&SymRefName::head())?.1)
    }

    /// Last reference in HEAD's chain: a branch, or `HEAD` itself when detached
    pub fn current_ref(&self) -> anyhow::Result<SymRefName> {
        Ok(self.follow(&SymRefName::head())?.0)
    }

    pub fn current_branch(&self) -> anyhow::Result<Option<BranchName>> {
        Ok(self.current_ref()?.branch_name())
    }

    pub fn is_current_branch(&self, branch_name: &BranchName) -> anyhow::Result<bool> {
        Ok(self.current_branch()?.as_ref() == Some(branch_name))
    }

    /// Replace a reference file atomically
    pub fn set(&self, name: &SymRefName, target: &RefTarget) -> anyhow::Result<()> {
        let path = self.path.join(name.as_ref_path());

        lockfile::write_atomically(&path, |file| {
            writeln!(file, "{target}")
                .with_context(|| format!("unable to write reference {name}"))
        })?;
        tracing::debug!(reference = %name, target = %target, "reference updated");

        Ok(())
    }

    /// Point HEAD at a new commit, moving the branch it is attached to
    pub fn update_head(&self, oid: ObjectId) -> anyhow::Result<()> {
        let (last, _) = self.follow(&SymRefName::head())?;
        self.set(&last, &RefTarget::Direct(oid))
    }

    /// Attach HEAD to a branch or detach it at a commit
    pub fn set_head(&self, target: &RefTarget) -> anyhow::Result<()> {
        self.set(&SymRefName::head(), target)
    }

    /// Remove a reference file and the directories it leaves empty
    pub fn delete(&self, name: &SymRefName) -> anyhow::Result<()> {
        let path = self.path.join(name.as_ref_path());
        if !path.is_file() {
            return Err(RepositoryError::ReferenceNotFound {
                name: name.to_string(),
            }
            .into());
        }

        std::fs::remove_file(&path)
            .with_context(|| format!("unable to delete ref file {}", path.display()))?;
        self.prune_empty_parent_dirs(&path)?;
        tracing::debug!(reference = %name, "reference deleted");

        Ok(())
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let refs_path = self.refs_path();
        let stop_at = [
            refs_path.clone(),
            refs_path.join("heads").into_boxed_path(),
            refs_path.join("tags").into_boxed_path(),
        ];

        if let Some(parent) = path.parent()
            && parent.starts_with(&refs_path)
            && !stop_at.iter().any(|stop| stop.as_ref() == parent)
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent).with_context(|| {
                format!("unable to remove empty ref directory {}", parent.display())
            })?;
            self.prune_empty_parent_dirs(parent)?;
        }

        Ok(())
    }

    /// Every reference whose full name starts with `prefix`, sorted
    pub fn list(&self, prefix: &str) -> anyhow::Result<Vec<SymRefName>> {
        let base = self.path.join(prefix.trim_end_matches('/'));
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = WalkDir::new(&base)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().is_none_or(|ext| ext != "lock"))
            .filter_map(|entry| {
                let relative_path = entry.path().strip_prefix(self.path.as_ref()).ok()?;
                Some(SymRefName::new(relative_path.to_string_lossy().to_string()))
            })
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }

    pub fn create_branch(&self, name: &BranchName, oid: ObjectId) -> anyhow::Result<()> {
        self.create(SymRefName::branch(name), oid)
    }

    pub fn create_tag(&self, name: &BranchName, oid: ObjectId) -> anyhow::Result<()> {
        self.create(SymRefName::tag(name), oid)
    }

    fn create(&self, full_name: SymRefName, oid: ObjectId) -> anyhow::Result<()> {
        if self.path.join(full_name.as_ref_path()).exists() {
            return Err(RepositoryError::ReferenceExists {
                name: full_name.short_name().to_string(),
            }
            .into());
        }

        self.set(&full_name, &RefTarget::Direct(oid))
    }

    /// Delete a branch other than the checked-out one, returning its last commit
    pub fn delete_branch(&self, name: &BranchName) -> anyhow::Result<ObjectId> {
        if self.is_current_branch(name)? {
            return Err(RepositoryError::CurrentBranchDeletion {
                name: name.to_string(),
            }
            .into());
        }

        let full_name = SymRefName::branch(name);
        let oid = match self.read(&full_name)? {
            Some(RefTarget::Direct(oid)) => oid,
            _ => {
                return Err(RepositoryError::ReferenceNotFound {
                    name: name.to_string(),
                }
                .into());
            }
        };
        self.delete(&full_name)?;

        Ok(oid)
    }

    pub fn list_branches(&self) -> anyhow::Result<Vec<SymRefName>> {
        self.list(HEADS_PREFIX)
    }

    pub fn list_tags(&self) -> anyhow::Result<Vec<SymRefName>> {
        self.list(TAGS_PREFIX)
    }

    pub fn head_path(&self) -> Box<Path> {
        self.path.join(HEAD_REF_NAME).into_boxed_path()
    }

    pub fn refs_path(&self) -> Box<Path> {
        self.path.join("refs").into_boxed_path()
    }

    pub fn heads_path(&self) -> Box<Path> {
        self.refs_path().join("heads").into_boxed_path()
    }

    pub fn tags_path(&self) -> Box<Path> {
        self.refs_path().join("tags").into_boxed_path()
    }
}
