//! Typed failures raised by the storage and synchronization layers
//!
//! Every command returns `anyhow::Result`, with one of these variants as the
//! root cause whenever the failure is a well-defined repository condition.
//! Callers that need to react to a specific condition downcast:
//!
//! ```ignore
//! match err.downcast_ref::<RepositoryError>() {
//!     Some(RepositoryError::CheckoutConflict { paths }) => { /* ... */ }
//!     _ => return Err(err),
//! }
//! ```

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// no object with this hash exists in the object store
    #[error("object {oid} not found")]
    ObjectNotFound { oid: ObjectId },

    /// an abbreviated hash matched nothing or more than one object
    #[error("short object id {prefix} is ambiguous: {candidates:?}")]
    AmbiguousObjectId {
        prefix: String,
        candidates: Vec<ObjectId>,
    },

    /// the stored bytes of an object could not be decoded
    #[error("object {oid} is corrupt: {reason}")]
    CorruptObject { oid: ObjectId, reason: String },

    /// a typed read found an object of another kind
    #[error("object {oid} is a {found}, expected a {expected}")]
    UnexpectedObjectType {
        oid: ObjectId,
        expected: ObjectType,
        found: ObjectType,
    },

    /// the index file failed validation
    #[error("index file {path} is corrupt: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    /// a reference chain ended at a hash that is not in the object store
    #[error("reference {name} points to missing object {oid}")]
    DanglingReference { name: String, oid: ObjectId },

    /// a symbolic chain ended at a reference that has not been created yet
    #[error("reference {name} is unborn: {target} does not exist yet")]
    UnbornReference { name: String, target: String },

    /// the starting reference of a lookup does not exist
    #[error("reference {name} not found")]
    ReferenceNotFound { name: String },

    /// a symbolic chain visits the same reference twice
    #[error("reference cycle detected while resolving {name}")]
    ReferenceCycle { name: String },

    #[error("reference {name} already exists")]
    ReferenceExists { name: String },

    #[error("'{name}' is not a valid reference name")]
    InvalidReferenceName { name: String },

    #[error("cannot delete branch {name}: it is checked out")]
    CurrentBranchDeletion { name: String },

    /// checkout would discard local changes on these paths
    #[error("checkout would overwrite local changes in: {}", display_paths(.paths))]
    CheckoutConflict { paths: Vec<PathBuf> },

    /// the index produces the same tree as HEAD
    #[error("nothing to commit: tree {tree} is unchanged")]
    EmptyCommit { tree: ObjectId },

    #[error("path {path} is not tracked")]
    PathNotTracked { path: PathBuf },

    #[error("not a gitpie repository (or any parent up to /): {path}")]
    NotARepository { path: PathBuf },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RepositoryError {
    /// The typed cause of an `anyhow` error, if there is one
    pub fn of(error: &anyhow::Error) -> Option<&RepositoryError> {
        error.downcast_ref::<RepositoryError>()
    }

    /// Failures the caller can recover from without repairing the repository
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RepositoryError::CheckoutConflict { .. }
                | RepositoryError::EmptyCommit { .. }
                | RepositoryError::PathNotTracked { .. }
                | RepositoryError::ReferenceExists { .. }
                | RepositoryError::InvalidReferenceName { .. }
                | RepositoryError::CurrentBranchDeletion { .. }
                | RepositoryError::AmbiguousObjectId { .. }
        )
    }
}
