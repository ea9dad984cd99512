use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::{ANCESTOR_REGEX, PARENT_REGEX, REF_ALIASES};
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::RepositoryError;
use anyhow::Context;

/// Shortest abbreviated hash accepted in a revision
pub const MIN_REVISION_PREFIX: usize = 4;

/// Represents a revision specification that can be used to identify commits.
///
/// Supports multiple formats:
/// - Branch/tag/ref names: `main`, `feature/new-feature`, `v1.0`, `HEAD`
/// - Aliases: `@` (resolves to `HEAD`)
/// - Full or abbreviated hashes (4-40 hex characters), used as a fallback
///   when no reference with that name exists
/// - Parent notation: `<revision>^` (e.g., `main^`, `HEAD^`, `abc123^`)
/// - Ancestor notation: `<revision>~<n>` (e.g., `main~3`, `HEAD~5`)
///
/// Hash-like names are parsed as `Ref` and only treated as hashes at
/// resolution time, so a branch called `cafe` wins over an object `cafe...`.
#[derive(Debug, Clone)]
pub enum Revision {
    Ref(BranchName),
    /// The Nth first-parent ancestor of a revision (e.g., HEAD~3)
    Ancestor(Box<Revision>, usize),
    Parent(Box<Revision>),
}

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Revision> {
        let parent_regex = regex::Regex::new(PARENT_REGEX)
            .with_context(|| format!("invalid parent regex: {PARENT_REGEX}"))?;
        let ancestor_regex = regex::Regex::new(ANCESTOR_REGEX)
            .with_context(|| format!("invalid ancestor regex: {ANCESTOR_REGEX}"))?;

        if let Some(caps) = parent_regex.captures(revision) {
            let base_revision = Self::try_parse(&caps[1])?;

            Ok(Revision::Parent(Box::new(base_revision)))
        } else if let Some(caps) = ancestor_regex.captures(revision) {
            let generations: usize = caps[2]
                .parse()
                .with_context(|| format!("failed to parse generations in revision: {revision}"))?;
            let base_revision = Self::try_parse(&caps[1])?;

            Ok(Revision::Ancestor(Box::new(base_revision), generations))
        } else {
            let resolved_name = *REF_ALIASES.get(revision).unwrap_or(&revision);
            let branch_name = BranchName::try_parse(resolved_name.to_string())?;

            Ok(Revision::Ref(branch_name))
        }
    }

    /// Resolve to the hash of an existing commit
    pub fn resolve(&self, repository: &Repository) -> anyhow::Result<ObjectId> {
        match self {
            Revision::Ref(name) => Self::resolve_name(name.as_ref(), repository),
            Revision::Parent(base_revision) => {
                Self::resolve_commit_parent(base_revision.resolve(repository)?, repository)
            }
            Revision::Ancestor(base_revision, generations) => {
                let mut oid = base_revision.resolve(repository)?;
                for _ in 0..*generations {
                    oid = Self::resolve_commit_parent(oid, repository)?;
                }

                Ok(oid)
            }
        }
    }

    fn resolve_name(name: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        let oid = match repository.refs().resolve(name, repository.database()) {
            Ok(oid) => oid,
            Err(error) => match RepositoryError::of(&error) {
                Some(RepositoryError::ReferenceNotFound { .. }) if Self::looks_like_oid(name) => {
                    Self::resolve_oid(name, repository)?
                }
                _ => return Err(error),
            },
        };

        Self::validate_oid_is_commit(&oid, repository)?;
        Ok(oid)
    }

    fn resolve_commit_parent(oid: ObjectId, repository: &Repository) -> anyhow::Result<ObjectId> {
        let commit = repository.database().parse_object_as_commit(&oid)?;

        commit
            .parent()
            .cloned()
            .with_context(|| format!("commit {} has no parent", oid.to_short_oid()))
    }

    fn resolve_oid(oid_str: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        let database = repository.database();

        match database.find_object(oid_str, MIN_REVISION_PREFIX) {
            Ok(oid) => Ok(oid),
            Err(error) => match RepositoryError::of(&error) {
                // only commits are valid candidates for a revision
                Some(RepositoryError::AmbiguousObjectId { prefix, candidates }) => {
                    let commits = candidates
                        .iter()
                        .filter(|oid| {
                            database
                                .object_type(oid)
                                .is_ok_and(|object_type| object_type == ObjectType::Commit)
                        })
                        .cloned()
                        .collect::<Vec<_>>();

                    match commits.as_slice() {
                        [single] => Ok(single.clone()),
                        [] => Err(error),
                        _ => Err(RepositoryError::AmbiguousObjectId {
                            prefix: prefix.clone(),
                            candidates: commits,
                        }
                        .into()),
                    }
                }
                _ => Err(error.context(format!(
                    "ambiguous argument '{oid_str}': unknown revision or path not in the working tree"
                ))),
            },
        }
    }

    fn validate_oid_is_commit(oid: &ObjectId, repository: &Repository) -> anyhow::Result<()> {
        let found = repository.database().object_type(oid)?;

        if found != ObjectType::Commit {
            return Err(RepositoryError::UnexpectedObjectType {
                oid: oid.clone(),
                expected: ObjectType::Commit,
                found,
            }
            .into());
        }

        Ok(())
    }

    fn looks_like_oid(s: &str) -> bool {
        s.len() >= MIN_REVISION_PREFIX
            && s.len() <= OBJECT_ID_LENGTH
            && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}
