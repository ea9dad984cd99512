use crate::artifacts::branch::{HEADS_PREFIX, INVALID_BRANCH_NAME_REGEX, TAGS_PREFIX};
use crate::errors::RepositoryError;
use anyhow::Context;
use derive_new::new;

/// Full name of a reference as stored under the repository directory,
/// e.g. `HEAD`, `refs/heads/master` or `refs/tags/v1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, new)]
pub struct SymRefName(String);

impl SymRefName {
    pub fn head() -> Self {
        SymRefName(crate::areas::refs::HEAD_REF_NAME.to_string())
    }

    pub fn branch(name: &BranchName) -> Self {
        SymRefName(format!("{HEADS_PREFIX}{name}"))
    }

    pub fn tag(name: &BranchName) -> Self {
        SymRefName(format!("{TAGS_PREFIX}{name}"))
    }

    pub fn is_detached_head(&self) -> bool {
        self.0 == crate::areas::refs::HEAD_REF_NAME
    }

    pub fn as_ref_path(&self) -> &str {
        &self.0
    }

    /// The branch this reference names, if it lives under `refs/heads/`
    pub fn branch_name(&self) -> Option<BranchName> {
        self.0
            .strip_prefix(HEADS_PREFIX)
            .map(|name| BranchName(name.to_string()))
    }

    /// Name with the `refs/heads/` or `refs/tags/` prefix removed
    pub fn short_name(&self) -> &str {
        self.0
            .strip_prefix(HEADS_PREFIX)
            .or_else(|| self.0.strip_prefix(TAGS_PREFIX))
            .unwrap_or(&self.0)
    }
}

impl std::fmt::Display for SymRefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated short reference name, used for branches and tags alike
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        let re = regex::Regex::new(INVALID_BRANCH_NAME_REGEX)
            .with_context(|| format!("invalid branch name regex: {INVALID_BRANCH_NAME_REGEX}"))?;

        if name.is_empty() || re.is_match(&name) {
            Err(RepositoryError::InvalidReferenceName { name }.into())
        } else {
            Ok(Self(name))
        }
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
