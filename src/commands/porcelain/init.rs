use crate::areas::refs::RefTarget;
use crate::areas::repository::{DEFAULT_BRANCH, Repository};
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use anyhow::Context;
use std::fs;

impl Repository {
    /// Lay out `.gitpie` with HEAD on an unborn default branch
    ///
    /// Running it again on an existing repository keeps HEAD where it is.
    pub async fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(self.database().objects_path())
            .context("unable to create the objects directory")?;
        fs::create_dir_all(self.refs().heads_path())
            .context("unable to create the refs/heads directory")?;
        fs::create_dir_all(self.refs().tags_path())
            .context("unable to create the refs/tags directory")?;

        if !self.refs().head_path().exists() {
            let default_branch = BranchName::try_parse(DEFAULT_BRANCH.to_string())?;
            self.refs()
                .set_head(&RefTarget::Symbolic(SymRefName::branch(&default_branch)))
                .context("unable to create the initial HEAD reference")?;
        }

        tracing::info!(path = %self.path().display(), "repository initialized");

        Ok(())
    }
}
