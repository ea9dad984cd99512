use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::status::status_info::Status;
use crate::errors::RepositoryError;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Name of the repository directory at the root of a working tree
pub const GIT_DIR: &str = ".gitpie";

/// Branch HEAD points to after `init`
pub const DEFAULT_BRANCH: &str = "master";

/// Handle on one repository, threaded through every command
///
/// The index sits behind an async mutex held for the duration of a command
/// that reads or rewrites it.
pub struct Repository {
    path: Box<Path>,
    git_path: Box<Path>,
    index: Arc<Mutex<Index>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
}

impl Repository {
    /// Repository rooted at `path`, which is created if missing
    ///
    /// Nothing below the root is touched; see `init` for that.
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("unable to create directory {}", path.display()))?;
        }
        let path = path
            .canonicalize()
            .with_context(|| format!("unable to resolve {}", path.display()))?;
        let git_path = path.join(GIT_DIR);

        let index = Index::new(git_path.join("index").into_boxed_path());
        let database = Database::new(git_path.join("objects").into_boxed_path());
        let workspace = Workspace::new(path.clone().into_boxed_path());
        let refs = Refs::new(git_path.clone().into_boxed_path());

        Ok(Repository {
            path: path.into_boxed_path(),
            git_path: git_path.into_boxed_path(),
            index: Arc::new(Mutex::new(index)),
            database,
            workspace,
            refs,
        })
    }

    /// Find the repository containing `start` by walking up its ancestors
    pub fn discover(start: &Path) -> anyhow::Result<Self> {
        let start = start
            .canonicalize()
            .with_context(|| format!("unable to resolve {}", start.display()))?;

        let root = start
            .ancestors()
            .find(|candidate| candidate.join(GIT_DIR).is_dir())
            .ok_or_else(|| RepositoryError::NotARepository {
                path: start.clone(),
            })?;
        tracing::debug!(root = %root.display(), "repository discovered");

        Self::new(root)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> &Path {
        &self.git_path
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn status_inspector(&'_ self) -> Status<'_> {
        Status::new(self)
    }
}
