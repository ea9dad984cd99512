use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::errors::RepositoryError;
use anyhow::Context;
use std::path::{Path, PathBuf};

impl Repository {
    /// Stage the given repository-relative paths
    ///
    /// Directories expand to every file below them. Tracked files that no
    /// longer exist on disk are dropped from the index.
    pub async fn add(&self, paths: &[PathBuf]) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;

        index.rehydrate()?;

        // validate everything before touching the index
        for path in paths {
            if !self.workspace().exists(path) && index.entries_under_path(path).is_empty() {
                return Err(RepositoryError::PathNotTracked { path: path.clone() }.into());
            }
        }

        for path in paths {
            self.add_path(&mut index, path)?;
        }

        index.write_updates()?;

        Ok(())
    }

    fn add_path(&self, index: &mut Index, path: &Path) -> anyhow::Result<()> {
        let files = if self.workspace().exists(path) {
            self.workspace().list_files(Some(path))?
        } else {
            Vec::new()
        };

        for tracked in index.entries_under_path(path) {
            if !self.workspace().exists(&tracked) {
                tracing::debug!(path = %tracked.display(), "removing deleted file from index");
                index.remove(&tracked);
            }
        }

        for file in files {
            let data = self
                .workspace()
                .read_file(&file)
                .with_context(|| format!("unable to stage {}", file.display()))?;
            let stat = self.workspace().stat_file(&file)?;

            index.stage(self.database(), &file, data, stat)?;
        }

        Ok(())
    }
}
