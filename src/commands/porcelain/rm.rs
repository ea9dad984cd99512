use crate::areas::repository::Repository;
use crate::errors::RepositoryError;
use std::path::PathBuf;

impl Repository {
    /// Unstage paths, leaving the working tree alone
    pub async fn rm_cached(&self, paths: &[PathBuf]) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;

        index.rehydrate()?;

        for path in paths {
            if index.entries_under_path(path).is_empty() {
                return Err(RepositoryError::PathNotTracked { path: path.clone() }.into());
            }
        }

        for path in paths {
            tracing::debug!(path = %path.display(), "unstaging");
            index.remove(path);
        }

        index.write_updates()?;

        Ok(())
    }
}
