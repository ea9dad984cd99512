use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::IndexEntry;

impl Repository {
    /// Index entries in path order
    pub async fn ls_files(&self) -> anyhow::Result<Vec<IndexEntry>> {
        let index = self.index();
        let mut index = index.lock().await;

        index.rehydrate()?;

        Ok(index.entries().cloned().collect())
    }
}
