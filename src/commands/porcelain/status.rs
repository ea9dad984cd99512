use crate::areas::repository::Repository;
use crate::artifacts::status::status_info::StatusInfo;

impl Repository {
    /// Compare HEAD, the index and the working tree
    ///
    /// The index is only read; refreshed stat data is not written back.
    pub async fn status(&self) -> anyhow::Result<StatusInfo> {
        let index = self.index();
        let mut index = index.lock().await;

        index.rehydrate()?;

        self.status_inspector().initialize(&index)
    }
}
