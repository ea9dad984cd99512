//! Atomic replacement of small metadata files (index, refs)
//!
//! The new content is written to a `<name>.lock` sibling while holding an
//! exclusive lock on it, then renamed over the target. Readers see either
//! the old file or the new one, never a partial write.

use anyhow::Context;
use file_guard::Lock;
use std::path::{Path, PathBuf};

pub fn lock_path(path: &Path) -> PathBuf {
    let mut lock_path = path.as_os_str().to_owned();
    lock_path.push(".lock");
    PathBuf::from(lock_path)
}

/// Replace `path` with whatever `write` produces
pub fn write_atomically<F>(path: &Path, write: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut std::fs::File) -> anyhow::Result<()>,
{
    let parent = path
        .parent()
        .with_context(|| format!("invalid path {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("unable to create directory {}", parent.display()))?;

    let lock_path = lock_path(path);
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&lock_path)
        .with_context(|| format!("unable to open lock file {}", lock_path.display()))?;

    let result = {
        let mut guard = file_guard::lock(&mut lock_file, Lock::Exclusive, 0, 1)
            .with_context(|| format!("unable to lock {}", lock_path.display()))?;
        write(&mut **guard).and_then(|()| {
            guard
                .sync_all()
                .with_context(|| format!("unable to flush {}", lock_path.display()))
        })
    };

    match result {
        Ok(()) => std::fs::rename(&lock_path, path).with_context(|| {
            format!(
                "unable to move {} into place at {}",
                lock_path.display(),
                path.display()
            )
        }),
        Err(error) => {
            // the target is untouched; drop the partial lock file
            let _ = std::fs::remove_file(&lock_path);
            Err(error)
        }
    }
}
