//! Working directory access
//!
//! All paths taken and returned are relative to the repository root. File
//! contents are raw bytes; symlinks are read and written as links, never
//! followed.

use crate::areas::repository::GIT_DIR;
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::index::index_entry::EntryMetadata;
use anyhow::Context;
use bytes::Bytes;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const IGNORED_PATHS: [&str; 1] = [GIT_DIR];

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Repository-relative form of a path given relative to the root or absolute
    pub fn relative_path(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let relative = if path.is_absolute() {
            path.strip_prefix(self.path.as_ref())
                .with_context(|| {
                    format!("{} is outside repository at {}", path.display(), self.path.display())
                })?
                .to_path_buf()
        } else {
            path.to_path_buf()
        };

        // lexical normalization; `..` may not climb above the root
        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => normalized.push(name),
                Component::CurDir => {}
                Component::ParentDir if normalized.pop() => {}
                _ => anyhow::bail!("{} is outside repository at {}", path.display(), self.path.display()),
            }
        }

        Ok(normalized)
    }

    /// Whether anything (file, symlink or directory) exists at `path`
    pub fn exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(self.path.join(path)).is_ok()
    }

    /// Files and symlinks at or below `root`, sorted; the whole tree when `None`
    pub fn list_files(&self, root: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let root_path = match root {
            Some(path) => self.path.join(path),
            None => self.path.to_path_buf(),
        };

        let metadata = std::fs::symlink_metadata(&root_path)
            .with_context(|| format!("the specified path does not exist: {}", root_path.display()))?;

        if !metadata.is_dir() {
            let relative = root_path.strip_prefix(self.path.as_ref())?.to_path_buf();
            return Ok(if Self::is_ignored(&relative) {
                Vec::new()
            } else {
                vec![relative]
            });
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&root_path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .path()
                    .strip_prefix(self.path.as_ref())
                    .map(|relative| !Self::is_ignored(relative))
                    .unwrap_or(false)
            });

        for entry in walker {
            let entry = entry.with_context(|| format!("unable to scan {}", root_path.display()))?;
            if entry.file_type().is_dir() {
                continue;
            }

            files.push(entry.path().strip_prefix(self.path.as_ref())?.to_path_buf());
        }
        files.sort();

        Ok(files)
    }

    fn is_ignored(path: &Path) -> bool {
        path.components().any(|component| {
            if let Component::Normal(name) = component {
                IGNORED_PATHS.contains(&name.to_string_lossy().as_ref())
            } else {
                false
            }
        })
    }

    /// File content, or the link target for a symlink
    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let full_path = self.path.join(file_path);
        let metadata = std::fs::symlink_metadata(&full_path)
            .with_context(|| format!("unable to stat {}", file_path.display()))?;

        let data = if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&full_path)
                .with_context(|| format!("unable to read link {}", file_path.display()))?;
            target.into_os_string().into_encoded_bytes()
        } else {
            std::fs::read(&full_path)
                .with_context(|| format!("unable to read {}", file_path.display()))?
        };

        Ok(Bytes::from(data))
    }

    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<EntryMetadata> {
        let full_path = self.path.join(file_path);
        let metadata = std::fs::symlink_metadata(&full_path)
            .with_context(|| format!("unable to stat {}", file_path.display()))?;

        Ok(EntryMetadata::from_stat(&full_path, &metadata))
    }

    /// Write `data` at `file_path` with the given mode
    ///
    /// Missing parent directories are created; a file standing where a
    /// directory is needed, or a directory where the file goes, is removed.
    pub fn write_file(&self, file_path: &Path, data: &[u8], mode: EntryMode) -> anyhow::Result<()> {
        if let Some(parent) = file_path.parent() {
            self.make_directory(parent)?;
        }

        let full_path = self.path.join(file_path);
        match std::fs::symlink_metadata(&full_path) {
            Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(&full_path)
                .with_context(|| format!("unable to remove directory {}", file_path.display()))?,
            Ok(_) => std::fs::remove_file(&full_path)
                .with_context(|| format!("unable to remove {}", file_path.display()))?,
            Err(_) => {}
        }

        match mode {
            EntryMode::Symlink => {
                use std::os::unix::ffi::OsStrExt;
                let target = std::ffi::OsStr::from_bytes(data);
                std::os::unix::fs::symlink(target, &full_path)
                    .with_context(|| format!("unable to create link {}", file_path.display()))?;
            }
            EntryMode::File(file_mode) => {
                let mut file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&full_path)
                    .with_context(|| format!("unable to open {}", file_path.display()))?;
                file.write_all(data)
                    .with_context(|| format!("unable to write {}", file_path.display()))?;

                use std::os::unix::fs::PermissionsExt;
                let permissions = std::fs::Permissions::from_mode(match file_mode {
                    FileMode::Regular => 0o644,
                    FileMode::Executable => 0o755,
                });
                std::fs::set_permissions(&full_path, permissions).with_context(|| {
                    format!("unable to set permissions for {}", file_path.display())
                })?;
            }
            EntryMode::Directory => {
                anyhow::bail!("cannot write directory entry {} as a file", file_path.display())
            }
        }

        Ok(())
    }

    /// Delete a file or symlink, then any directories it leaves empty
    pub fn remove_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let full_path = self.path.join(file_path);

        match std::fs::symlink_metadata(&full_path) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => std::fs::remove_file(&full_path)
                .with_context(|| format!("unable to remove {}", file_path.display()))?,
            Err(_) => {}
        }

        self.prune_empty_dirs(file_path.parent())
    }

    fn prune_empty_dirs(&self, dir_path: Option<&Path>) -> anyhow::Result<()> {
        let Some(dir_path) = dir_path.filter(|dir| !dir.as_os_str().is_empty()) else {
            return Ok(());
        };

        let full_path = self.path.join(dir_path);
        let is_empty = full_path
            .read_dir()
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);

        if is_empty {
            std::fs::remove_dir(&full_path)
                .with_context(|| format!("unable to remove directory {}", dir_path.display()))?;
            self.prune_empty_dirs(dir_path.parent())?;
        }

        Ok(())
    }

    /// Create `dir_path` and its parents, replacing files that stand in the way
    fn make_directory(&self, dir_path: &Path) -> anyhow::Result<()> {
        let mut current = self.path.to_path_buf();

        for component in dir_path.components() {
            current.push(component);

            match std::fs::symlink_metadata(&current) {
                Ok(metadata) if metadata.is_dir() => continue,
                Ok(_) => std::fs::remove_file(&current)
                    .with_context(|| format!("unable to remove {}", current.display()))?,
                Err(_) => {}
            }

            std::fs::create_dir(&current)
                .with_context(|| format!("unable to create directory {}", current.display()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn workspace(dir: &TempDir) -> Workspace {
        Workspace::new(dir.path().to_path_buf().into_boxed_path())
    }

    #[rstest]
    fn listing_skips_the_repository_directory(dir: TempDir) {
        dir.child(".gitpie/HEAD").write_str("ref: refs/heads/master\n").unwrap();
        dir.child("b.txt").write_str("b").unwrap();
        dir.child("a/c.txt").write_str("c").unwrap();
        dir.child("empty").create_dir_all().unwrap();

        let files = workspace(&dir).list_files(None).unwrap();

        assert_eq!(files, vec![PathBuf::from("a/c.txt"), PathBuf::from("b.txt")]);
    }

    #[rstest]
    fn listing_a_single_file(dir: TempDir) {
        dir.child("a/c.txt").write_str("c").unwrap();

        let files = workspace(&dir).list_files(Some(Path::new("a/c.txt"))).unwrap();

        assert_eq!(files, vec![PathBuf::from("a/c.txt")]);
        assert!(workspace(&dir).list_files(Some(Path::new("missing"))).is_err());
    }

    #[rstest]
    fn binary_content_is_preserved(dir: TempDir) {
        let workspace = workspace(&dir);
        let data = [0u8, 159, 146, 150, 255];

        workspace
            .write_file(Path::new("bin/data"), &data, EntryMode::File(FileMode::Executable))
            .unwrap();

        assert_eq!(workspace.read_file(Path::new("bin/data")).unwrap().as_ref(), &data);
        assert_eq!(
            workspace.stat_file(Path::new("bin/data")).unwrap().mode,
            EntryMode::File(FileMode::Executable)
        );
    }

    #[rstest]
    fn symlinks_are_written_and_read_as_links(dir: TempDir) {
        let workspace = workspace(&dir);

        workspace
            .write_file(Path::new("link"), b"target.txt", EntryMode::Symlink)
            .unwrap();

        assert_eq!(workspace.read_file(Path::new("link")).unwrap().as_ref(), b"target.txt");
        assert_eq!(workspace.stat_file(Path::new("link")).unwrap().mode, EntryMode::Symlink);
    }

    #[rstest]
    fn writing_replaces_whatever_is_in_the_way(dir: TempDir) {
        dir.child("a").write_str("file where a directory goes").unwrap();
        dir.child("b/nested.txt").write_str("directory where a file goes").unwrap();
        let workspace = workspace(&dir);

        workspace.write_file(Path::new("a/x.txt"), b"x", EntryMode::default()).unwrap();
        workspace.write_file(Path::new("b"), b"b", EntryMode::default()).unwrap();

        dir.child("a/x.txt").assert("x");
        dir.child("b").assert("b");
    }

    #[rstest]
    fn removing_prunes_empty_parents(dir: TempDir) {
        dir.child("a/b/c.txt").write_str("c").unwrap();
        dir.child("a/keep.txt").write_str("k").unwrap();
        let workspace = workspace(&dir);

        workspace.remove_file(Path::new("a/b/c.txt")).unwrap();

        assert!(!dir.child("a/b").exists());
        assert!(dir.child("a/keep.txt").exists());
    }

    #[rstest]
    #[case("a/../b.txt", "b.txt")]
    #[case("./a/b.txt", "a/b.txt")]
    fn relative_paths_are_normalized(dir: TempDir, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(
            workspace(&dir).relative_path(Path::new(input)).unwrap(),
            PathBuf::from(expected)
        );
    }

    #[rstest]
    fn escaping_paths_are_rejected(dir: TempDir) {
        assert!(workspace(&dir).relative_path(Path::new("../outside")).is_err());
        assert!(workspace(&dir).relative_path(Path::new("/elsewhere")).is_err());
    }
}
