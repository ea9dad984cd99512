//! Index (staging area)
//!
//! The index tracks which file versions make up the next commit. It maintains
//! metadata about files including their mode, timestamps, and blob hashes.
//!
//! ## Index File Format
//!
//! The index file contains:
//! - Header: Signature, version, and entry count
//! - Entries: Sorted list of tracked files with metadata
//! - Checksum: SHA-1 hash of the entire index for integrity verification
//!
//! ## Data Structures
//!
//! - `entries`: Maps file paths to their index entries
//! - `children`: Maps directory paths to the entries below them, so that a
//!   file replacing a directory (or the reverse) evicts the stale entries

use crate::areas::database::{Database, FlatTree};
use crate::areas::lockfile;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{ENTRY_BLOCK, ENTRY_MIN_SIZE, EntryMetadata, IndexEntry};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;
use anyhow::anyhow;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.gitpie/index`)
    path: Box<Path>,
    /// Tracked files mapped by path
    entries: BTreeMap<Box<Path>, IndexEntry>,
    /// Directory hierarchy for efficient parent-child lookups
    children: BTreeMap<Box<Path>, BTreeSet<Box<Path>>>,
    /// Flag indicating if the index has been modified since loading
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.changed = false;
    }

    /// Load the index from disk, replacing the in-memory state
    ///
    /// A missing or empty file is an empty index. Anything else that fails
    /// validation is reported as `IndexCorrupt`.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::File::open(&self.path)?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        if lock.metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(BufReader::new(&mut **lock));
        let result = self.parse(&mut reader);
        drop(reader);

        result.map_err(|error| {
            self.clear();
            RepositoryError::IndexCorrupt {
                path: self.path.to_path_buf(),
                reason: format!("{error:#}"),
            }
            .into()
        })
    }

    fn parse<R: Read>(&mut self, reader: &mut Checksum<R>) -> anyhow::Result<()> {
        let entries_count = Self::parse_header(reader)?;
        self.parse_entries(entries_count, reader)?;

        reader.verify()?;
        self.changed = false;

        Ok(())
    }

    fn parse_header<R: Read>(reader: &mut Checksum<R>) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(header_bytes.as_ref())?;

        if header.marker != SIGNATURE {
            return Err(anyhow!("invalid signature '{}'", header.marker));
        }

        if header.version != VERSION {
            return Err(anyhow!("unsupported version {}", header.version));
        }

        Ok(header.entries_count)
    }

    /// Parse all entries, each padded with NULs to 8-byte alignment
    fn parse_entries<R: Read>(
        &mut self,
        entries_count: u32,
        reader: &mut Checksum<R>,
    ) -> anyhow::Result<()> {
        for position in 0..entries_count {
            let mut entry_bytes = reader
                .read(ENTRY_MIN_SIZE)
                .map_err(|_| anyhow!("truncated entry {position}"))?
                .to_vec();

            while entry_bytes.last() != Some(&0) {
                let block = reader
                    .read(ENTRY_BLOCK)
                    .map_err(|_| anyhow!("truncated entry {position}"))?;
                entry_bytes.extend_from_slice(&block);
            }

            let entry = IndexEntry::deserialize(entry_bytes.as_slice())?;
            self.store_entry(entry);
        }

        if self.entries.len() != entries_count as usize {
            return Err(anyhow!(
                "header announces {entries_count} entries but {} distinct paths were read",
                self.entries.len()
            ));
        }

        Ok(())
    }

    /// A path is directly tracked when it is a file entry or a directory
    /// containing file entries
    pub fn is_directly_tracked(&self, path: &Path) -> bool {
        self.entries.contains_key(path) || self.children.contains_key(path)
    }

    /// Remove entries that would clash with a new one
    ///
    /// Parent directories recorded as files are dropped, and so is everything
    /// below a path that is becoming a file.
    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.remove_entry(parent);
        }
        self.remove_children(&entry.name);
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        let name = entry.name.clone().into_boxed_path();

        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_path_buf().into_boxed_path())
                .or_default()
                .insert(name.clone());
        }

        self.entries.insert(name, entry);
    }

    fn remove_children(&mut self, path_name: &Path) {
        if let Some(children) = self.children.remove(path_name) {
            for child in children {
                self.remove_entry(&child);
            }
        }
    }

    fn remove_entry(&mut self, path_name: &Path) {
        if let Some(entry) = self.entries.remove(path_name) {
            for parent in entry.parent_dirs() {
                if let Some(children) = self.children.get_mut(parent) {
                    children.remove(path_name);
                    if children.is_empty() {
                        self.children.remove(parent);
                    }
                }
            }
        }
    }

    /// Insert or replace an entry
    ///
    /// The caller guarantees the blob is already in the object store.
    pub fn add(&mut self, entry: IndexEntry) -> anyhow::Result<()> {
        validate_entry_path(&entry.name)?;

        self.discard_conflicts(&entry);
        self.store_entry(entry);
        self.changed = true;

        Ok(())
    }

    /// Store `content` as a blob, then record it at `path`
    ///
    /// The blob is written before the entry so the index never refers to a
    /// missing object.
    pub fn stage(
        &mut self,
        database: &Database,
        path: &Path,
        content: Bytes,
        metadata: EntryMetadata,
    ) -> anyhow::Result<ObjectId> {
        validate_entry_path(path)?;

        let oid = database.store(&Blob::new(content))?;
        tracing::debug!(path = %path.display(), oid = %oid, "staged file");
        self.add(IndexEntry::new(path.to_path_buf(), oid.clone(), metadata))?;

        Ok(oid)
    }

    /// Remove the entry at `path` and every entry below it; absent paths are ignored
    pub fn remove(&mut self, path: &Path) {
        for entry_path in self.entries_under_path(path) {
            self.remove_entry(&entry_path);
            self.changed = true;
        }
    }

    /// Persist the index via a lock file and an atomic rename
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        let header = IndexHeader::new(
            String::from(SIGNATURE),
            VERSION,
            u32::try_from(self.entries.len())?,
        );
        let entries = &self.entries;

        lockfile::write_atomically(&self.path, |file| {
            let mut writer = Checksum::new(BufWriter::new(file));

            writer.write(&header.serialize()?)?;
            for entry in entries.values() {
                writer.write(&entry.serialize()?)?;
            }
            writer.write_checksum()
        })?;

        tracing::debug!(entries = self.entries.len(), "index written");
        self.changed = false;

        Ok(())
    }

    /// Refresh the stat cache of an entry without touching its content hash
    pub fn update_entry_stat(&mut self, path: &Path, stat: EntryMetadata) {
        if let Some(existing_entry) = self.entries.get_mut(path) {
            let flags = existing_entry.metadata.flags;
            existing_entry.metadata = EntryMetadata { flags, ..stat };
            self.changed = true;
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Entries as path to hash and mode, the shape of a flattened tree
    pub fn flat_tree(&self) -> FlatTree {
        self.entries
            .values()
            .map(|entry| {
                (
                    entry.name.clone(),
                    DatabaseEntry::new(entry.oid.clone(), entry.mode()),
                )
            })
            .collect()
    }

    /// Tracked paths equal to or below `path`; `.` selects everything
    pub fn entries_under_path(&self, path: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|entry_path| path == Path::new(".") || entry_path.starts_with(path))
            .map(|entry_path| entry_path.to_path_buf())
            .collect()
    }
}

fn validate_entry_path(path: &Path) -> anyhow::Result<()> {
    let is_normal = path.components().all(|component| matches!(component, Component::Normal(_)));

    if path.as_os_str().is_empty() || !is_normal {
        return Err(anyhow!(
            "index paths must be relative to the repository root: {}",
            path.display()
        ));
    }

    Ok(())
}
