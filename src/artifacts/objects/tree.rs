//! Tree object
//!
//! Trees represent directory snapshots. They contain entries for files (blobs),
//! symlinks and subdirectories (other trees), along with their names and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`, ordered by name byte-wise
//!
//! ## Tree Building
//!
//! Stored trees are read into a [`Tree`]. Trees for a new commit are built
//! from the flat list of index entries by a [`TreeBuilder`], which nests the
//! entries by directory and stores the subtrees bottom-up.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::{Context, anyhow};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io::{BufRead, Write};
use std::path::Component;

/// A directory snapshot
///
/// `String` ordering is byte-wise, so iterating the map yields the entries
/// in their serialized order no matter how they were inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, DatabaseEntry>,
}

impl Tree {
    /// Add an entry, rejecting invalid or duplicate names
    pub fn insert(&mut self, name: impl Into<String>, entry: DatabaseEntry) -> anyhow::Result<()> {
        let name = name.into();
        validate_entry_name(&name)?;

        match self.entries.entry(name) {
            Entry::Occupied(occupied) => Err(anyhow!("duplicate tree entry '{}'", occupied.key())),
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &DatabaseEntry)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.entries.into_iter()
    }
}

fn validate_entry_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(anyhow!("invalid tree entry name '{name}'"));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(anyhow!("tree entry name '{name}' contains a separator"));
    }

    Ok(())
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content_bytes = Vec::new();

        for (name, entry) in &self.entries {
            write!(content_bytes, "{:o} {}", entry.mode.as_u32(), name)?;
            content_bytes.push(0);
            entry.oid.write_h40_to(&mut content_bytes)?;
        }

        Ok(frame(self.object_type(), &content_bytes))
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut tree = Tree::default();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow!("unexpected EOF in mode"));
            }
            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(anyhow!("unexpected EOF in name"));
            }
            let name = std::str::from_utf8(&name_bytes)?.to_owned();

            let oid =
                ObjectId::read_h40_from(&mut reader).context("unexpected EOF in object id")?;

            tree.insert(name, DatabaseEntry::new(oid, mode))?;
        }

        Ok(tree)
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.entries
            .iter()
            .map(|(name, entry)| {
                format!(
                    "{:0>6} {} {}\t{}",
                    entry.mode.as_str(),
                    entry.object_type(),
                    entry.oid,
                    name
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
enum BuilderEntry {
    Leaf(DatabaseEntry),
    Directory(TreeBuilder),
}

/// Nested view of index entries, turned into stored trees bottom-up
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    entries: BTreeMap<String, BuilderEntry>,
}

impl TreeBuilder {
    /// Nest a flat list of index entries by directory
    ///
    /// The index guarantees that no path is both a file and a directory, so a
    /// clash here means the entries did not come from a consistent index.
    pub fn build<'e>(entries: impl IntoIterator<Item = &'e IndexEntry>) -> anyhow::Result<Self> {
        let mut root = Self::default();

        for entry in entries {
            let components = entry
                .name
                .components()
                .map(|component| match component {
                    Component::Normal(name) => name
                        .to_str()
                        .map(str::to_owned)
                        .ok_or_else(|| anyhow!("path {} is not UTF-8", entry.name.display())),
                    _ => Err(anyhow!("path {} is not repository relative", entry.name.display())),
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            root.add_entry(&components, DatabaseEntry::new(entry.oid.clone(), entry.metadata.mode))?;
        }

        Ok(root)
    }

    fn add_entry(&mut self, components: &[String], leaf: DatabaseEntry) -> anyhow::Result<()> {
        match components {
            [] => Err(anyhow!("empty path in index")),
            [name] => {
                validate_entry_name(name)?;
                if self.entries.contains_key(name) {
                    return Err(anyhow!("duplicate tree entry '{name}'"));
                }
                self.entries.insert(name.clone(), BuilderEntry::Leaf(leaf));
                Ok(())
            }
            [parent, rest @ ..] => {
                let subtree = self
                    .entries
                    .entry(parent.clone())
                    .or_insert_with(|| BuilderEntry::Directory(TreeBuilder::default()));

                match subtree {
                    BuilderEntry::Directory(builder) => builder.add_entry(rest, leaf),
                    BuilderEntry::Leaf(_) => Err(anyhow!("'{parent}' is both a file and a directory")),
                }
            }
        }
    }

    /// Hand every tree to `store`, children before parents, and return the root id
    ///
    /// Children must be stored first since a parent embeds their ids.
    pub fn write_with<F>(&self, store: &mut F) -> anyhow::Result<ObjectId>
    where
        F: FnMut(&Tree) -> anyhow::Result<ObjectId>,
    {
        let mut tree = Tree::default();

        for (name, entry) in &self.entries {
            let entry = match entry {
                BuilderEntry::Leaf(leaf) => leaf.clone(),
                BuilderEntry::Directory(builder) => {
                    DatabaseEntry::new(builder.write_with(store)?, EntryMode::Directory)
                }
            };
            tree.insert(name.clone(), entry)?;
        }

        store(&tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::FileMode;
    use crate::artifacts::index::index_entry::EntryMetadata;
    use crate::artifacts::objects::blob::Blob;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn blob_oid(content: &str) -> ObjectId {
        Blob::new(content.to_string()).object_id().unwrap()
    }

    fn index_entry(path: &str, content: &str) -> IndexEntry {
        IndexEntry::new(
            PathBuf::from(path),
            blob_oid(content),
            EntryMetadata::default(),
        )
    }

    fn hash_only(tree: &Tree) -> anyhow::Result<ObjectId> {
        tree.object_id()
    }

    #[test]
    fn serialization_round_trips() {
        let mut tree = Tree::default();
        tree.insert(
            "run.sh",
            DatabaseEntry::new(blob_oid("echo"), EntryMode::File(FileMode::Executable)),
        )
        .unwrap();
        tree.insert("link", DatabaseEntry::new(blob_oid("target"), EntryMode::Symlink))
            .unwrap();
        tree.insert("src", DatabaseEntry::new(blob_oid("x"), EntryMode::Directory))
            .unwrap();

        let serialized = tree.serialize().unwrap();
        let payload = &serialized[serialized.iter().position(|&b| b == 0).unwrap() + 1..];

        assert_eq!(Tree::deserialize(payload).unwrap(), tree);
    }

    #[test]
    fn names_are_validated() {
        let entry = DatabaseEntry::new(blob_oid("x"), EntryMode::default());
        let mut tree = Tree::default();

        assert!(tree.insert("", entry.clone()).is_err());
        assert!(tree.insert("a/b", entry.clone()).is_err());
        assert!(tree.insert("..", entry.clone()).is_err());
        tree.insert("a", entry.clone()).unwrap();
        assert!(tree.insert("a", entry).is_err());
    }

    #[test]
    fn builder_nests_entries_and_writes_children_first() {
        let entries = [
            index_entry("a/b/c.txt", "c"),
            index_entry("a/d.txt", "d"),
            index_entry("e.txt", "e"),
        ];
        let builder = TreeBuilder::build(entries.iter()).unwrap();

        let mut written = Vec::new();
        let root = builder
            .write_with(&mut |tree: &Tree| {
                written.push(tree.clone());
                tree.object_id()
            })
            .unwrap();

        assert_eq!(written.len(), 3);
        let top = written.last().unwrap();
        assert_eq!(top.object_id().unwrap(), root);
        assert_eq!(
            top.entries().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            vec!["a", "e.txt"]
        );
        assert!(top.get("a").unwrap().is_tree());
    }

    #[test]
    fn builder_rejects_file_directory_clash() {
        let entries = [index_entry("a", "file"), index_entry("a/b", "nested")];

        assert!(TreeBuilder::build(entries.iter()).is_err());
    }

    proptest! {
        #[test]
        fn tree_hash_is_independent_of_entry_order(
            names in proptest::collection::btree_set("[a-z]{1,3}(/[a-z]{1,3})?", 1..12),
            seed in any::<u64>(),
        ) {
            // drop paths whose first component is also a file
            let files: Vec<String> = names
                .iter()
                .filter(|name| !names.iter().any(|other| name.starts_with(&format!("{other}/"))))
                .cloned()
                .collect();
            let entries: Vec<IndexEntry> = files
                .iter()
                .map(|name| index_entry(name, name))
                .collect();

            let mut shuffled = entries.clone();
            let len = shuffled.len();
            for i in 0..len {
                let j = (seed as usize).wrapping_add(i * 7) % len;
                shuffled.swap(i, j);
            }

            let ordered = TreeBuilder::build(entries.iter()).unwrap().write_with(&mut hash_only).unwrap();
            let permuted = TreeBuilder::build(shuffled.iter()).unwrap().write_with(&mut hash_only).unwrap();
            prop_assert_eq!(ordered, permuted);
        }
    }
}
