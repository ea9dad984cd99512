//! Content-addressed object store
//!
//! Objects live in `.gitpie/objects/<2 hex>/<38 hex>`, zlib compressed. The
//! hash is computed over the uncompressed serialized form, so compression
//! never changes an object's identity.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::log::rev_list::RevList;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::errors::RepositoryError;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

/// Flattened tree: repository-relative file path to its entry
pub type FlatTree = BTreeMap<PathBuf, DatabaseEntry>;

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Persist an object and return its hash
    ///
    /// Storing the same object twice is a no-op.
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        self.store_serialized(object.serialize()?)
    }

    /// Persist bytes already in `<type> <size>\0<payload>` form
    pub fn store_serialized(&self, object_content: Bytes) -> anyhow::Result<ObjectId> {
        let object_id = ObjectId::digest(&object_content);
        let object_path = self.path.join(object_id.to_path());

        if object_path.exists() {
            tracing::trace!(oid = %object_id, "object already stored");
            return Ok(object_id);
        }

        let object_dir = object_path
            .parent()
            .context(format!("invalid object path {}", object_path.display()))?;
        std::fs::create_dir_all(object_dir).context(format!(
            "unable to create object directory {}",
            object_dir.display()
        ))?;

        self.write_object(&object_path, object_content)?;
        tracing::debug!(oid = %object_id, "stored object");

        Ok(object_id)
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// Raw serialized bytes of an object, header included
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.path.join(object_id.to_path());

        if !object_path.is_file() {
            return Err(RepositoryError::ObjectNotFound {
                oid: object_id.clone(),
            }
            .into());
        }

        self.read_object(&object_path).map_err(|error| {
            RepositoryError::CorruptObject {
                oid: object_id.clone(),
                reason: format!("{error:#}"),
            }
            .into()
        })
    }

    /// Object type and payload, with the header length checked
    pub fn load_payload(&self, object_id: &ObjectId) -> anyhow::Result<(ObjectType, Bytes)> {
        let object_content = self.load(object_id)?;
        let corrupt = |reason: String| RepositoryError::CorruptObject {
            oid: object_id.clone(),
            reason,
        };

        let mut object_reader = Cursor::new(object_content.clone());
        let (object_type, size) = ObjectType::parse_header(&mut object_reader)
            .map_err(|error| corrupt(format!("{error:#}")))?;
        let payload = object_content.slice(object_reader.position() as usize..);

        if payload.len() != size {
            return Err(corrupt(format!(
                "header declares {size} bytes but payload has {}",
                payload.len()
            ))
            .into());
        }

        Ok((object_type, payload))
    }

    pub fn object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        Ok(self.load_payload(object_id)?.0)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        let (object_type, payload) = self.load_payload(object_id)?;

        ObjectBox::deserialize_as(object_type, payload.as_ref()).map_err(|error| {
            RepositoryError::CorruptObject {
                oid: object_id.clone(),
                reason: format!("{error:#}"),
            }
            .into()
        })
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Blob> {
        self.parse_typed(object_id, ObjectType::Blob)
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> anyhow::Result<Tree> {
        self.parse_typed(object_id, ObjectType::Tree)
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Commit> {
        self.parse_typed(object_id, ObjectType::Commit)
    }

    fn parse_typed<T: Unpackable>(
        &self,
        object_id: &ObjectId,
        expected: ObjectType,
    ) -> anyhow::Result<T> {
        let (found, payload) = self.load_payload(object_id)?;

        if found != expected {
            return Err(RepositoryError::UnexpectedObjectType {
                oid: object_id.clone(),
                expected,
                found,
            }
            .into());
        }

        T::deserialize(payload.as_ref()).map_err(|error| {
            RepositoryError::CorruptObject {
                oid: object_id.clone(),
                reason: format!("{error:#}"),
            }
            .into()
        })
    }

    /// Tree of a commit, flattened depth-first into file paths
    ///
    /// Directories never appear as entries of their own.
    pub fn flatten_commit_tree(&self, commit_oid: &ObjectId) -> anyhow::Result<FlatTree> {
        let commit = self.parse_object_as_commit(commit_oid)?;
        self.flatten_tree(commit.tree_oid())
    }

    pub fn flatten_tree(&self, tree_oid: &ObjectId) -> anyhow::Result<FlatTree> {
        let mut flat_tree = FlatTree::new();
        self.flatten_into(tree_oid, Path::new(""), &mut flat_tree)?;

        Ok(flat_tree)
    }

    fn flatten_into(
        &self,
        tree_oid: &ObjectId,
        prefix: &Path,
        flat_tree: &mut FlatTree,
    ) -> anyhow::Result<()> {
        let tree = self.parse_object_as_tree(tree_oid)?;

        for (name, entry) in tree.into_entries() {
            let path = prefix.join(name);

            if entry.is_tree() {
                self.flatten_into(&entry.oid, &path, flat_tree)?;
            } else {
                flat_tree.insert(path, entry);
            }
        }

        Ok(())
    }

    /// Hashes of every commit reachable from `oid`, newest first
    pub fn ancestors(&self, oid: ObjectId) -> impl Iterator<Item = anyhow::Result<ObjectId>> + '_ {
        RevList::new(self, [oid]).map(|item| item.map(|(oid, _)| oid))
    }

    fn read_object(&self, object_path: &Path) -> anyhow::Result<Bytes> {
        let object_content = std::fs::read(object_path).context(format!(
            "unable to read object file {}",
            object_path.display()
        ))?;

        Self::decompress(object_content.into())
    }

    fn write_object(&self, object_path: &Path, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .context(format!("invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .context(format!(
                "unable to open object file {}",
                temp_object_path.display()
            ))?;

        file.write_all(&object_content).context(format!(
            "unable to write object file {}",
            temp_object_path.display()
        ))?;

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, object_path).context(format!(
            "unable to rename object file to {}",
            object_path.display()
        ))?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }

    /// Find all objects whose hash starts with the given prefix
    ///
    /// Prefixes of 2+ characters only search their shard directory; shorter
    /// ones scan every shard.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();
        let mut matches = Vec::new();

        let shards = if prefix.len() >= 2 {
            vec![prefix[..2].to_string()]
        } else {
            (0..=255u8).map(|i| format!("{i:02x}")).collect()
        };

        for shard in shards {
            let dir_path = self.path.join(&shard);
            if !dir_path.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&dir_path)? {
                let file_name = entry?.file_name();
                let full_oid = format!("{}{}", shard, file_name.to_string_lossy());

                if full_oid.len() == OBJECT_ID_LENGTH && full_oid.starts_with(&prefix) {
                    // temp files left behind by an interrupted write are skipped here
                    if let Ok(oid) = ObjectId::try_parse(full_oid) {
                        matches.push(oid);
                    }
                }
            }
        }

        matches.sort();
        Ok(matches)
    }

    /// Expand a full or abbreviated hash to the single object it names
    pub fn find_object(&self, prefix: &str, min_length: usize) -> anyhow::Result<ObjectId> {
        if prefix.len() < min_length
            || prefix.len() > OBJECT_ID_LENGTH
            || !prefix.chars().all(|c| c.is_ascii_hexdigit())
        {
            anyhow::bail!("not a valid object name: {prefix}");
        }

        if prefix.len() == OBJECT_ID_LENGTH {
            let oid = ObjectId::try_parse(prefix.to_string())?;
            if !self.exists(&oid) {
                return Err(RepositoryError::ObjectNotFound { oid }.into());
            }
            return Ok(oid);
        }

        let mut candidates = self.find_objects_by_prefix(prefix)?;
        match candidates.len() {
            0 => anyhow::bail!("no object matches {prefix}"),
            1 => Ok(candidates.remove(0)),
            _ => Err(RepositoryError::AmbiguousObjectId {
                prefix: prefix.to_string(),
                candidates,
            }
            .into()),
        }
    }
}
