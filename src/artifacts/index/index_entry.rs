//! Index entry representation
//!
//! Each entry in the index represents a tracked file with:
//! - File path
//! - Content hash (object ID)
//! - File metadata (mode, size, timestamps)
//!
//! Metadata includes both file status (mode, size) and timestamps (mtime,
//! ctime), which enable fast change detection without reading file content.

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::anyhow;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use is_executable::IsExecutable;
use std::cmp::min;
use std::fs::Metadata;
use std::io::{BufRead, Write};
use std::os::unix::prelude::MetadataExt;
use std::path::{Path, PathBuf};

/// Path lengths above this are stored as this value in the flags
const MAX_PATH_SIZE: usize = 0xFFF;

/// Stage number occupies bits 12 and 13 of the flags
const STAGE_SHIFT: u32 = 12;
const STAGE_MASK: u32 = 0x3;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Minimum size of an index entry in bytes
pub const ENTRY_MIN_SIZE: usize = 64;

/// Size of the fixed part preceding the path
const ENTRY_FIXED_SIZE: usize = 62;

/// Index entry representing a tracked file
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexEntry {
    /// File path relative to repository root
    pub name: PathBuf,
    /// Hash of the staged blob
    pub oid: ObjectId,
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn basename(&self) -> anyhow::Result<&str> {
        self.name
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("invalid file name {}", self.name.display()))
    }

    /// Ancestor directories, outermost first, excluding the root
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs = self
            .name
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect::<Vec<_>>();
        dirs.reverse();

        dirs
    }

    pub fn mode(&self) -> EntryMode {
        self.metadata.mode
    }

    /// Merge stage, 0 for a normal entry
    pub fn stage(&self) -> u8 {
        ((self.metadata.flags >> STAGE_SHIFT) & STAGE_MASK) as u8
    }

    /// Sizes are compared on their low 32 bits, the width the index stores
    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.size as u32 == other.size as u32 && self.metadata.mode == other.mode
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    fn flags(&self, name_len: usize) -> u16 {
        let stage = self.metadata.flags & (STAGE_MASK << STAGE_SHIFT);
        (stage | min(name_len, MAX_PATH_SIZE) as u32) as u16
    }
}

/// File metadata stored in index entries
///
/// ## Timestamps
///
/// - `ctime`: File status change time (inode modification)
/// - `mtime`: File content modification time
///
/// Both include nanosecond precision for accurate change detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    /// Stage bits; the path length part is derived when writing
    pub flags: u32,
}

impl Packable for IndexEntry {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let entry_name = self
            .name
            .to_str()
            .ok_or_else(|| anyhow!("invalid entry name {}", self.name.display()))?;

        let mut entry_bytes = Vec::with_capacity(ENTRY_MIN_SIZE + entry_name.len());
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.dev as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ino as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mode.as_u32())?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.uid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.gid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_h40_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<byteorder::NetworkEndian>(self.flags(entry_name.len()))?;
        entry_bytes.write_all(entry_name.as_bytes())?;

        // at least one NUL, then pad to the block size
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl Unpackable for IndexEntry {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(anyhow!("entry shorter than {ENTRY_MIN_SIZE} bytes"));
        }

        let read_u32 = |offset: usize| byteorder::NetworkEndian::read_u32(&bytes[offset..offset + 4]);

        let mode = EntryMode::try_from(read_u32(24))?;
        let mut oid_bytes = &bytes[40..60];
        let oid = ObjectId::read_h40_from(&mut oid_bytes)?;
        let flags = byteorder::NetworkEndian::read_u16(&bytes[60..62]) as u32
            & (STAGE_MASK << STAGE_SHIFT);

        let name_end = bytes[ENTRY_FIXED_SIZE..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow!("missing NUL terminator in entry name"))?;
        let name_bytes = &bytes[ENTRY_FIXED_SIZE..ENTRY_FIXED_SIZE + name_end];
        if name_bytes.is_empty() {
            return Err(anyhow!("empty entry name"));
        }
        let name = PathBuf::from(
            std::str::from_utf8(name_bytes).map_err(|_| anyhow!("invalid UTF-8 in entry name"))?,
        );

        Ok(IndexEntry {
            name,
            oid,
            metadata: EntryMetadata {
                ctime: read_u32(0) as i64,
                ctime_nsec: read_u32(4) as i64,
                mtime: read_u32(8) as i64,
                mtime_nsec: read_u32(12) as i64,
                dev: read_u32(16) as u64,
                ino: read_u32(20) as u64,
                mode,
                uid: read_u32(28),
                gid: read_u32(32),
                size: read_u32(36) as u64,
                flags,
            },
        })
    }
}

impl EntryMetadata {
    /// Stat cache for a workspace path, from its `symlink_metadata`
    pub fn from_stat(file_path: &Path, metadata: &Metadata) -> Self {
        let mode = if metadata.is_dir() {
            EntryMode::Directory
        } else if metadata.file_type().is_symlink() {
            EntryMode::Symlink
        } else if file_path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };

        Self {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
            flags: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn oid() -> ObjectId {
        ObjectId::digest(b"blob 9\0test data")
    }

    #[fixture]
    fn entry_metadata() -> EntryMetadata {
        EntryMetadata {
            mtime: 1_700_000_000,
            size: 9,
            ..Default::default()
        }
    }

    #[rstest]
    fn parent_dirs_are_outermost_first(oid: ObjectId, entry_metadata: EntryMetadata) {
        let entry = IndexEntry::new(PathBuf::from("a/b/c"), oid, entry_metadata);

        assert_eq!(entry.parent_dirs(), vec![Path::new("a"), Path::new("a/b")]);
    }

    #[rstest]
    fn top_level_entry_has_no_parents(oid: ObjectId, entry_metadata: EntryMetadata) {
        let entry = IndexEntry::new(PathBuf::from("a"), oid, entry_metadata);

        assert_eq!(entry.parent_dirs(), Vec::<&Path>::new());
        assert_eq!(entry.basename().unwrap(), "a");
    }

    #[rstest]
    #[case("a")]
    #[case("ab")]
    #[case("exactly-ten")]
    #[case("some/deeply/nested/path/to/a/file.txt")]
    fn entries_are_padded_to_blocks(
        oid: ObjectId,
        entry_metadata: EntryMetadata,
        #[case] name: &str,
    ) {
        let entry = IndexEntry::new(PathBuf::from(name), oid, entry_metadata);

        let bytes = entry.serialize().unwrap();

        assert_eq!(bytes.len() % ENTRY_BLOCK, 0);
        assert_eq!(bytes[bytes.len() - 1], 0);
        assert_eq!(IndexEntry::deserialize(bytes.as_ref()).unwrap(), entry);
    }

    #[rstest]
    fn large_file_sizes_match_after_reload(oid: ObjectId, entry_metadata: EntryMetadata) {
        let on_disk = EntryMetadata {
            size: (4 << 30) + 5,
            ..entry_metadata
        };
        let entry = IndexEntry::new(PathBuf::from("big.bin"), oid, on_disk.clone());

        let reloaded = IndexEntry::deserialize(entry.serialize().unwrap().as_ref()).unwrap();

        assert_eq!(reloaded.metadata.size, 5);
        assert!(reloaded.stat_match(&on_disk));
        assert!(!reloaded.stat_match(&EntryMetadata { size: 6, ..on_disk }));
    }

    #[rstest]
    fn stage_is_read_from_flags(oid: ObjectId, entry_metadata: EntryMetadata) {
        let mut entry = IndexEntry::new(PathBuf::from("conflicted"), oid, entry_metadata);
        entry.metadata.flags = 2 << STAGE_SHIFT;

        let bytes = entry.serialize().unwrap();
        let parsed = IndexEntry::deserialize(bytes.as_ref()).unwrap();

        assert_eq!(parsed.stage(), 2);
        let raw_flags = byteorder::NetworkEndian::read_u16(&bytes[60..62]);
        assert_eq!(raw_flags, (2 << STAGE_SHIFT) | "conflicted".len() as u16);
    }
}
