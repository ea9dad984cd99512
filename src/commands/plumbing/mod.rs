//! Plumbing commands (low-level operations)
//!
//! Plumbing commands provide direct access to the object store and the
//! index. They're primarily used for scripting and debugging.
//!
//! ## Commands
//!
//! - `hash-object`: Compute an object ID and optionally store the object
//! - `cat-file`: Print an object's payload, size, type or pretty form
//! - `ls-files`: List index entries
//! - `ls-tree`: List contents of a tree object

pub mod cat_file;
pub mod hash_object;
pub mod ls_files;
pub mod ls_tree;
