//! Repository data structures and algorithms
//!
//! - `branch`: Reference names and revision parsing
//! - `checkout`: Checkout planning and conflict detection
//! - `database`: Tree entry types
//! - `diff`: Flattened tree comparison
//! - `index`: Index file format
//! - `log`: Commit history traversal
//! - `objects`: Object types (blob, tree, commit)
//! - `status`: Working tree status inspection

pub mod branch;
pub mod checkout;
pub mod database;
pub mod diff;
pub mod index;
pub mod log;
pub mod objects;
pub mod status;
