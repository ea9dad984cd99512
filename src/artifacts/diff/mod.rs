//! Tree comparison
//!
//! - `tree_diff`: file-level diffing of flattened trees, used to plan checkouts

pub mod tree_diff;
