//! A minimal content-addressed version-control engine
//!
//! - `areas`: the on-disk stores (objects, index, refs, working tree) and the
//!   `Repository` handle that ties them together
//! - `artifacts`: data types and algorithms built on top of the stores
//! - `commands`: plumbing and porcelain operations on a `Repository`
//! - `errors`: typed repository failures

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;
