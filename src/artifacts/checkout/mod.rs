//! Checkout planning and conflict handling
//!
//! Moving to another commit diffs its tree against the index, checks every
//! touched path for local work that would be lost, then rewrites the working
//! tree and the index. Nothing is written while conflicts remain.

pub mod conflict;
pub mod migration;
