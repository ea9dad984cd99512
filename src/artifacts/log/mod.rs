//! Commit history traversal
//!
//! The walk uses a priority queue ordered by commit timestamp with a visited
//! set, so merge-shaped histories yield every commit exactly once.

pub mod rev_list;
