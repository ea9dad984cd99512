//! Porcelain commands (user-facing operations)
//!
//! Porcelain commands compose the storage areas into the everyday workflow.
//! They return structured results and leave rendering to the binary.
//!
//! ## Commands
//!
//! - `init`: Initialize a new repository
//! - `add`: Stage files for commit
//! - `rm --cached`: Unstage files
//! - `commit`: Create a new commit
//! - `status`: Show working tree status
//! - `log`: Show commit history
//! - `branch`: Create, list, or delete branches
//! - `tag`: Create or list lightweight tags
//! - `checkout`: Move HEAD, the index and the working tree to a commit
//! - `switch`: Check out (and optionally create) a branch

pub mod add;
pub mod branch;
pub mod checkout;
pub mod commit;
pub mod init;
pub mod log;
pub mod rm;
pub mod status;
pub mod switch;
pub mod tag;
