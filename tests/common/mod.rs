#![allow(dead_code)]

pub mod command;
pub mod file;

use std::sync::Once;

static AUTHOR_ENV: Once = Once::new();

pub const AUTHOR_NAME: &str = "fake_user";
pub const AUTHOR_EMAIL: &str = "fake_email@email.com";

/// Author identity for commits made through the library
///
/// Every test sets the same values, and only once per test binary.
pub fn set_author_env() {
    AUTHOR_ENV.call_once(|| unsafe {
        std::env::set_var("GIT_AUTHOR_NAME", AUTHOR_NAME);
        std::env::set_var("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL);
    });
}
