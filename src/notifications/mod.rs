//! Notifications module
//!
//! Provides:
//! - GitHub pull request coverage comments

mod github;

pub use github::*;
