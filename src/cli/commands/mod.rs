//! CLI command implementations

pub mod apply;
pub mod completions;
pub mod init;
pub mod recipe;
pub mod run;
