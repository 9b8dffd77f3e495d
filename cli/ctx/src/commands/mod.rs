//! CLI command implementations.

pub mod add;
pub mod init;
pub mod install;
pub mod status;
pub mod tree;
