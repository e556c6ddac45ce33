//! CLI command implementations

pub mod init;
pub mod refine;
pub mod reportability;
pub mod validate;
