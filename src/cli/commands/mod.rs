//! Subcommand handlers

pub mod infer;
pub mod read;
pub mod validate;
