//! Subcommand implementations.

pub mod add;
pub mod index;
pub mod scan;
