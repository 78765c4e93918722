//! Command implementations for the Omphalos CLI

pub mod check;
pub mod completions;
pub mod helpers;
pub mod serve;
pub mod version;
