//! CLI command implementations.

pub mod compact;
pub mod export;
pub mod inspect;
pub mod prune;
