//! Analysis subcommands.

pub mod ac;
pub mod dc;
pub mod transient;
