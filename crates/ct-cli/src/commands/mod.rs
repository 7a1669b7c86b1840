//! CLI subcommand implementations.

pub mod history;
pub mod migrate;
pub mod reset;
pub mod seed;
pub mod status;
pub mod toggle;
pub mod util;
