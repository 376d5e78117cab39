//! The `settings` module loads the TOML settings file with environment
//! overrides. See `bin/settings_demo.rs` for a binary demonstrating its usage.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
