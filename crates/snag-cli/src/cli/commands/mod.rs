//! CLI command handlers, one per file.

mod config_path;
mod extract;
mod run;

pub use config_path::run_config_path;
pub use extract::run_extract;
pub use run::{run_pipeline, CorruptMode};
