//! Command handlers for CLI subcommands
//!
//! Each subcommand lives in its own module; shared file loading and
//! option merging live in `utils`.

mod batch;
mod completions;
mod config;
mod render;
mod resolve;
mod utils;
mod validate;

pub use batch::handle_batch;
pub use completions::handle_completions;
pub use config::handle_config;
pub use render::handle_render;
pub use resolve::handle_resolve;
pub use validate::handle_validate;
