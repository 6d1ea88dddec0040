//! CLI command handlers. Each handler takes the composition root's
//! stores directly rather than a god-object `Services` struct, matching
//! the Design Notes (§9) instruction to pass explicit collaborators
//! from the root instead of module-level singletons.

mod auth;
mod config;
mod import;
mod library;
mod track;

pub use auth::run_auth_set_password;
pub use config::run_config_show;
pub use import::run_import;
pub use library::run_library_list;
pub use track::{run_track_add, run_track_list, run_track_remove};
