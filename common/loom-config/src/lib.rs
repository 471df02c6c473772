//! Configuration document and loader for the loom runtime.
//!
//! Resolution order (lowest to highest precedence): hard-coded defaults,
//! `~/.config/loom/config.toml`, `./loom.toml` in the current working
//! directory, then `LOOM_<SECTION>_<KEY>` environment variables.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use loader::load;
pub use types::AgentProfileConfig;
pub use types::Config;
pub use types::McpServerEntry;
pub use types::PermissionsConfig;
