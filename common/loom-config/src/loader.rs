use crate::types::Config;
use loom_error::ConfigSnafu;
use loom_error::Result;
use std::path::Path;
use std::path::PathBuf;

/// Default compaction trigger when neither file nor environment sets one.
pub const DEFAULT_COMPACT_TOKEN_THRESHOLD: u32 = 150_000;

/// Built-in tool names a `disabled_tools` entry may legally reference.
/// Mirrors `loom_tools::ToolRegistry::with_builtins()`'s registered set;
/// kept as a plain list here rather than a dependency on `loom-tools` so
/// `loom-config` doesn't need to know how tools are implemented, only
/// what they're called.
const KNOWN_TOOL_NAMES: &[&str] = &["Bash", "Read", "Write", "Edit", "Glob", "Grep", "Task"];

/// Loads and merges configuration from defaults, user config, project
/// config, and environment overrides.
pub struct ConfigLoader {
    user_config_path: PathBuf,
    project_config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        let user_config_path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("loom")
            .join("config.toml");
        ConfigLoader {
            user_config_path,
            project_config_path: PathBuf::from("loom.toml"),
        }
    }

    pub fn with_project_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_config_path = path.into();
        self
    }

    /// Load and resolve the full configuration, applying environment
    /// overrides last. Parse errors from either file are collected into
    /// a single aggregated [`Error::Config`] rather than failing on the
    /// first bad file, since both files are user-editable independently.
    pub fn load(&self) -> Result<Config> {
        let mut errors = Vec::new();
        let mut config = Config::default();

        if let Some(user_cfg) = read_toml(&self.user_config_path, &mut errors) {
            config.merge_from(user_cfg);
        }
        if let Some(project_cfg) = read_toml(&self.project_config_path, &mut errors) {
            config.merge_from(project_cfg);
        }

        validate_disabled_tools(&config, &mut errors);

        if !errors.is_empty() {
            return Err(ConfigSnafu {
                message: errors.join("; "),
            }
            .build());
        }

        apply_env_overrides(&mut config);

        if config.compact_token_threshold.is_none() {
            config.compact_token_threshold = Some(DEFAULT_COMPACT_TOKEN_THRESHOLD);
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_toml(path: &Path, errors: &mut Vec<String>) -> Option<Config> {
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            errors.push(format!("{}: {e}", path.display()));
            return None;
        }
    };
    match toml::from_str(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            errors.push(format!("{}: {e}", path.display()));
            None
        }
    }
}

/// Collects one error per agent profile that names a disabled tool which
/// doesn't exist, so a typo'd tool name is caught at load time rather than
/// silently never taking effect.
fn validate_disabled_tools(config: &Config, errors: &mut Vec<String>) {
    for (agent_name, profile) in &config.agents {
        for tool_name in &profile.disabled_tools {
            if !KNOWN_TOOL_NAMES.contains(&tool_name.as_str()) {
                errors.push(format!(
                    "agent '{agent_name}' disables unknown tool '{tool_name}'"
                ));
            }
        }
    }
}

/// Apply `LOOM_<SECTION>_<KEY>` environment overrides. Only the handful
/// of scalar fields that make sense to flip from the shell are covered;
/// structural config (agents, MCP servers) is file-only.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(model) = std::env::var("LOOM_DEFAULT_MODEL") {
        config.default_model = Some(model);
    }
    if let Ok(mode) = std::env::var("LOOM_PERMISSIONS_MODE") {
        config.permissions.mode = Some(mode);
    }
    if let Ok(threshold) = std::env::var("LOOM_COMPACT_TOKEN_THRESHOLD") {
        if let Ok(parsed) = threshold.parse() {
            config.compact_token_threshold = Some(parsed);
        }
    }
}

/// Convenience entry point for callers that don't need to customize
/// config file locations.
pub fn load() -> Result<Config> {
    ConfigLoader::new().load()
}
