use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;

/// Root configuration document, deserialized from `loom.toml`.
///
/// Every field is optional on the wire; [`ConfigLoader`](crate::ConfigLoader)
/// fills in defaults and merges overrides before handing callers a fully
/// resolved `Config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub permissions: PermissionsConfig,
    #[serde(default)]
    pub agents: HashMap<String, AgentProfileConfig>,
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerEntry>,
    #[serde(default)]
    pub compact_token_threshold: Option<u32>,
}

impl Config {
    /// Overlay `other` onto `self`, with `other` taking precedence field
    /// by field. Used to cascade file config under environment overrides.
    pub fn merge_from(&mut self, other: Config) {
        if other.default_model.is_some() {
            self.default_model = other.default_model;
        }
        if other.compact_token_threshold.is_some() {
            self.compact_token_threshold = other.compact_token_threshold;
        }
        self.permissions.merge_from(other.permissions);
        self.agents.extend(other.agents);
        self.mcp_servers.extend(other.mcp_servers);
    }
}

/// `permissions.*` as written in `loom.toml`:
///
/// ```toml
/// [permissions]
/// mode = "default"
/// bash = "ask"
/// write = "allow"
/// doom_loop = "ask"
/// allow = ["Bash(git status:*)"]
/// deny = ["Write(/etc/**)"]
/// ```
///
/// `allow`/`deny` entries are `"ToolName(pattern)"` pairs resolved into
/// [`loom_protocol::PermissionRuleSpec`]s; `bash`/`write`/`doom_loop` are
/// resolved into a [`loom_protocol::CategoryPermissions`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub bash: Option<String>,
    #[serde(default)]
    pub write: Option<String>,
    #[serde(default)]
    pub doom_loop: Option<String>,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

impl PermissionsConfig {
    pub fn merge_from(&mut self, other: PermissionsConfig) {
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.bash.is_some() {
            self.bash = other.bash;
        }
        if other.write.is_some() {
            self.write = other.write;
        }
        if other.doom_loop.is_some() {
            self.doom_loop = other.doom_loop;
        }
        self.allow.extend(other.allow);
        self.deny.extend(other.deny);
    }

    pub fn category_permissions(&self) -> loom_protocol::CategoryPermissions {
        let defaults = loom_protocol::CategoryPermissions::default();
        loom_protocol::CategoryPermissions {
            bash: parse_category_policy(self.bash.as_deref()).unwrap_or(defaults.bash),
            write: parse_category_policy(self.write.as_deref()).unwrap_or(defaults.write),
            doom_loop: parse_category_policy(self.doom_loop.as_deref()).unwrap_or(defaults.doom_loop),
        }
    }

    pub fn permission_rules(&self) -> Vec<loom_protocol::PermissionRuleSpec> {
        let allow = self
            .allow
            .iter()
            .filter_map(|entry| parse_rule(entry, loom_protocol::CategoryPolicy::Allow));
        let deny = self
            .deny
            .iter()
            .filter_map(|entry| parse_rule(entry, loom_protocol::CategoryPolicy::Deny));
        allow.chain(deny).collect()
    }
}

fn parse_category_policy(value: Option<&str>) -> Option<loom_protocol::CategoryPolicy> {
    match value? {
        "allow" => Some(loom_protocol::CategoryPolicy::Allow),
        "deny" => Some(loom_protocol::CategoryPolicy::Deny),
        "ask" => Some(loom_protocol::CategoryPolicy::Ask),
        _ => None,
    }
}

/// Parses one `"ToolName(pattern)"` allow/deny entry into a rule spec.
/// Malformed entries (missing parens) are silently dropped rather than
/// failing config load, since a typo'd single rule shouldn't block
/// startup.
fn parse_rule(entry: &str, action: loom_protocol::CategoryPolicy) -> Option<loom_protocol::PermissionRuleSpec> {
    let open = entry.find('(')?;
    let close = entry.rfind(')')?;
    if close <= open {
        return None;
    }
    Some(loom_protocol::PermissionRuleSpec {
        tool_name: entry[..open].to_string(),
        pattern: entry[open + 1..close].to_string(),
        action,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfileConfig {
    pub system_prompt_file: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub disabled_tools: Vec<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpServerEntry {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_from_overrides_only_set_fields() {
        let mut base = Config {
            default_model: Some("base-model".to_string()),
            compact_token_threshold: Some(100_000),
            ..Default::default()
        };
        let overlay = Config {
            default_model: None,
            compact_token_threshold: Some(150_000),
            ..Default::default()
        };
        base.merge_from(overlay);
        assert_eq!(base.default_model.as_deref(), Some("base-model"));
        assert_eq!(base.compact_token_threshold, Some(150_000));
    }

    #[test]
    fn category_permissions_parses_configured_policies_and_defaults_unset_to_ask() {
        let permissions = PermissionsConfig {
            bash: Some("allow".to_string()),
            write: Some("deny".to_string()),
            ..Default::default()
        };
        let resolved = permissions.category_permissions();
        assert_eq!(resolved.bash, loom_protocol::CategoryPolicy::Allow);
        assert_eq!(resolved.write, loom_protocol::CategoryPolicy::Deny);
        assert_eq!(resolved.doom_loop, loom_protocol::CategoryPolicy::Ask);
    }

    #[test]
    fn permission_rules_parses_tool_name_and_pattern_from_allow_deny_entries() {
        let permissions = PermissionsConfig {
            allow: vec!["Bash(git status:*)".to_string()],
            deny: vec!["Write(/etc/**)".to_string()],
            ..Default::default()
        };
        let rules = permissions.permission_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].tool_name, "Bash");
        assert_eq!(rules[0].pattern, "git status:*");
        assert_eq!(rules[0].action, loom_protocol::CategoryPolicy::Allow);
        assert_eq!(rules[1].tool_name, "Write");
        assert_eq!(rules[1].pattern, "/etc/**");
        assert_eq!(rules[1].action, loom_protocol::CategoryPolicy::Deny);
    }
}
