//! Lightweight shell command parsing and risk analysis used by the Bash
//! tool's permission check. Not a full shell grammar — just enough
//! tokenization to flag the patterns the Permission Gate cares about.

pub mod security;

pub use security::RiskKind;
pub use security::RiskLevel;
pub use security::RiskPhase;
pub use security::SecurityAnalysis;
pub use security::SecurityRiskFinding;

/// Split `command` into shell words and run the security heuristics over
/// it, resolving path-taking commands' arguments against `cwd`. Returns
/// the parsed words (best-effort; unparsable input yields an empty word
/// list but a still-useful analysis over the raw string) and the risk
/// analysis.
pub fn parse_and_analyze(command: &str, cwd: &std::path::Path) -> (Vec<String>, SecurityAnalysis) {
    let words = shlex::split(command).unwrap_or_default();
    let analysis = security::analyze(command, &words, cwd);
    (words, analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_command_into_words() {
        let (words, _) = parse_and_analyze("ls -la /tmp", std::path::Path::new("/tmp"));
        assert_eq!(words, vec!["ls", "-la", "/tmp"]);
    }
}
