use crate::error::BuildSnafu;
use crate::error::Result;
use std::path::PathBuf;
use std::process::Command;

/// A snapshot of the runtime environment, rendered into the System
/// Prompt's Environment section. Git branch detection shells out to
/// `git branch --show-current` and is best-effort: any failure (not a
/// repo, `git` missing) simply leaves `git_branch` as `None`.
#[derive(Debug, Clone)]
pub struct EnvironmentInfo {
    pub platform: String,
    pub os_version: Option<String>,
    pub cwd: PathBuf,
    pub is_git_repo: bool,
    pub git_branch: Option<String>,
    pub date: String,
    pub model: String,
    pub context_window: i32,
    pub max_output_tokens: i32,
    pub language_preference: Option<String>,
}

impl EnvironmentInfo {
    pub fn builder() -> EnvironmentInfoBuilder {
        EnvironmentInfoBuilder::default()
    }

    /// Build from the real process environment and git state for `cwd`.
    pub fn detect(cwd: PathBuf, model: impl Into<String>) -> Result<Self> {
        let is_git_repo = cwd.join(".git").exists();
        let git_branch = if is_git_repo {
            current_git_branch(&cwd)
        } else {
            None
        };
        EnvironmentInfo::builder()
            .cwd(cwd)
            .model(model)
            .is_git_repo(is_git_repo)
            .git_branch(git_branch)
            .build()
    }
}

fn current_git_branch(cwd: &std::path::Path) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(cwd)
        .args(["branch", "--show-current"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8(output.stdout).ok()?.trim().to_string();
    if branch.is_empty() { None } else { Some(branch) }
}

#[derive(Debug, Default)]
pub struct EnvironmentInfoBuilder {
    platform: Option<String>,
    os_version: Option<String>,
    cwd: Option<PathBuf>,
    is_git_repo: bool,
    git_branch: Option<String>,
    date: Option<String>,
    model: Option<String>,
    context_window: Option<i32>,
    max_output_tokens: Option<i32>,
    language_preference: Option<String>,
}

impl EnvironmentInfoBuilder {
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn os_version(mut self, os_version: impl Into<String>) -> Self {
        self.os_version = Some(os_version.into());
        self
    }

    pub fn cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    pub fn is_git_repo(mut self, is_git_repo: bool) -> Self {
        self.is_git_repo = is_git_repo;
        self
    }

    pub fn git_branch(mut self, git_branch: Option<String>) -> Self {
        self.git_branch = git_branch;
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn context_window(mut self, context_window: i32) -> Self {
        self.context_window = Some(context_window);
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: i32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn language_preference(mut self, language_preference: impl Into<String>) -> Self {
        self.language_preference = Some(language_preference.into());
        self
    }

    pub fn build(self) -> Result<EnvironmentInfo> {
        let cwd = self.cwd.ok_or_else(|| {
            BuildSnafu {
                message: "cwd is required",
            }
            .build()
        })?;
        let model = self.model.ok_or_else(|| {
            BuildSnafu {
                message: "model is required",
            }
            .build()
        })?;
        Ok(EnvironmentInfo {
            platform: self.platform.unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: self.os_version,
            cwd,
            is_git_repo: self.is_git_repo,
            git_branch: self.git_branch,
            date: self
                .date
                .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string()),
            model,
            context_window: self.context_window.unwrap_or(200_000),
            max_output_tokens: self.max_output_tokens.unwrap_or(16_384),
            language_preference: self.language_preference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_cwd_and_model() {
        let result = EnvironmentInfo::builder().model("gpt").build();
        assert!(result.is_err());
    }

    #[test]
    fn build_defaults_platform_and_context_window() {
        let env = EnvironmentInfo::builder()
            .cwd(PathBuf::from("/tmp"))
            .model("gpt")
            .build()
            .unwrap();
        assert_eq!(env.platform, std::env::consts::OS);
        assert_eq!(env.context_window, 200_000);
        assert_eq!(env.max_output_tokens, 16_384);
    }
}
