use std::path::Path;

/// Filenames and directory components that Read/Write/Edit/Grep refuse
/// to touch even under `PermissionMode::AcceptEdits` or `BypassPermissions`
/// — a call against one of these always routes through the Permission
/// Gate's Ask phase, regardless of mode.
const SENSITIVE_FILENAMES: &[&str] = &[
    ".env",
    ".env.local",
    ".env.production",
    "id_rsa",
    "id_ed25519",
    "credentials.json",
    "secrets.yaml",
    "secrets.yml",
];

const SENSITIVE_DIR_COMPONENTS: &[&str] = &[".ssh", ".aws", ".gnupg"];

/// Directories no tool may write into regardless of permission mode —
/// not even with an explicit Ask approval. Distinct from "sensitive":
/// these are a hard stop, not an escalation.
const LOCKED_DIR_COMPONENTS: &[&str] = &[".git"];

pub fn is_sensitive_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if SENSITIVE_FILENAMES.iter().any(|candidate| *candidate == name) {
            return true;
        }
        if name.ends_with(".pem") || name.ends_with(".key") {
            return true;
        }
    }
    is_sensitive_directory(path)
}

pub fn is_sensitive_directory(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|segment| SENSITIVE_DIR_COMPONENTS.contains(&segment))
            .unwrap_or(false)
    })
}

pub fn is_locked_directory(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|segment| LOCKED_DIR_COMPONENTS.contains(&segment))
            .unwrap_or(false)
    })
}

/// `true` if `path` (assumed already canonical/resolved) does not live
/// under `cwd`. Used to route any out-of-project-tree write through the
/// Permission Gate's Ask phase.
pub fn is_outside_cwd(path: &Path, cwd: &Path) -> bool {
    !path.starts_with(cwd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn dotenv_is_sensitive() {
        assert!(is_sensitive_file(&PathBuf::from("/work/.env")));
    }

    #[test]
    fn ssh_dir_is_sensitive() {
        assert!(is_sensitive_file(&PathBuf::from("/home/user/.ssh/config")));
    }

    #[test]
    fn git_dir_is_locked_but_not_sensitive() {
        let path = PathBuf::from("/work/.git/config");
        assert!(is_locked_directory(&path));
        assert!(!is_sensitive_file(&path));
    }

    #[test]
    fn ordinary_source_file_is_neither() {
        let path = PathBuf::from("/work/src/main.rs");
        assert!(!is_sensitive_file(&path));
        assert!(!is_locked_directory(&path));
    }

    #[test]
    fn outside_cwd_detects_escape() {
        let cwd = PathBuf::from("/work");
        assert!(is_outside_cwd(&PathBuf::from("/etc/passwd"), &cwd));
        assert!(!is_outside_cwd(&PathBuf::from("/work/src/lib.rs"), &cwd));
    }
}
