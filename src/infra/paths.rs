// src/infra/paths.rs — Path management
//
// All paths respect the PROMPTLOOP_HOME environment variable for isolation.
// When PROMPTLOOP_HOME is set, config lives directly under that directory.
// When unset, config uses ~/.promptloop/.

use std::path::{Path, PathBuf};

/// Returns the PROMPTLOOP_HOME override, if set.
fn promptloop_home() -> Option<PathBuf> {
    std::env::var_os("PROMPTLOOP_HOME").map(PathBuf::from)
}

/// Home directory, or the current directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $PROMPTLOOP_HOME/ or ~/.promptloop/
pub fn config_dir() -> PathBuf {
    if let Some(home) = promptloop_home() {
        return home;
    }
    dirs_home().join(".promptloop")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Resolve a configured directory: absolute paths are kept, relative ones
/// are taken relative to the current working directory.
pub fn resolve_dir(configured: &str) -> PathBuf {
    let p = Path::new(configured);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

/// Directory holding one template's optimization session.
/// Template names may contain a single `user/` style prefix.
pub fn session_dir(workspace: &Path, template_name: &str) -> PathBuf {
    workspace.join(template_name)
}

/// Directory holding round records for a session.
pub fn prompts_dir(session_dir: &Path) -> PathBuf {
    session_dir.join("prompts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_dir_absolute() {
        let abs = if cfg!(windows) { "C:\\tmp\\ws" } else { "/tmp/ws" };
        assert_eq!(resolve_dir(abs), PathBuf::from(abs));
    }

    #[test]
    fn test_resolve_dir_relative() {
        let resolved = resolve_dir("workspace");
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("workspace"));
    }

    #[test]
    fn test_session_and_prompts_dir() {
        let ws = PathBuf::from("/tmp/ws");
        let session = session_dir(&ws, "user/poem");
        assert_eq!(session, PathBuf::from("/tmp/ws/user/poem"));
        assert_eq!(prompts_dir(&session), PathBuf::from("/tmp/ws/user/poem/prompts"));
    }

    #[test]
    fn test_config_file_name() {
        assert!(config_file_path().ends_with("config.toml"));
    }
}
