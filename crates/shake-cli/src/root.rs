use anyhow::Context;
use shake_core::config::Config;
use shake_core::paths::config_path;
use std::path::{Path, PathBuf};

/// The loaded configuration and the directory its relative paths hang off.
pub struct Workspace {
    pub root: PathBuf,
    /// `None` when running on built-in defaults.
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

/// Locate the config file.
///
/// Priority:
/// 1. `--config` flag / `SHAKEFETCH_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `shakefetch.yaml`
pub fn find_config(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    cwd.ancestors()
        .map(config_path)
        .find(|candidate| candidate.is_file())
}

/// Load the workspace, falling back to defaults rooted at the cwd.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Workspace> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let Some(path) = find_config(explicit, &cwd) else {
        return Ok(Workspace {
            root: cwd,
            config_path: None,
            config: Config::default(),
        });
    };
    let config = Config::load(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    let root = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => cwd,
    };
    Ok(Workspace {
        root,
        config_path: Some(path),
        config,
    })
}

/// Where `config init` writes when no path is given.
pub fn init_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => p.to_path_buf(),
        None => config_path(&std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shake_core::paths::CONFIG_FILE;
    use tempfile::TempDir;

    #[test]
    fn explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("elsewhere.yaml");
        assert_eq!(
            find_config(Some(&explicit), dir.path()),
            Some(explicit.clone())
        );
    }

    #[test]
    fn walks_upward_to_nearest_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        let deep = dir.path().join("a/b/c");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(
            find_config(None, &deep),
            Some(dir.path().join(CONFIG_FILE))
        );

        std::fs::write(deep.join(CONFIG_FILE), "{}").unwrap();
        assert_eq!(find_config(None, &deep), Some(deep.join(CONFIG_FILE)));
    }

    #[test]
    fn no_config_found() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("x");
        std::fs::create_dir_all(&deep).unwrap();
        // Ancestors above the tempdir are outside our control; only check
        // that nothing inside it is picked up.
        if let Some(found) = find_config(None, &deep) {
            assert!(!found.starts_with(dir.path()));
        }
    }
}
