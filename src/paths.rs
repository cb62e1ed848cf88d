use std::path::{Path, PathBuf};

/// Root directory for nerdvm data, `~/.nerdvm`.
///
/// Falls back to a relative `.nerdvm` when no home directory is known.
pub fn default_root_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".nerdvm"))
        .unwrap_or_else(|| PathBuf::from(".nerdvm"))
}

/// Directory Lima keeps its instances in, exported as `LIMA_HOME`.
pub fn lima_home(root: &Path) -> PathBuf {
    root.join("lima").join("data")
}
