use std::path::PathBuf;

/// Environment variable that relocates the settings directory.
pub const CONFIG_DIR_ENV: &str = "PXC_CONFIG_DIR";

/// Settings directory: `$PXC_CONFIG_DIR` or `~/.config/pxc/`
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pxc")
}

/// Current-format settings document: `<config dir>/config.toml`
pub fn settings_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Legacy JSON settings written by the old `pve-cli` tool, a sibling of the
/// settings directory: `~/.config/pve-cli/config.json`
pub fn legacy_settings_path() -> PathBuf {
    let dir = config_dir();
    dir.parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pve-cli")
        .join("config.json")
}

/// Operation log: `~/.local/share/pxc/pxc.log`
pub fn log_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pxc")
        .join("pxc.log")
}
