//! Platform-specific paths for the store and preference files

use std::path::{Path, PathBuf};

const APP_DIR: &str = "LoginBridge";

/// Get the platform-specific data directory for storing application data
///
/// Returns:
/// - Windows: %LOCALAPPDATA%\LoginBridge
/// - macOS: ~/Library/Application Support/LoginBridge
/// - Linux/Other: ~/.local/share/LoginBridge
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Get the platform-specific config directory
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Default credential store database path
pub fn get_default_store_path() -> PathBuf {
    get_data_dir().join("logins.db")
}

/// Default secured preferences file
pub fn get_default_preferences_path() -> PathBuf {
    get_data_dir().join("secure_prefs.json")
}

/// Default device key protecting the preferences file
pub fn get_default_device_key_path() -> PathBuf {
    get_data_dir().join("device.key")
}

/// Default config file location
pub fn get_default_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Create the directory a file will live in
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
