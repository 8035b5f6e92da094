//! Platform-specific data directory paths.
//!
//!   Windows: %APPDATA%/tts-server
//!   macOS:   ~/Library/Application Support/tts-server
//!   Linux:   $XDG_CONFIG_HOME/tts-server (default ~/.config)
//!
//! Synthesized audio does not live here; it goes to the system temp
//! directory so the OS can reclaim it if the server never sweeps.

use std::path::PathBuf;

const APP_DIR: &str = "tts-server";

/// Get the server data directory (cross-platform).
pub fn get_data_dir() -> PathBuf {
    get_config_base().join(APP_DIR)
}

/// Directory for rolling log files.
pub fn get_log_dir() -> PathBuf {
    get_data_dir().join("logs")
}

/// Default audio store directory: `<temp>/tts_audio`.
pub fn default_audio_dir() -> PathBuf {
    std::env::temp_dir().join("tts_audio")
}

/// Get the platform-appropriate base config directory.
fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("AppData")
                .join("Roaming")
        })
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_dir_is_under_temp() {
        let dir = default_audio_dir();
        assert!(dir.starts_with(std::env::temp_dir()));
        assert!(dir.ends_with("tts_audio"));
    }

    #[test]
    fn test_log_dir_is_under_data_dir() {
        assert!(get_log_dir().starts_with(get_data_dir()));
    }
}
