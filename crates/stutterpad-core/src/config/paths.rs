//! Standard paths for stutterpad files

use std::path::PathBuf;

/// Base directory for stutterpad configuration
///
/// Returns the platform config dir (e.g. `~/.config/stutterpad` on
/// Linux), falling back to the current directory if the platform dir
/// cannot be determined.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stutterpad")
}

/// Path of the main settings file: `{config_dir}/settings.yaml`
pub fn settings_path() -> PathBuf {
    config_dir().join("settings.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_app_name() {
        assert!(config_dir().ends_with("stutterpad"));
    }

    #[test]
    fn test_settings_path_filename() {
        assert!(settings_path().ends_with("settings.yaml"));
    }
}
