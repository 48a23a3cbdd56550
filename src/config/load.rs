use super::{default_global_config_path, ConfigError, Settings};
use std::path::Path;

/// Loads settings from `explicit` (which must exist) or the default config path (optional),
/// overlays the process environment and validates the result.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut settings = match explicit {
        Some(path) => Settings::from_path(path)?,
        None => {
            let path = default_global_config_path()?;
            if path.exists() {
                Settings::from_path(&path)?
            } else {
                Settings::default()
            }
        }
    };
    settings.apply_env_overrides()?;
    settings.validate()?;
    Ok(settings)
}
