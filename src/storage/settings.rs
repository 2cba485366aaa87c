use crate::models::settings::AppConfig;
use crate::storage::{read_json, write_json, AppPaths};

/// Read application settings. Returns defaults if the file is missing or
/// unreadable; a missing file is created with the defaults.
pub fn get_settings(paths: &AppPaths) -> crate::error::Result<AppConfig> {
    let path = paths.config_file();
    match read_json::<AppConfig>(&path) {
        Ok(Some(config)) => Ok(config),
        Ok(None) => {
            let config = AppConfig::default();
            save_settings(paths, &config)?;
            log::info!("Created default configuration at {}", path.display());
            Ok(config)
        }
        Err(e) => {
            log::warn!("Ignoring unreadable configuration: {}", e);
            Ok(AppConfig::default())
        }
    }
}

/// Save application settings. Persists to disk immediately.
pub fn save_settings(paths: &AppPaths, settings: &AppConfig) -> crate::error::Result<()> {
    write_json(&paths.config_file(), settings)
}

/// Load, apply `change`, and persist in one step.
pub fn update_settings<F>(paths: &AppPaths, change: F) -> crate::error::Result<AppConfig>
where
    F: FnOnce(&mut AppConfig) -> crate::error::Result<()>,
{
    let mut settings = get_settings(paths)?;
    change(&mut settings)?;
    save_settings(paths, &settings)?;
    Ok(settings)
}
