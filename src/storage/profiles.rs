use std::path::PathBuf;

use crate::error::AppError;
use crate::models::profile::{validate_profile_name, Profile};
use crate::storage::{read_json, remove_file, write_json, AppPaths};

fn profile_path(paths: &AppPaths, name: &str) -> PathBuf {
    paths.profiles_dir().join(format!("{}.json", name))
}

/// Names of all saved profiles, sorted.
pub fn list(paths: &AppPaths) -> crate::error::Result<Vec<String>> {
    let dir = paths.profiles_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn load(paths: &AppPaths, name: &str) -> crate::error::Result<Profile> {
    validate_profile_name(name)?;
    read_json(&profile_path(paths, name))?
        .ok_or_else(|| AppError::Config(format!("Profile '{}' does not exist", name)))
}

/// Save a profile. Refuses to replace an existing one unless `overwrite`.
pub fn save(
    paths: &AppPaths,
    name: &str,
    profile: &Profile,
    overwrite: bool,
) -> crate::error::Result<()> {
    validate_profile_name(name)?;
    profile.validate()?;
    let path = profile_path(paths, name);
    if path.exists() && !overwrite {
        return Err(AppError::Config(format!(
            "Profile '{}' already exists",
            name
        )));
    }
    write_json(&path, profile)
}

/// Delete a profile together with its session file.
pub fn delete(paths: &AppPaths, name: &str) -> crate::error::Result<()> {
    validate_profile_name(name)?;
    if !remove_file(&profile_path(paths, name))? {
        return Err(AppError::Config(format!("Profile '{}' does not exist", name)));
    }
    crate::storage::session::delete(paths, name)?;
    Ok(())
}
