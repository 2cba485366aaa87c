use std::path::PathBuf;

use crate::error::AppError;
use crate::models::profile::{validate_profile_name, Profile};
use crate::models::session::Session;
use crate::storage::{read_json, remove_file, write_json, AppPaths};

pub fn session_path(paths: &AppPaths, profile_name: &str) -> crate::error::Result<PathBuf> {
    validate_profile_name(profile_name)?;
    Ok(paths
        .profiles_dir()
        .join(format!("{}.session", profile_name)))
}

pub fn load(paths: &AppPaths, profile_name: &str) -> crate::error::Result<Option<Session>> {
    read_json(&session_path(paths, profile_name)?)
}

pub fn save(paths: &AppPaths, profile_name: &str, session: &Session) -> crate::error::Result<()> {
    write_json(&session_path(paths, profile_name)?, session)
}

/// Delete the session file. Returns whether one existed.
pub fn delete(paths: &AppPaths, profile_name: &str) -> crate::error::Result<bool> {
    remove_file(&session_path(paths, profile_name)?)
}

/// Session for `profile`, failing when absent or issued for another token.
pub fn require(
    paths: &AppPaths,
    profile_name: &str,
    profile: &Profile,
) -> crate::error::Result<Session> {
    match load(paths, profile_name)? {
        Some(session) if session.matches_token(&profile.bot_token) => Ok(session),
        Some(_) => Err(AppError::NotAuthenticated(format!(
            "session for profile '{}' was issued for a different token; run `login` again",
            profile_name
        ))),
        None => Err(AppError::NotAuthenticated(format!(
            "no session for profile '{}'; run `login` first",
            profile_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::token_fingerprint;

    const TOKEN: &str = "123456789:AAH-abcdefghijklmnopqrstuvwxyz_0123";

    fn session() -> Session {
        Session {
            user_id: 7,
            username: Some("bot".into()),
            first_name: "Bot".into(),
            token_fingerprint: token_fingerprint(TOKEN),
            authorized_at: "2026-02-11T08:30:00+00:00".into(),
        }
    }

    #[test]
    fn require_without_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());
        let err = require(&paths, "work", &Profile::new(TOKEN)).unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated(_)));
    }

    #[test]
    fn require_with_matching_session_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());
        save(&paths, "work", &session()).unwrap();
        assert_eq!(require(&paths, "work", &Profile::new(TOKEN)).unwrap().user_id, 7);
    }

    #[test]
    fn require_with_other_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());
        save(&paths, "work", &session()).unwrap();
        let other = Profile::new("987654321:AAH-abcdefghijklmnopqrstuvwxyz_0123");
        let err = require(&paths, "work", &other).unwrap_err();
        assert!(err.to_string().contains("different token"));
    }

    #[test]
    fn delete_forces_reauthentication() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());
        save(&paths, "work", &session()).unwrap();
        assert!(delete(&paths, "work").unwrap());
        assert!(!delete(&paths, "work").unwrap());
        assert!(require(&paths, "work", &Profile::new(TOKEN)).is_err());
    }

    #[test]
    fn name_outside_profiles_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());
        let outside = dir.path().join("x.session");
        std::fs::write(&outside, "{}").unwrap();

        let err = delete(&paths, "../x").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(outside.exists());
        assert!(save(&paths, "../x", &session()).is_err());
    }
}
