use clap::Subcommand;

use crate::commands::AppState;
use crate::error::AppError;
use crate::models::profile::Profile;
use crate::models::settings::{AppConfig, CONFIG_KEYS};
use crate::storage::{captions, profiles, session, settings as settings_store};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print every setting.
    Show,
    Get { key: String },
    /// Set a key; an empty value clears optional keys.
    Set { key: String, value: String },
    /// Restore defaults, keeping the selected profile.
    Reset,
    /// Print the configuration file location.
    Path,
    /// List caption templates from captions.json.
    Captions,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Store a bot token under a profile name and select it.
    Add {
        name: String,
        token: String,
        /// Alternative Bot API server.
        #[arg(long)]
        api_base_url: Option<String>,
        /// Proxy URL, e.g. socks5://127.0.0.1:1080.
        #[arg(long)]
        proxy: Option<String>,
        /// Replace an existing profile.
        #[arg(long)]
        force: bool,
    },
    List,
    /// Select the profile used by later commands.
    Use { name: String },
    /// Delete a profile together with its session.
    Remove { name: String },
}

pub fn config(cmd: ConfigCommand, state: &AppState) -> crate::error::Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let config = state.config()?;
            for key in CONFIG_KEYS {
                println!("{} = {}", key, config.get(key)?.unwrap_or_default());
            }
        }
        ConfigCommand::Get { key } => {
            let config = state.config()?;
            println!("{}", config.get(&key)?.unwrap_or_default());
        }
        ConfigCommand::Set { key, value } => {
            let config = settings_store::update_settings(&state.paths, |c| c.set(&key, &value))?;
            log::info!("Set {} = {}", key, config.get(&key)?.unwrap_or_default());
        }
        ConfigCommand::Reset => {
            settings_store::update_settings(&state.paths, |c| {
                let profile = c.current_profile.take();
                *c = AppConfig {
                    current_profile: profile,
                    ..AppConfig::default()
                };
                Ok(())
            })?;
            log::info!("Settings restored to defaults");
        }
        ConfigCommand::Path => println!("{}", state.paths.config_file().display()),
        ConfigCommand::Captions => {
            for name in captions::list(&state.paths)? {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

pub fn profile(cmd: ProfileCommand, state: &AppState) -> crate::error::Result<()> {
    match cmd {
        ProfileCommand::Add {
            name,
            token,
            api_base_url,
            proxy,
            force,
        } => {
            let profile = Profile {
                bot_token: token.trim().to_string(),
                api_base_url,
                proxy,
            };
            profiles::save(&state.paths, &name, &profile, force)?;
            // A new token invalidates whatever session the old one had.
            session::delete(&state.paths, &name)?;
            settings_store::update_settings(&state.paths, |c| {
                c.current_profile = Some(name.clone());
                Ok(())
            })?;
            log::info!("Profile '{}' saved and selected; run `login` next", name);
        }
        ProfileCommand::List => {
            let current = state.config()?.current_profile;
            for name in profiles::list(&state.paths)? {
                let marker = if current.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                let logged_in = session::load(&state.paths, &name)?.is_some();
                println!(
                    "{} {}{}",
                    marker,
                    name,
                    if logged_in { "" } else { " (logged out)" }
                );
            }
        }
        ProfileCommand::Use { name } => {
            profiles::load(&state.paths, &name)?;
            settings_store::update_settings(&state.paths, |c| {
                c.current_profile = Some(name.clone());
                Ok(())
            })?;
            log::info!("Using profile '{}'", name);
        }
        ProfileCommand::Remove { name } => {
            profiles::delete(&state.paths, &name)?;
            settings_store::update_settings(&state.paths, |c| {
                if c.current_profile.as_deref() == Some(name.as_str()) {
                    c.current_profile = None;
                }
                Ok(())
            })?;
            log::info!("Profile '{}' removed", name);
        }
    }
    Ok(())
}

/// Load the active profile by name.
pub(crate) fn active_profile(state: &AppState) -> crate::error::Result<(String, Profile)> {
    let config = state.config()?;
    let name = state.profile_name(&config)?;
    let profile = profiles::load(&state.paths, &name).map_err(|e| match e {
        AppError::Config(msg) => AppError::Config(format!("{}; run `profile add` first", msg)),
        other => other,
    })?;
    Ok((name, profile))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::*;

    const TOKEN: &str = "123456:ABCdefGhIJKlmnoPQRstuVWxyz";

    fn state(dir: &std::path::Path) -> AppState {
        let state = AppState::new(Some(dir.to_path_buf()), None, Arc::new(AtomicBool::new(false)));
        state.paths.ensure().unwrap();
        state
    }

    #[test]
    fn set_then_reset_keeps_profile() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        config(
            ConfigCommand::Set {
                key: "parallel_upload".into(),
                value: "true".into(),
            },
            &state,
        )
        .unwrap();
        settings_store::update_settings(&state.paths, |c| {
            c.current_profile = Some("main".into());
            Ok(())
        })
        .unwrap();
        assert!(state.config().unwrap().parallel_upload);

        config(ConfigCommand::Reset, &state).unwrap();
        let reset = state.config().unwrap();
        assert!(!reset.parallel_upload);
        assert_eq!(reset.current_profile.as_deref(), Some("main"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let err = config(
            ConfigCommand::Set {
                key: "colour".into(),
                value: "red".into(),
            },
            &state,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn add_selects_and_remove_clears_profile() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        profile(
            ProfileCommand::Add {
                name: "main".into(),
                token: TOKEN.into(),
                api_base_url: None,
                proxy: None,
                force: false,
            },
            &state,
        )
        .unwrap();
        let (name, loaded) = active_profile(&state).unwrap();
        assert_eq!(name, "main");
        assert_eq!(loaded.bot_token, TOKEN);

        profile(ProfileCommand::Remove { name: "main".into() }, &state).unwrap();
        assert!(state.config().unwrap().current_profile.is_none());
        assert!(active_profile(&state).is_err());
    }

    #[test]
    fn use_requires_existing_profile() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        assert!(profile(ProfileCommand::Use { name: "ghost".into() }, &state).is_err());
    }
}
