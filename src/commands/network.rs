use crate::api::bot::{self, BotApiClient};
use crate::api::TelegramApi;
use crate::commands::settings::active_profile;
use crate::commands::AppState;
use crate::models::profile::Profile;
use crate::models::session::{token_fingerprint, Session};
use crate::storage::{session, AppPaths};

/// Client for the active profile. Fails unless a matching session exists.
pub(crate) fn connect(state: &AppState) -> crate::error::Result<BotApiClient> {
    let (name, profile) = active_profile(state)?;
    let session = session::require(&state.paths, &name, &profile)?;
    log::debug!("Profile '{}' authorized as {}", name, session.display_name());
    BotApiClient::new(&profile)
}

/// Identify the token with `getMe` and persist the resulting session.
pub(crate) async fn authorize<A: TelegramApi>(
    api: &A,
    paths: &AppPaths,
    profile_name: &str,
    profile: &Profile,
) -> crate::error::Result<Session> {
    let me = api.get_me().await?;
    let session = Session {
        user_id: me.id,
        username: me.username,
        first_name: me.first_name,
        token_fingerprint: token_fingerprint(&profile.bot_token),
        authorized_at: chrono::Utc::now().to_rfc3339(),
    };
    session::save(paths, profile_name, &session)?;
    Ok(session)
}

pub async fn login(state: &AppState) -> crate::error::Result<()> {
    let (name, profile) = active_profile(state)?;
    let client = BotApiClient::new(&profile)?;
    let session = authorize(&client, &state.paths, &name, &profile).await?;
    log::info!("Logged in as {} (profile '{}')", session.display_name(), name);
    Ok(())
}

pub fn logout(state: &AppState) -> crate::error::Result<()> {
    let config = state.config()?;
    let name = state.profile_name(&config)?;
    if session::delete(&state.paths, &name)? {
        log::info!("Session for profile '{}' deleted", name);
    } else {
        log::info!("Profile '{}' had no session", name);
    }
    Ok(())
}

pub async fn ping(state: &AppState) -> crate::error::Result<()> {
    let base_url = match active_profile(state) {
        Ok((_, profile)) => profile.api_base_url().to_string(),
        Err(_) => crate::models::profile::DEFAULT_API_BASE_URL.to_string(),
    };
    if bot::check_connectivity(&base_url).await {
        println!("{} is reachable", base_url);
        Ok(())
    } else {
        Err(crate::error::AppError::Network(format!(
            "{} is not reachable; check the network, proxy or VPN",
            base_url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;

    const TOKEN: &str = "123456:ABCdefGhIJKlmnoPQRstuVWxyz";

    #[tokio::test]
    async fn authorize_writes_a_session_matching_the_token() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());
        paths.ensure().unwrap();
        let profile = Profile::new(TOKEN);

        let created = authorize(&MockApi::default(), &paths, "main", &profile)
            .await
            .unwrap();
        assert_eq!(created.username.as_deref(), Some("mock_bot"));

        let required = session::require(&paths, "main", &profile).unwrap();
        assert_eq!(required, created);
        assert!(session::require(&paths, "main", &Profile::new("9:other")).is_err());
    }

    #[test]
    fn logout_rejects_profile_name_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            Some(dir.path().join("home")),
            Some("../x".into()),
            std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        );
        state.paths.ensure().unwrap();
        let outside = dir.path().join("home").join("x.session");
        std::fs::write(&outside, "{}").unwrap();

        assert!(logout(&state).is_err());
        assert!(outside.exists());
    }
}
