use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Cached result of a successful authentication, stored next to the profile.
///
/// Callers treat the file as opaque: it exists or it does not, and it matches
/// the current token or it does not. Deleting it forces re-authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub first_name: String,
    pub token_fingerprint: String,
    pub authorized_at: String,
}

impl Session {
    pub fn matches_token(&self, token: &str) -> bool {
        self.token_fingerprint == token_fingerprint(token)
    }

    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) => format!("{} (@{})", self.first_name, username),
            None => self.first_name.clone(),
        }
    }
}

/// First 16 hex chars of SHA-256(token).
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.trim().as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}
