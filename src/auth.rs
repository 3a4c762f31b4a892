use std::fmt;

use crate::error::{TrackerError, TrackerResult};

/// Identity and bearer token of the signed-in user, handed to the tracker by
/// whoever owns login. The tracker only reads it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    user_id: String,
    token: String,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> TrackerResult<Self> {
        let user_id = user_id.into().trim().to_string();
        let token = token.into().trim().to_string();

        if user_id.is_empty() || token.is_empty() {
            return Err(TrackerError::MissingAuth);
        }

        Ok(Self { user_id, token })
    }

    /// Reads `SERVICE_HOURS_USER` / `SERVICE_HOURS_TOKEN`.
    pub fn from_env() -> TrackerResult<Self> {
        let user_id = std::env::var("SERVICE_HOURS_USER").map_err(|_| TrackerError::MissingAuth)?;
        let token = std::env::var("SERVICE_HOURS_TOKEN").map_err(|_| TrackerError::MissingAuth)?;
        Self::new(user_id, token)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// Keep the token out of logs.
impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}
