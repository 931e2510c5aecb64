//! Tapo account credentials.

use serde::Deserialize;

/// Cloud account used for `login_device`. Shared by every Tapo device.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TapoCredentials {
    pub email: String,
    pub password: String,
}

impl TapoCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_empty() || self.password.is_empty()
    }
}

impl std::fmt::Debug for TapoCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapoCredentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}
