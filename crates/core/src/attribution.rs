//! # Attribution Module
//!
//! Who is responsible for an operation. The identity provider is external;
//! every core call receives an explicit [`Attribution`] instead of reading
//! ambient session state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel identity used when no user is available.
pub const SYSTEM_USER: &str = "SYSTEM";

/// External identity provider (login/session management lives outside).
pub trait IdentityProvider {
    fn current_user(&self) -> Option<String>;
    fn current_session(&self) -> Option<String>;
}

/// Fixed identity, e.g. taken from CLI flags or a request header.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    pub username: Option<String>,
    pub session_token: Option<String>,
}

impl StaticIdentity {
    pub fn new(username: Option<String>, session_token: Option<String>) -> Self {
        Self {
            username,
            session_token,
        }
    }

    /// No user, no session
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<String> {
        self.username.clone()
    }

    fn current_session(&self) -> Option<String> {
        self.session_token.clone()
    }
}

/// Resolved (username, session) pair. `username` is never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub username: String,
    pub session_token: Option<String>,
    /// Numeric user identity, kept as a secondary attribute when known.
    pub user_id: Option<i64>,
    pub client_address: Option<String>,
}

impl Attribution {
    /// Attribution for a named user. A blank name falls back to SYSTEM.
    pub fn user(username: &str, session_token: Option<&str>) -> Self {
        let username = username.trim();
        if username.is_empty() {
            return Self::system();
        }
        Self {
            username: username.to_string(),
            session_token: session_token
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            user_id: None,
            client_address: None,
        }
    }

    /// SYSTEM attribution, null session
    pub fn system() -> Self {
        Self {
            username: SYSTEM_USER.to_string(),
            session_token: None,
            user_id: None,
            client_address: None,
        }
    }

    /// Resolve from the identity provider, applying the SYSTEM fallback.
    pub fn resolve(provider: &dyn IdentityProvider) -> Self {
        match provider.current_user() {
            Some(user) if !user.trim().is_empty() => {
                Self::user(&user, provider.current_session().as_deref())
            }
            _ => Self::system(),
        }
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = Some(address.into());
        self
    }

    pub fn is_system(&self) -> bool {
        self.username == SYSTEM_USER
    }
}

impl Default for Attribution {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Display for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session_token {
            Some(session) => write!(f, "{} (session {})", self.username, session),
            None => write!(f, "{}", self.username),
        }
    }
}
