// Editing session: who is editing, scoped to the session rather than the
// process.
//
// Components receive an `Arc<Session>` instead of reading globals. Identity
// comes from the authentication collaborator; without one the session is
// anonymous and persistence falls back to the local store.

use std::sync::RwLock;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AuthConfig;

/// Authenticated user as supplied by the hosted auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Bearer token for backend requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), email: None, access_token: None }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Local part of the email, or `Anonymous`.
    pub fn display_name(&self) -> String {
        display_name_for(self.email.as_deref())
    }
}

pub(crate) fn display_name_for(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("Anonymous")
        .to_string()
}

/// Six-digit id shown for anonymous editors.
pub fn generate_anonymous_id() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[derive(Debug)]
pub struct Session {
    identity: RwLock<Option<Identity>>,
    anonymous_id: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Session {
    pub fn anonymous() -> Self {
        Self { identity: RwLock::new(None), anonymous_id: generate_anonymous_id() }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self { identity: RwLock::new(Some(identity)), anonymous_id: generate_anonymous_id() }
    }

    /// Replace the generated anonymous id with one kept from an earlier run.
    pub fn with_anonymous_id(mut self, anonymous_id: impl Into<String>) -> Self {
        self.anonymous_id = anonymous_id.into();
        self
    }

    /// Build from a stored sign-in. A missing user id means anonymous.
    pub fn from_auth_config(auth: &AuthConfig) -> Self {
        match auth.user_id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(user_id) => Self::signed_in(Identity {
                user_id: user_id.to_string(),
                email: auth.email.clone(),
                access_token: auth.access_token.clone(),
            }),
            None => Self::anonymous(),
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.read().unwrap_or_else(|poisoned| poisoned.into_inner()).is_some()
    }

    pub fn sign_in(&self, identity: Identity) {
        info!(user_id = %identity.user_id, "session signed in");
        *self.identity.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(identity);
    }

    pub fn sign_out(&self) {
        info!("session signed out");
        *self.identity.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    pub fn anonymous_id(&self) -> &str {
        &self.anonymous_id
    }

    /// Owner reference for new documents: the user id, or the anonymous id.
    pub fn owner_id(&self) -> String {
        self.identity().map(|i| i.user_id).unwrap_or_else(|| self.anonymous_id.clone())
    }

    /// Name shown in the "editing as" footer.
    pub fn display_name(&self) -> String {
        match self.identity() {
            Some(identity) => identity.display_name(),
            None => self.anonymous_id.clone(),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.identity().and_then(|i| i.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_id_is_six_digits() {
        for _ in 0..50 {
            let id = generate_anonymous_id();
            assert_eq!(id.len(), 6);
            assert!(id.chars().all(|c| c.is_ascii_digit()));
            assert!(!id.starts_with('0'));
        }
    }

    #[test]
    fn anonymous_session_owns_with_anonymous_id() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert_eq!(session.owner_id(), session.anonymous_id());
        assert_eq!(session.display_name(), session.anonymous_id());
        assert!(session.access_token().is_none());
    }

    #[test]
    fn kept_anonymous_id_owns_documents() {
        let session = Session::anonymous().with_anonymous_id("482913");
        assert_eq!(session.anonymous_id(), "482913");
        assert_eq!(session.owner_id(), "482913");
        assert_eq!(session.display_name(), "482913");
    }

    #[test]
    fn sign_in_and_out_switch_identity() {
        let session = Session::anonymous();
        session.sign_in(Identity::new("user-1").with_email("ada@example.com").with_access_token("t"));
        assert!(session.is_authenticated());
        assert_eq!(session.owner_id(), "user-1");
        assert_eq!(session.display_name(), "ada");
        assert_eq!(session.access_token().as_deref(), Some("t"));

        session.sign_out();
        assert!(!session.is_authenticated());
        assert_eq!(session.owner_id(), session.anonymous_id());
    }

    #[test]
    fn display_name_falls_back_to_anonymous() {
        assert_eq!(Identity::new("u").display_name(), "Anonymous");
        assert_eq!(Identity::new("u").with_email("@nowhere").display_name(), "Anonymous");
    }

    #[test]
    fn from_auth_config_requires_user_id() {
        let session = Session::from_auth_config(&AuthConfig::default());
        assert!(!session.is_authenticated());

        let session = Session::from_auth_config(&AuthConfig {
            user_id: Some("user-9".into()),
            email: Some("bo@example.com".into()),
            access_token: None,
        });
        assert_eq!(session.identity().unwrap().user_id, "user-9");
    }
}
