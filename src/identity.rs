use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::Result;

/// How an account signs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    Password,
    Google,
}

impl ProviderKind {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Password => "password",
            ProviderKind::Google => "google.com",
        }
    }
}

/// Popup-based identity providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider: ProviderKind,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password { email: String, password: String },
}

impl Credential {
    pub fn password(
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Credential::Password {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .finish_non_exhaustive(),
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_popup(
        &self,
        provider: OAuthProvider,
    ) -> Result<AuthUser>;

    async fn sign_in_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser>;

    async fn create_account_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser>;

    async fn update_display_name(&self, uid: &str, name: &str) -> Result<()>;

    async fn send_password_reset(&self, email: &str) -> Result<()>;

    async fn sign_out(&self) -> Result<()>;

    /// Confirm the signed-in user still holds `credential`.
    async fn reauthenticate_with_credential(
        &self,
        user: &AuthUser,
        credential: Credential,
    ) -> Result<()>;

    async fn reauthenticate_with_popup(
        &self,
        user: &AuthUser,
        provider: OAuthProvider,
    ) -> Result<()>;

    async fn delete_account(&self, user: &AuthUser) -> Result<()>;

    fn current_user(&self) -> Option<AuthUser>;

    /// Every session transition is published, `None` meaning signed out.
    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>>;
}
