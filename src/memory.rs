//! In-process adapters for the identity provider and the profile store.
//!
//! They keep everything in memory behind locks and follow the hosted
//! service's observable rules closely enough to drive the page controllers
//! end to end: unique emails, a minimum password length, merge versus update
//! semantics on documents, and a published session on every transition.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::watch;
use uuid::Uuid;

use crate::identity::{
    AuthUser, Credential, IdentityProvider, OAuthProvider, ProviderKind,
};
use crate::store::{Document, ProfileStore};
use crate::{PrepmindError, Result};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Default)]
pub struct MemoryProfileStore {
    documents: RwLock<HashMap<(String, String), Document>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous read, handy outside an async context.
    pub fn document(&self, collection: &str, key: &str) -> Option<Document> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection.to_owned(), key.to_owned()))
            .cloned()
    }

    /// Overwrite a whole document.
    pub fn insert(&self, collection: &str, key: &str, document: Document) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_owned(), key.to_owned()), document);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Document>> {
        Ok(self.document(collection, key))
    }

    async fn set_merge(
        &self,
        collection: &str,
        key: &str,
        fields: Document,
    ) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        documents
            .entry((collection.to_owned(), key.to_owned()))
            .or_default()
            .extend(fields);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Document,
    ) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let document = documents
            .get_mut(&(collection.to_owned(), key.to_owned()))
            .ok_or_else(|| PrepmindError::NotFound {
                collection: collection.to_owned(),
                key: key.to_owned(),
            })?;
        document.extend(fields);
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct Account {
    user: AuthUser,
    password: Option<String>,
}

/// Identity returned by the Google popup of [`MemoryIdentityProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

pub struct MemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    google: RwLock<Option<GoogleIdentity>>,
    reset_requests: RwLock<Vec<String>>,
    session: watch::Sender<Option<AuthUser>>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: RwLock::new(HashMap::new()),
            google: RwLock::new(None),
            reset_requests: RwLock::new(Vec::new()),
            session,
        }
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity the next Google popup resolves to. Without one the
    /// popup behaves as if the user closed it.
    pub fn set_google_identity(&self, identity: Option<GoogleIdentity>) {
        *self
            .google
            .write()
            .unwrap_or_else(PoisonError::into_inner) = identity;
    }

    /// Emails a password reset was requested for, oldest first.
    pub fn reset_requests(&self) -> Vec<String> {
        self.reset_requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn account_exists(&self, uid: &str) -> bool {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(uid)
    }

    fn google_identity(&self) -> Result<GoogleIdentity> {
        self.google
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| PrepmindError::Auth("popup-closed-by-user".into()))
    }

    fn find_by_email(
        &self,
        email: &str,
        provider: ProviderKind,
    ) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|a| a.user.email == email && a.user.provider == provider)
            .cloned()
    }

    fn begin_session(&self, user: &AuthUser) {
        info!("signed in {} ({})", user.email, user.provider.id());
        self.session.send_replace(Some(user.clone()));
    }
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(PrepmindError::Auth("invalid-email".into()));
    }
    Ok(())
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_with_popup(
        &self,
        provider: OAuthProvider,
    ) -> Result<AuthUser> {
        let OAuthProvider::Google = provider;
        let identity = self.google_identity()?;

        if self
            .find_by_email(&identity.email, ProviderKind::Password)
            .is_some()
        {
            return Err(PrepmindError::Auth(
                "account-exists-with-different-credential".into(),
            ));
        }

        let existing =
            self.find_by_email(&identity.email, ProviderKind::Google);
        let user = match existing {
            Some(account) => account.user,
            None => {
                let user = AuthUser {
                    uid: Uuid::new_v4().simple().to_string(),
                    email: identity.email,
                    display_name: Some(identity.display_name),
                    photo_url: identity.photo_url,
                    provider: ProviderKind::Google,
                };
                debug!("created Google account {}", user.uid);
                self.accounts
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(
                        user.uid.clone(),
                        Account {
                            user: user.clone(),
                            password: None,
                        },
                    );
                user
            }
        };

        self.begin_session(&user);
        Ok(user)
    }

    async fn sign_in_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser> {
        validate_email(email)?;
        let account = self
            .find_by_email(email, ProviderKind::Password)
            .filter(|a| a.password.as_deref() == Some(password))
            .ok_or_else(|| PrepmindError::Auth("invalid-credential".into()))?;

        self.begin_session(&account.user);
        Ok(account.user)
    }

    async fn create_account_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser> {
        validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(PrepmindError::Auth("weak-password".into()));
        }

        let user = {
            let mut accounts = self
                .accounts
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if accounts.values().any(|a| a.user.email == email) {
                return Err(PrepmindError::Auth("email-already-in-use".into()));
            }

            let user = AuthUser {
                uid: Uuid::new_v4().simple().to_string(),
                email: email.to_owned(),
                display_name: None,
                photo_url: None,
                provider: ProviderKind::Password,
            };
            accounts.insert(
                user.uid.clone(),
                Account {
                    user: user.clone(),
                    password: Some(password.to_owned()),
                },
            );
            user
        };

        self.begin_session(&user);
        Ok(user)
    }

    async fn update_display_name(&self, uid: &str, name: &str) -> Result<()> {
        {
            let mut accounts = self
                .accounts
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let account = accounts
                .get_mut(uid)
                .ok_or_else(|| PrepmindError::Auth("user-not-found".into()))?;
            account.user.display_name = Some(name.to_owned());
        }

        self.session.send_if_modified(|session| match session {
            Some(user) if user.uid == uid => {
                user.display_name = Some(name.to_owned());
                true
            }
            _ => false,
        });
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        validate_email(email)?;
        debug!("password reset requested for {email}");
        self.reset_requests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.to_owned());
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(user) = self.session.send_replace(None) {
            info!("signed out {}", user.email);
        }
        Ok(())
    }

    async fn reauthenticate_with_credential(
        &self,
        user: &AuthUser,
        credential: Credential,
    ) -> Result<()> {
        let Credential::Password { email, password } = credential;
        let accounts = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .get(&user.uid)
            .ok_or_else(|| PrepmindError::Auth("user-not-found".into()))?;

        if account.user.email != email {
            return Err(PrepmindError::Auth("user-mismatch".into()));
        }
        if account.password.as_deref() != Some(password.as_str()) {
            return Err(PrepmindError::Auth("invalid-credential".into()));
        }
        Ok(())
    }

    async fn reauthenticate_with_popup(
        &self,
        user: &AuthUser,
        provider: OAuthProvider,
    ) -> Result<()> {
        let OAuthProvider::Google = provider;
        let identity = self.google_identity()?;
        if identity.email != user.email || !self.account_exists(&user.uid) {
            return Err(PrepmindError::Auth("user-mismatch".into()));
        }
        Ok(())
    }

    async fn delete_account(&self, user: &AuthUser) -> Result<()> {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user.uid)
            .ok_or_else(|| PrepmindError::Auth("user-not-found".into()))?;

        info!("deleted account {}", user.uid);
        self.session.send_if_modified(|session| {
            if session.as_ref().is_some_and(|s| s.uid == user.uid) {
                *session = None;
                return true;
            }
            false
        });
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.subscribe()
    }
}
