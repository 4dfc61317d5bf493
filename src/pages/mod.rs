//! Page controllers.
//!
//! Each page owns its state explicitly and exposes its user actions as an
//! enum handled by a single `dispatch`, so what triggers an action is kept
//! apart from what the action does.

use std::sync::Arc;

use log::{debug, error, info};

use crate::config::AppConfig;
use crate::identity::{AuthUser, IdentityProvider};
use crate::presentation::Notice;
use crate::profile::ProfileRecord;
use crate::store::ProfileStore;
use crate::Result;

pub mod auth;
pub mod dashboard;
pub mod mocktest;
pub mod onboarding;
pub mod profile;

pub use auth::AuthPage;
pub use dashboard::{DashboardAction, DashboardPage, DashboardView};
pub use mocktest::{MockTestAction, MockTestPage};
pub use onboarding::{OnboardingAnswers, OnboardingPage};
pub use profile::{DeletePrompt, ProfileAction, ProfilePage, ProfileView};

/// Pages of the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Login,
    Onboarding,
    Dashboard,
    MockTest,
    Profile,
}

/// What the rendering layer should do after an action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    pub notice: Option<Notice>,
    pub route: Option<Route>,
}

impl Reaction {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn notice(notice: Notice) -> Self {
        Self {
            notice: Some(notice),
            route: None,
        }
    }

    pub fn route(route: Route) -> Self {
        Self {
            notice: None,
            route: Some(route),
        }
    }

    pub fn then(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }
}

/// Collaborators shared by every page.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn ProfileStore>,
    pub config: Arc<AppConfig>,
}

impl Services {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProfileStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            identity,
            store,
            config: Arc::new(config),
        }
    }

    pub async fn load_profile(
        &self,
        uid: &str,
    ) -> Result<Option<ProfileRecord>> {
        match self.store.get(&self.config.users_collection, uid).await? {
            Some(document) => Ok(Some(ProfileRecord::from_document(document)?)),
            None => Ok(None),
        }
    }

    /// Where a freshly signed-in user belongs.
    pub async fn route_after_sign_in(&self, user: &AuthUser) -> Route {
        debug!("checking profile of {}", user.uid);
        match self.load_profile(&user.uid).await {
            Ok(Some(record)) if record.onboarding_completed => {
                info!("profile found, routing {} to dashboard", user.uid);
                Route::Dashboard
            }
            Ok(_) => {
                info!("profile incomplete, routing {} to onboarding", user.uid);
                Route::Onboarding
            }
            Err(e) => {
                error!("error checking profile of {}: {e}", user.uid);
                Route::Onboarding
            }
        }
    }

    pub async fn sign_out(&self) -> Reaction {
        match self.identity.sign_out().await {
            Ok(()) => Reaction::route(Route::Landing),
            Err(e) => {
                error!("error signing out: {e}");
                Reaction::notice(Notice::error(
                    "Error signing out. Please try again.",
                ))
            }
        }
    }
}

/// Outcome of loading a page that requires a finished onboarding.
pub(crate) enum Gate {
    Open(AuthUser, ProfileRecord),
    Redirect(Route),
    /// The profile could not be read; the page stays as it is.
    Stuck,
}

pub(crate) async fn onboarded_gate(
    services: &Services,
    user: Option<AuthUser>,
) -> Gate {
    let Some(user) = user else {
        return Gate::Redirect(Route::Login);
    };

    match services.load_profile(&user.uid).await {
        Ok(Some(record)) if record.onboarding_completed => {
            Gate::Open(user, record)
        }
        Ok(_) => {
            debug!("{} has not finished onboarding", user.uid);
            Gate::Redirect(Route::Onboarding)
        }
        Err(e) => {
            error!("error loading user data for {}: {e}", user.uid);
            Gate::Stuck
        }
    }
}
