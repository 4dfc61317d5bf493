use super::{onboarded_gate, Gate, Reaction, Route, Services};
use crate::identity::AuthUser;
use crate::presentation::{AvatarSlot, Notice};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockTestAction {
    StartTest(String),
    Review(String),
    Profile,
    Dashboard,
    SignOut,
}

/// Mock test listing.
pub struct MockTestPage {
    services: Services,
    avatar: Option<AvatarSlot>,
}

impl MockTestPage {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            avatar: None,
        }
    }

    pub fn avatar(&self) -> Option<&AvatarSlot> {
        self.avatar.as_ref()
    }

    pub async fn on_auth_state(&mut self, user: Option<AuthUser>) -> Reaction {
        match onboarded_gate(&self.services, user).await {
            Gate::Open(user, record) => {
                self.avatar = Some(AvatarSlot::for_user(&record, &user));
                Reaction::none()
            }
            Gate::Redirect(route) => Reaction::route(route),
            Gate::Stuck => Reaction::none(),
        }
    }

    pub async fn dispatch(&self, action: MockTestAction) -> Reaction {
        match action {
            MockTestAction::StartTest(title) => {
                Reaction::notice(Notice::info(format!(
                    "Starting \"{title}\" - Test interface coming soon!"
                )))
            }
            MockTestAction::Review(title) => Reaction::notice(Notice::info(
                format!("Review for \"{title}\" coming soon!"),
            )),
            MockTestAction::Profile => Reaction::route(Route::Profile),
            MockTestAction::Dashboard => Reaction::route(Route::Dashboard),
            MockTestAction::SignOut => self.services.sign_out().await,
        }
    }
}
