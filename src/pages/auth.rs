use log::{error, info};

use super::{Reaction, Route, Services};
use crate::identity::OAuthProvider;
use crate::presentation::Notice;

/// Login and signup screens.
pub struct AuthPage {
    services: Services,
}

impl AuthPage {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Shared by the login and signup Google buttons.
    pub async fn sign_in_with_google(&self) -> Reaction {
        match self
            .services
            .identity
            .sign_in_with_popup(OAuthProvider::Google)
            .await
        {
            Ok(user) => {
                info!("Google sign-in succeeded for {}", user.email);
                let route = self.services.route_after_sign_in(&user).await;
                Reaction::notice(Notice::success(
                    "Success! Verifying profile...",
                ))
                .then(route)
            }
            Err(e) => {
                error!("Google sign-in failed: {e}");
                Reaction::notice(Notice::error(format!(
                    "Google Sign-In failed: {e}"
                )))
            }
        }
    }

    pub async fn log_in(&self, email: &str, password: &str) -> Reaction {
        match self
            .services
            .identity
            .sign_in_with_email_password(email, password)
            .await
        {
            Ok(user) => {
                let route = self.services.route_after_sign_in(&user).await;
                Reaction::notice(Notice::success(
                    "Login Success! Verifying profile...",
                ))
                .then(route)
            }
            Err(e) => {
                error!("login failed for {email}: {e}");
                Reaction::notice(Notice::error(format!("Login Failed: {e}")))
            }
        }
    }

    /// New accounts always continue with onboarding.
    pub async fn sign_up(
        &self,
        full_name: Option<&str>,
        email: &str,
        password: &str,
    ) -> Reaction {
        let identity = &self.services.identity;
        let result = async {
            let user = identity
                .create_account_with_email_password(email, password)
                .await?;
            if let Some(name) = full_name.filter(|n| !n.is_empty()) {
                identity.update_display_name(&user.uid, name).await?;
            }
            crate::Result::Ok(user)
        }
        .await;

        match result {
            Ok(user) => {
                info!("created account {}", user.uid);
                Reaction::notice(Notice::success(
                    "Account Created! Redirecting to setup...",
                ))
                .then(Route::Onboarding)
            }
            Err(e) => {
                error!("signup failed for {email}: {e}");
                Reaction::notice(Notice::error(format!("Signup Failed: {e}")))
            }
        }
    }

    pub async fn forgot_password(&self, email: &str) -> Reaction {
        if email.is_empty() {
            return Reaction::notice(Notice::error(
                "Please enter your email in the box first, \
                 then click Forgot Password.",
            ));
        }

        match self.services.identity.send_password_reset(email).await {
            Ok(()) => Reaction::notice(Notice::success(format!(
                "Password reset link sent to {email}"
            ))),
            Err(e) => {
                error!("password reset failed for {email}: {e}");
                Reaction::notice(Notice::error(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityProvider;
    use crate::memory::GoogleIdentity;
    use crate::pages::tests::{fixture, onboarded_user};
    use crate::presentation::NoticeKind;

    #[tokio::test]
    async fn sign_up_goes_to_onboarding_with_name() {
        let fx = fixture();
        let page = AuthPage::new(fx.services.clone());

        let reaction = page
            .sign_up(Some("Dev Patel"), "dev@example.com", "secret1")
            .await;
        assert_eq!(reaction.route, Some(Route::Onboarding));

        let user = fx.identity.current_user().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Dev Patel"));
    }

    #[tokio::test]
    async fn failed_sign_up_reports_reason() {
        let fx = fixture();
        let page = AuthPage::new(fx.services.clone());

        let reaction = page.sign_up(None, "dev@example.com", "123").await;
        let notice = reaction.notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.text.starts_with("Signup Failed: "));
        assert_eq!(reaction.route, None);
    }

    #[tokio::test]
    async fn log_in_routes_by_onboarding_state() {
        let fx = fixture();
        onboarded_user(&fx).await;
        fx.identity.sign_out().await.unwrap();
        let page = AuthPage::new(fx.services.clone());

        let wrong = page.log_in("priya@example.com", "oops").await;
        assert!(wrong.notice.unwrap().text.starts_with("Login Failed: "));

        let ok = page.log_in("priya@example.com", "secret1").await;
        assert_eq!(ok.route, Some(Route::Dashboard));
    }

    #[tokio::test]
    async fn google_first_visit_needs_onboarding() {
        let fx = fixture();
        let page = AuthPage::new(fx.services.clone());

        let closed = page.sign_in_with_google().await;
        assert!(closed
            .notice
            .unwrap()
            .text
            .starts_with("Google Sign-In failed: "));

        fx.identity.set_google_identity(Some(GoogleIdentity {
            email: "neha@example.com".into(),
            display_name: "Neha Singh".into(),
            photo_url: None,
        }));
        let reaction = page.sign_in_with_google().await;
        assert_eq!(reaction.route, Some(Route::Onboarding));
    }

    #[tokio::test]
    async fn forgot_password_needs_an_email() {
        let fx = fixture();
        let page = AuthPage::new(fx.services.clone());

        let empty = page.forgot_password("").await;
        assert_eq!(empty.notice.unwrap().kind, NoticeKind::Error);
        assert!(fx.identity.reset_requests().is_empty());

        let sent = page.forgot_password("sam@example.com").await;
        assert_eq!(
            sent.notice.unwrap().text,
            "Password reset link sent to sam@example.com"
        );
        assert_eq!(fx.identity.reset_requests(), vec!["sam@example.com"]);
    }
}
