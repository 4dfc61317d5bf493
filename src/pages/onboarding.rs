use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, info};
use serde_json::{json, Value};

use super::{Reaction, Route, Services};
use crate::identity::AuthUser;
use crate::presentation::Notice;
use crate::profile::DEFAULT_LANGUAGE;
use crate::store::Document;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnboardingAnswers {
    pub target_exam: String,
    pub education_level: String,
    pub target_year: String,
    pub study_hours: String,
}

pub struct OnboardingPage {
    services: Services,
    submitting: bool,
}

impl OnboardingPage {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            submitting: false,
        }
    }

    /// Signed-out visitors are sent to the login page.
    pub async fn on_auth_state(&mut self, user: Option<AuthUser>) -> Reaction {
        match user {
            Some(user) => {
                info!("onboarding {}", user.email);
                Reaction::none()
            }
            None => Reaction::route(Route::Login),
        }
    }

    /// True while a submission is being saved.
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub async fn submit(&mut self, answers: OnboardingAnswers) -> Reaction {
        if self.submitting {
            return Reaction::none();
        }
        self.submitting = true;

        let Some(user) = self.services.identity.current_user() else {
            return Reaction::notice(Notice::error("Please log in first"))
                .then(Route::Login);
        };

        let document = onboarding_document(&user, &answers, Utc::now());
        let result = self
            .services
            .store
            .set_merge(
                &self.services.config.users_collection,
                &user.uid,
                document,
            )
            .await;

        match result {
            Ok(()) => {
                info!("onboarding completed for {}", user.uid);
                Reaction::notice(Notice::success(
                    "Profile completed successfully! 🎉",
                ))
                .then(Route::Dashboard)
            }
            Err(e) => {
                error!("error saving profile of {}: {e}", user.uid);
                self.submitting = false;
                Reaction::notice(Notice::error(format!(
                    "Error saving your profile: {e}"
                )))
            }
        }
    }
}

/// Display name, else the local part of the email, else "Student".
fn onboarding_name(user: &AuthUser) -> String {
    user.display_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .or_else(|| user.email.split('@').next().filter(|l| !l.is_empty()))
        .unwrap_or("Student")
        .to_owned()
}

fn onboarding_document(
    user: &AuthUser,
    answers: &OnboardingAnswers,
    now: DateTime<Utc>,
) -> Document {
    let value = json!({
        "fullName": onboarding_name(user),
        "targetExam": answers.target_exam,
        "educationLevel": answers.education_level,
        "targetYear": answers.target_year,
        "studyHours": answers.study_hours,
        "preferredLanguage": DEFAULT_LANGUAGE,
        "onboardingCompleted": true,
        "createdAt": now.to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    match value {
        Value::Object(document) => document,
        _ => Document::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::identity::IdentityProvider;
    use crate::config::AppConfig;
    use crate::identity::ProviderKind;
    use crate::memory::MemoryIdentityProvider;
    use crate::pages::tests::fixture;
    use crate::presentation::NoticeKind;
    use crate::profile::ProfileRecord;

    fn answers() -> OnboardingAnswers {
        OnboardingAnswers {
            target_exam: "JEE".into(),
            education_level: "11th".into(),
            target_year: "2027".into(),
            study_hours: "4-6".into(),
        }
    }

    #[test]
    fn document_shape() {
        let user = AuthUser {
            uid: "u1".into(),
            email: "kabir.m@example.com".into(),
            display_name: None,
            photo_url: None,
            provider: ProviderKind::Password,
        };
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let doc = onboarding_document(&user, &answers(), now);

        assert_eq!(doc["fullName"], json!("kabir.m"));
        assert_eq!(doc["preferredLanguage"], json!("English"));
        assert_eq!(doc["onboardingCompleted"], json!(true));
        assert_eq!(doc["createdAt"], json!("2026-01-02T03:04:05.000Z"));
    }

    #[tokio::test]
    async fn submit_merges_and_routes_to_dashboard() {
        let fx = fixture();
        let user = fx
            .identity
            .create_account_with_email_password("ira@example.com", "secret1")
            .await
            .unwrap();
        fx.store.insert(
            "users",
            &user.uid,
            json!({"photoBase64": "data:image/jpeg;base64,AAAA"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let mut page = OnboardingPage::new(fx.services.clone());
        let shown = page.on_auth_state(Some(user.clone())).await;
        assert_eq!(shown, Reaction::none());
        let reaction = page.submit(answers()).await;
        assert_eq!(reaction.route, Some(Route::Dashboard));
        assert!(page.is_submitting());

        let doc = fx.store.document("users", &user.uid).unwrap();
        let record = ProfileRecord::from_document(doc).unwrap();
        assert!(record.onboarding_completed);
        assert_eq!(record.full_name.as_deref(), Some("ira"));
        assert!(record.photo_base64.is_some());

        assert_eq!(page.submit(answers()).await, Reaction::none());
    }

    #[tokio::test]
    async fn signed_out_submit_goes_to_login() {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let services = Services::new(
            identity,
            Arc::new(crate::memory::MemoryProfileStore::new()),
            AppConfig::default(),
        );
        let mut page = OnboardingPage::new(services);

        assert_eq!(page.on_auth_state(None).await.route, Some(Route::Login));
        let reaction = page.submit(answers()).await;
        assert_eq!(reaction.notice.unwrap().kind, NoticeKind::Error);
        assert_eq!(reaction.route, Some(Route::Login));
    }
}
