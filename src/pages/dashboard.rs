use log::debug;

use super::{onboarded_gate, Gate, Reaction, Route, Services};
use crate::identity::AuthUser;
use crate::presentation::{AvatarSlot, Notice};
use crate::profile::ProfileRecord;

const MOCK_TEST_ACTION: &str = "Start Mock Test";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subject {
    pub name: &'static str,
    pub icon: &'static str,
    pub progress: u8,
    pub topics: u32,
    pub questions: u32,
}

const fn subject(name: &'static str, icon: &'static str) -> Subject {
    Subject {
        name,
        icon,
        progress: 0,
        topics: 0,
        questions: 0,
    }
}

static JEE_SUBJECTS: [Subject; 3] = [
    subject("Physics", "⚛️"),
    subject("Chemistry", "🧪"),
    subject("Mathematics", "📐"),
];

static NEET_SUBJECTS: [Subject; 3] = [
    subject("Physics", "⚛️"),
    subject("Chemistry", "🧪"),
    subject("Biology", "🧬"),
];

/// Subjects shown for an exam; unknown exams get the JEE set.
pub fn subjects_for(exam: &str) -> &'static [Subject] {
    match exam {
        "NEET" => &NEET_SUBJECTS,
        _ => &JEE_SUBJECTS,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StudyStats {
    pub daily_streak: u32,
    pub hours_studied: u32,
    pub tests_completed: u32,
    pub avg_score: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardView {
    pub first_name: String,
    pub avatar: AvatarSlot,
    pub exam: String,
    pub badge: String,
    pub subjects: Vec<Subject>,
    pub stats: StudyStats,
}

impl DashboardView {
    pub fn build(user: &AuthUser, record: &ProfileRecord) -> Self {
        let exam = record.exam().to_owned();
        Self {
            first_name: record.first_name(user),
            avatar: AvatarSlot::for_user(record, user),
            subjects: subjects_for(&exam).to_vec(),
            badge: record.exam_badge(),
            exam,
            stats: StudyStats::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DashboardAction {
    /// Quick action card, by title.
    QuickAction(String),
    OpenSubject(String),
    RegisterUpcoming(String),
    OpenResource(String),
    Profile,
    SignOut,
}

pub struct DashboardPage {
    services: Services,
    view: Option<DashboardView>,
}

impl DashboardPage {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            view: None,
        }
    }

    pub fn view(&self) -> Option<&DashboardView> {
        self.view.as_ref()
    }

    pub async fn on_auth_state(&mut self, user: Option<AuthUser>) -> Reaction {
        match onboarded_gate(&self.services, user).await {
            Gate::Open(user, record) => {
                self.view = Some(DashboardView::build(&user, &record));
                Reaction::none()
            }
            Gate::Redirect(route) => Reaction::route(route),
            Gate::Stuck => Reaction::none(),
        }
    }

    pub async fn dispatch(&self, action: DashboardAction) -> Reaction {
        debug!("dashboard action {action:?}");
        match action {
            DashboardAction::QuickAction(title)
                if title == MOCK_TEST_ACTION =>
            {
                Reaction::route(Route::MockTest)
            }
            DashboardAction::QuickAction(title) => {
                Reaction::notice(Notice::info(format!(
                    "{title} feature coming soon!"
                )))
            }
            DashboardAction::OpenSubject(name) => Reaction::notice(
                Notice::info(format!("{name} module coming soon!")),
            ),
            DashboardAction::RegisterUpcoming(title) => {
                Reaction::notice(Notice::info(format!(
                    "Registration for \"{title}\" coming soon!"
                )))
            }
            DashboardAction::OpenResource(title) => {
                Reaction::notice(Notice::info(format!("{title} coming soon!")))
            }
            DashboardAction::Profile => Reaction::route(Route::Profile),
            DashboardAction::SignOut => self.services.sign_out().await,
        }
    }
}
