use log::{debug, error, info, warn};

use super::{Reaction, Route, Services};
use crate::avatar::{check_declared_size, AvatarPipeline, ImageAsset};
use crate::identity::{AuthUser, Credential, OAuthProvider, ProviderKind};
use crate::presentation::{
    AvatarDisplay, AvatarFrame, AvatarSlot, Notice, SlotId,
};
use crate::profile::{ProfileEdit, ProfileRecord};
use crate::{PrepmindError, Result};

const PLACEHOLDER: &str = "-";

/// Text fields of the profile page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub target_exam: String,
    pub education_level: String,
    pub target_year: String,
    pub study_hours: String,
    pub preferred_language: String,
    pub member_since: Option<String>,
    pub badge: String,
}

impl ProfileView {
    pub fn build(user: &AuthUser, record: &ProfileRecord) -> Self {
        let or_dash = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or(PLACEHOLDER)
                .to_owned()
        };
        Self {
            name: record.display_name(user),
            email: user.email.clone(),
            target_exam: or_dash(&record.target_exam),
            education_level: or_dash(&record.education_level),
            target_year: or_dash(&record.target_year),
            study_hours: or_dash(&record.study_hours),
            preferred_language: or_dash(&record.preferred_language),
            member_since: record.member_since(),
            badge: record.exam_badge(),
        }
    }
}

/// How account deletion must be confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletePrompt {
    Password,
    GooglePopup,
}

impl From<ProviderKind> for DeletePrompt {
    fn from(provider: ProviderKind) -> Self {
        match provider {
            ProviderKind::Google => DeletePrompt::GooglePopup,
            ProviderKind::Password => DeletePrompt::Password,
        }
    }
}

#[derive(Debug)]
pub enum ProfileAction {
    Dashboard,
    SignOut,
    EnterEdit,
    CancelEdit,
    SaveEdit(ProfileEdit),
    UploadAvatar(ImageAsset),
    /// Password is required for password accounts and ignored otherwise.
    DeleteAccount { password: Option<String> },
}

/// Profile page controller.
///
/// Owns the signed-in user, the cached profile record and the edit mode.
/// Actions are only accepted once a profile has been loaded.
pub struct ProfilePage<D: AvatarDisplay> {
    services: Services,
    pipeline: AvatarPipeline,
    display: D,
    /// Set by the first successful load and never cleared.
    actions_ready: bool,
    user: Option<AuthUser>,
    record: Option<ProfileRecord>,
    view: Option<ProfileView>,
    edit_form: Option<ProfileEdit>,
}

impl<D: AvatarDisplay> ProfilePage<D> {
    pub fn new(services: Services, display: D) -> Self {
        let pipeline = AvatarPipeline::new(
            services.store.clone(),
            services.config.users_collection.clone(),
        );
        Self {
            services,
            pipeline,
            display,
            actions_ready: false,
            user: None,
            record: None,
            view: None,
            edit_form: None,
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn view(&self) -> Option<&ProfileView> {
        self.view.as_ref()
    }

    pub fn record(&self) -> Option<&ProfileRecord> {
        self.record.as_ref()
    }

    /// Form contents while edit mode is open.
    pub fn edit_form(&self) -> Option<&ProfileEdit> {
        self.edit_form.as_ref()
    }

    pub fn delete_prompt(&self) -> Option<DeletePrompt> {
        self.user.as_ref().map(|user| user.provider.into())
    }

    pub async fn on_auth_state(&mut self, user: Option<AuthUser>) -> Reaction {
        let Some(user) = user else {
            self.clear();
            return Reaction::route(Route::Login);
        };

        match self.services.load_profile(&user.uid).await {
            Ok(Some(record)) => {
                if !self.actions_ready {
                    debug!("profile actions ready for {}", user.uid);
                    self.actions_ready = true;
                }
                self.user = Some(user);
                self.record = Some(record);
                self.render();
                Reaction::none()
            }
            Ok(None) => {
                info!("no profile document for {}", user.uid);
                Reaction::route(Route::Onboarding)
            }
            Err(e) => {
                error!("error loading user data for {}: {e}", user.uid);
                Reaction::none()
            }
        }
    }

    pub async fn dispatch(
        &mut self,
        action: ProfileAction,
    ) -> Result<Reaction> {
        if !self.actions_ready || self.user.is_none() {
            return Err(PrepmindError::NotSignedIn);
        }

        let reaction = match action {
            ProfileAction::Dashboard => Reaction::route(Route::Dashboard),
            ProfileAction::SignOut => self.services.sign_out().await,
            ProfileAction::EnterEdit => {
                if let (Some(user), Some(record)) = (&self.user, &self.record) {
                    self.edit_form = Some(ProfileEdit::prefilled(record, user));
                }
                Reaction::none()
            }
            ProfileAction::CancelEdit => {
                self.edit_form = None;
                Reaction::none()
            }
            ProfileAction::SaveEdit(edit) => self.save_edit(edit).await,
            ProfileAction::UploadAvatar(asset) => {
                self.upload_avatar(asset).await
            }
            ProfileAction::DeleteAccount { password } => {
                self.delete_account(password).await
            }
        };
        Ok(reaction)
    }

    fn clear(&mut self) {
        self.user = None;
        self.record = None;
        self.view = None;
        self.edit_form = None;
    }

    fn render(&mut self) {
        if let (Some(user), Some(record)) = (&self.user, &self.record) {
            self.view = Some(ProfileView::build(user, record));
            let slot = AvatarSlot::for_user(record, user);
            self.display.render(AvatarFrame::uniform(slot));
        }
    }

    async fn upload_avatar(&mut self, asset: ImageAsset) -> Reaction {
        if let Err(e) = check_declared_size(asset.declared_size()) {
            warn!("rejected avatar {}: {e}", asset.name());
            return Reaction::notice(Notice::error(e.user_message()));
        }
        let Some(uid) = self.user.as_ref().map(|u| u.uid.clone()) else {
            return Reaction::none();
        };

        let previous = self.display.current();
        self.display.render(
            previous
                .clone()
                .with(SlotId::ProfileDisplay, AvatarSlot::Loading),
        );

        match self.pipeline.ingest(&uid, asset).await {
            Ok(avatar) => {
                if let Some(record) = self.record.as_mut() {
                    record.photo_base64 = Some(avatar.into_string());
                }
                self.render();
                Reaction::notice(Notice::success(
                    "Profile picture updated successfully!",
                ))
            }
            Err(e) => {
                self.display.render(previous);
                Reaction::notice(Notice::error(e.user_message()))
            }
        }
    }

    async fn save_edit(&mut self, edit: ProfileEdit) -> Reaction {
        let Some(user) = self.user.clone() else {
            return Reaction::none();
        };

        match self.persist_edit(&user, &edit).await {
            Ok(()) => {
                if let Some(record) = self.record.as_mut() {
                    record.apply_edit(&edit);
                }
                if let Some(user) = self.user.as_mut() {
                    user.display_name = Some(edit.full_name.clone());
                }
                self.edit_form = None;
                self.render();
                Reaction::notice(Notice::success("Saved successfully!"))
            }
            Err(e) => {
                error!("error saving profile of {}: {e}", user.uid);
                Reaction::notice(Notice::error("Error saving."))
            }
        }
    }

    async fn persist_edit(
        &self,
        user: &AuthUser,
        edit: &ProfileEdit,
    ) -> Result<()> {
        self.services
            .store
            .update(
                &self.services.config.users_collection,
                &user.uid,
                edit.to_document()?,
            )
            .await?;

        if user.display_name.as_deref() != Some(edit.full_name.as_str()) {
            self.services
                .identity
                .update_display_name(&user.uid, &edit.full_name)
                .await?;
        }
        Ok(())
    }

    async fn delete_account(&mut self, password: Option<String>) -> Reaction {
        let Some(user) = self.user.clone() else {
            return Reaction::none();
        };

        match self.reauthenticate_and_delete(&user, password).await {
            Ok(()) => {
                self.clear();
                Reaction::notice(Notice::success(
                    "Account deleted successfully.",
                ))
                .then(Route::Landing)
            }
            Err(e) => {
                error!("error deleting account {}: {e}", user.uid);
                Reaction::notice(Notice::error(format!("Error: {e}")))
            }
        }
    }

    async fn reauthenticate_and_delete(
        &self,
        user: &AuthUser,
        password: Option<String>,
    ) -> Result<()> {
        let identity = &self.services.identity;
        match DeletePrompt::from(user.provider) {
            DeletePrompt::GooglePopup => {
                identity
                    .reauthenticate_with_popup(user, OAuthProvider::Google)
                    .await?
            }
            DeletePrompt::Password => {
                let password =
                    password.filter(|p| !p.is_empty()).ok_or_else(|| {
                        PrepmindError::Auth("missing-password".into())
                    })?;
                identity
                    .reauthenticate_with_credential(
                        user,
                        Credential::password(&user.email, password),
                    )
                    .await?
            }
        }

        identity.delete_account(user).await
    }
}
