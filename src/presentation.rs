//! What the page controllers hand to the rendering layer.

use std::collections::BTreeMap;

use crate::identity::AuthUser;
use crate::profile::ProfileRecord;

/// Content of one avatar slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AvatarSlot {
    /// Background image source: a data URL or a remote photo URL.
    Image(String),
    /// Uppercase initial over the default gradient.
    Initial(char),
    Loading,
}

impl AvatarSlot {
    pub fn for_user(record: &ProfileRecord, user: &AuthUser) -> Self {
        match record.avatar_source(user) {
            Some(source) => AvatarSlot::Image(source.to_owned()),
            None => {
                let initial = record
                    .display_name(user)
                    .chars()
                    .next()
                    .and_then(|c| c.to_uppercase().next())
                    .unwrap_or('S');
                AvatarSlot::Initial(initial)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotId {
    /// Large avatar on the profile page.
    ProfileDisplay,
    /// Small avatar in the navigation bar.
    NavBadge,
}

/// Contents of every avatar slot on a page at one moment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvatarFrame {
    slots: BTreeMap<SlotId, AvatarSlot>,
}

impl AvatarFrame {
    pub fn uniform(slot: AvatarSlot) -> Self {
        Self::default()
            .with(SlotId::ProfileDisplay, slot.clone())
            .with(SlotId::NavBadge, slot)
    }

    pub fn with(mut self, id: SlotId, slot: AvatarSlot) -> Self {
        self.slots.insert(id, slot);
        self
    }

    pub fn get(&self, id: SlotId) -> Option<&AvatarSlot> {
        self.slots.get(&id)
    }
}

/// Rendering port for avatar slots.
pub trait AvatarDisplay: Send {
    fn current(&self) -> AvatarFrame;

    fn render(&mut self, frame: AvatarFrame);
}

/// Keeps every rendered frame; used by the binary and by tests.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    history: Vec<AvatarFrame>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[AvatarFrame] {
        &self.history
    }
}

impl AvatarDisplay for RecordingDisplay {
    fn current(&self) -> AvatarFrame {
        self.history.last().cloned().unwrap_or_default()
    }

    fn render(&mut self, frame: AvatarFrame) {
        self.history.push(frame);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// Message surfaced to the user after an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }
}
