//! Core of the PrepMind exam preparation app.
//!
//! The interesting part is [`avatar`]: turning a user-selected image into a
//! small JPEG data URL stored on the profile document. Everything the pages
//! need from the outside world goes through two ports, [`IdentityProvider`]
//! and [`ProfileStore`], with in-memory adapters in [`memory`].
//!
//! [`IdentityProvider`]: identity::IdentityProvider
//! [`ProfileStore`]: store::ProfileStore

pub mod avatar;
pub mod config;
mod errors;
pub mod identity;
pub mod memory;
pub mod pages;
pub mod presentation;
pub mod profile;
pub mod settings;
pub mod store;

pub use errors::{PrepmindError, Result};

/// Collection holding one profile document per user id.
pub const USERS_COLLECTION: &str = "users";
/// Settings key of the colour theme.
pub const THEME_KEY: &str = "prepmind-theme";
