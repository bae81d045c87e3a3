//! scanlens-store — Persistence for saved results and user preferences.
//!
//! Result cards live in a SQLite database accessed through `tokio-rusqlite`,
//! whose background thread serializes concurrent writers. Preferences
//! (theme, onboarding, sign-in) are a small TOML file.

pub mod cards;
pub mod prefs;

pub use cards::{CardFeed, ResultStore, StoreError, StoredCard};
pub use prefs::{Preferences, PreferencesStore, PrefsError, Theme};
