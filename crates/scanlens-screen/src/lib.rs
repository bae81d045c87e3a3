//! scanlens-screen — Per-screen state holders.
//!
//! Each detection screen owns a [`Scanner`]: it feeds frames and picked
//! images to an inference engine thread, reconciles the returned detections
//! into an accumulated result set, and publishes results, UI state and
//! camera selection as observable values. [`HistoryScreen`] does the same
//! for the list of saved result cards.

pub mod engine;
pub mod history;
pub mod permission;
pub mod persist;
pub mod scanner;
pub mod state;
mod tasks;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{spawn_engine, Completion, DetectionReply, EngineError, EngineHandle};
pub use history::HistoryScreen;
pub use permission::{PermissionHub, PermissionId, Permissions};
pub use persist::CardSink;
pub use scanner::Scanner;
pub use state::{Observable, UiState};
