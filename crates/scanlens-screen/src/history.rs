//! State holder for the saved-results screen.

use crate::state::{Observable, UiState};
use crate::tasks::TaskScope;
use scanlens_store::{ResultStore, StoredCard};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

const HISTORY_CLEARED: &str = "History cleared";

struct Shared {
    store: ResultStore,
    cards: Observable<Vec<StoredCard>>,
    ui_state: Observable<UiState>,
}

/// Saved result cards, newest first, kept current from the store.
///
/// Must be created inside a Tokio runtime.
pub struct HistoryScreen {
    tasks: TaskScope,
    follower: JoinHandle<()>,
    shared: Arc<Shared>,
}

impl HistoryScreen {
    pub fn new(store: ResultStore) -> Self {
        let mut feed = store.watch();
        let shared = Arc::new(Shared {
            store,
            cards: Observable::default(),
            ui_state: Observable::default(),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let follower = tokio::spawn(async move {
            loop {
                let next = feed.next().await;
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                match next {
                    Ok(cards) => {
                        shared.cards.set(cards);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to load result history");
                        shared.ui_state.set(UiState::error(e.to_string()));
                    }
                }
            }
        });

        Self {
            tasks: TaskScope::default(),
            follower,
            shared,
        }
    }

    pub fn cards(&self) -> &Observable<Vec<StoredCard>> {
        &self.shared.cards
    }

    pub fn ui_state(&self) -> &Observable<UiState> {
        &self.shared.ui_state
    }

    /// Delete every saved card.
    pub fn clear_all(&self) {
        self.shared.ui_state.set(UiState::Loading);
        let weak = Arc::downgrade(&self.shared);
        let store = self.shared.store.clone();
        self.tasks.spawn(async move {
            let outcome = store.clear_all().await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            match outcome {
                Ok(_) => shared.ui_state.set(UiState::success(HISTORY_CLEARED)),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to clear result history");
                    shared.ui_state.set(UiState::error(e.to_string()))
                }
            };
        });
    }

    pub fn reset_ui_state(&self) {
        self.shared.ui_state.set(UiState::Idle);
    }

    /// Wait for every `clear_all` issued so far to finish.
    pub async fn wait_idle(&self) {
        self.tasks.wait_idle().await;
    }
}

impl Drop for HistoryScreen {
    fn drop(&mut self) {
        self.follower.abort();
    }
}
