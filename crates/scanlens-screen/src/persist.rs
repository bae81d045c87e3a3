//! Persistence adapter: forwards result cards to the storage collaborator.

use scanlens_core::ResultCard;
use scanlens_store::{ResultStore, StoreError};
use std::future::Future;
use std::sync::Arc;

/// Destination for saved result cards. Every call is an insert.
pub trait CardSink: Send + Sync + 'static {
    /// Store one card, returning its assigned id.
    fn save(&self, card: ResultCard) -> impl Future<Output = Result<i64, StoreError>> + Send;
}

impl CardSink for ResultStore {
    fn save(&self, card: ResultCard) -> impl Future<Output = Result<i64, StoreError>> + Send {
        self.insert(card)
    }
}

impl<T: CardSink> CardSink for Arc<T> {
    fn save(&self, card: ResultCard) -> impl Future<Output = Result<i64, StoreError>> + Send {
        (**self).save(card)
    }
}

/// Write `cards` one after another, stopping at the first failure.
pub async fn save_all<S: CardSink>(sink: &S, cards: Vec<ResultCard>) -> Result<Vec<i64>, StoreError> {
    let mut ids = Vec::with_capacity(cards.len());
    for card in cards {
        ids.push(sink.save(card).await?);
    }
    Ok(ids)
}
