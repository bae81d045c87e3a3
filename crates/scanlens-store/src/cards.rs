//! SQLite store for saved result cards.

use chrono::{DateTime, Utc};
use scanlens_core::ResultCard;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS result_cards (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        title      TEXT    NOT NULL,
        subtitle   TEXT    NOT NULL,
        image_ref  TEXT,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS result_cards_created_at ON result_cards (created_at);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("row {id} has an invalid timestamp: {millis}")]
    InvalidTimestamp { id: i64, millis: i64 },
}

/// A result card as stored, with its auto-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCard {
    pub id: i64,
    #[serde(flatten)]
    pub card: ResultCard,
}

struct RawRow {
    id: i64,
    title: String,
    subtitle: String,
    image_ref: Option<String>,
    created_at: i64,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            subtitle: row.get(2)?,
            image_ref: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_stored(self) -> Result<StoredCard, StoreError> {
        let created_at: DateTime<Utc> = DateTime::from_timestamp_millis(self.created_at).ok_or(
            StoreError::InvalidTimestamp {
                id: self.id,
                millis: self.created_at,
            },
        )?;
        Ok(StoredCard {
            id: self.id,
            card: ResultCard {
                title: self.title,
                subtitle: self.subtitle,
                image_ref: self.image_ref,
                created_at,
            },
        })
    }
}

/// Process-wide store of saved result cards.
///
/// Clones share one connection. Every insert and clear bumps a revision
/// counter that [`CardFeed`] subscribers wake on.
#[derive(Clone)]
pub struct ResultStore {
    conn: Connection,
    revision: Arc<watch::Sender<u64>>,
}

impl ResultStore {
    /// Open (or create) the database file, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        tracing::info!(path = %path.display(), "result store opened");
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().await?).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|c| {
            c.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        let (revision, _) = watch::channel(0);
        Ok(Self {
            conn,
            revision: Arc::new(revision),
        })
    }

    /// Insert one card. Every call creates a new row.
    pub async fn insert(&self, card: ResultCard) -> Result<i64, StoreError> {
        let id = self
            .conn
            .call(move |c| {
                c.execute(
                    "INSERT INTO result_cards (title, subtitle, image_ref, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        card.title,
                        card.subtitle,
                        card.image_ref,
                        card.created_at.timestamp_millis()
                    ],
                )?;
                Ok(c.last_insert_rowid())
            })
            .await?;
        self.bump();
        tracing::debug!(id, "result card inserted");
        Ok(id)
    }

    /// All cards, newest first.
    pub async fn list(&self) -> Result<Vec<StoredCard>, StoreError> {
        let rows = self
            .conn
            .call(|c| {
                let mut stmt = c.prepare(
                    "SELECT id, title, subtitle, image_ref, created_at
                     FROM result_cards
                     ORDER BY created_at DESC, id DESC",
                )?;
                let rows = stmt
                    .query_map([], RawRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(RawRow::into_stored).collect()
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        let count = self
            .conn
            .call(|c| {
                let n: i64 = c.query_row("SELECT COUNT(*) FROM result_cards", [], |r| r.get(0))?;
                Ok(n)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Delete every card. Returns the number of rows removed.
    pub async fn clear_all(&self) -> Result<usize, StoreError> {
        let removed = self
            .conn
            .call(|c| Ok(c.execute("DELETE FROM result_cards", [])?))
            .await?;
        self.bump();
        tracing::info!(removed, "result history cleared");
        Ok(removed)
    }

    /// Observe the card list: the current list first, then a fresh one after every change.
    pub fn watch(&self) -> CardFeed {
        CardFeed {
            store: self.clone(),
            rx: self.revision.subscribe(),
            primed: false,
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

/// Stream of card lists, newest first, following a [`ResultStore`].
pub struct CardFeed {
    store: ResultStore,
    rx: watch::Receiver<u64>,
    primed: bool,
}

impl CardFeed {
    /// The current list on the first call; afterwards waits for the next change.
    ///
    /// Several changes between calls collapse into one list.
    pub async fn next(&mut self) -> Result<Vec<StoredCard>, StoreError> {
        if self.primed {
            // The feed owns a store clone, so the sender outlives this receiver.
            let _ = self.rx.changed().await;
        }
        self.primed = true;
        self.rx.borrow_and_update();
        self.store.list().await
    }
}
