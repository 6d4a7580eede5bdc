//! Redb-backed session store.
//!
//! # Schema
//!
//! ```text
//! SESSIONS:  token -> SessionDescriptor (serde_json)
//! RESUMABLE: token -> ()
//! QUEUE:     "account\0{seq:020}" -> MessageEvent (serde_json)
//! QUEUE_SEQ: account -> next seq
//! ```
//!
//! Redb transactions are blocking, so every call hops onto the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use jabgate_proto::MessageEvent;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::{debug, info, warn};

use super::{SessionDescriptor, SessionStore};
use crate::error::StoreError;

const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
const RESUMABLE: TableDefinition<&str, ()> = TableDefinition::new("resumable");
const QUEUE: TableDefinition<&str, &[u8]> = TableDefinition::new("queue");
const QUEUE_SEQ: TableDefinition<&str, u64> = TableDefinition::new("queue_seq");

/// Session store persisted in a single redb file.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref())?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        info!(path = %path.as_ref().display(), "Session store opened");
        Ok(store)
    }

    fn init_tables(&self) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(RESUMABLE)?;
            let _ = write_txn.open_table(QUEUE)?;
            let _ = write_txn.open_table(QUEUE_SEQ)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    /// Queue keys sort by account, then by arrival.
    fn queue_key(account: &str, seq: u64) -> String {
        format!("{account}\0{seq:020}")
    }

    /// Half-open key range covering one account's queue.
    fn queue_range(account: &str) -> (String, String) {
        (format!("{account}\0"), format!("{account}\u{1}"))
    }
}

fn save_sync(db: &Database, descriptor: &SessionDescriptor) -> Result<(), StoreError> {
    let value = serde_json::to_vec(descriptor)?;
    let write_txn = db.begin_write()?;
    {
        let mut sessions = write_txn.open_table(SESSIONS)?;
        sessions.insert(descriptor.token.as_str(), value.as_slice())?;
        let mut resumable = write_txn.open_table(RESUMABLE)?;
        resumable.insert(descriptor.token.as_str(), ())?;
    }
    write_txn.commit()?;
    Ok(())
}

fn load_sync(db: &Database, token: &str) -> Result<Option<SessionDescriptor>, StoreError> {
    let read_txn = db.begin_read()?;
    let sessions = read_txn.open_table(SESSIONS)?;
    match sessions.get(token)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn load_all_sync(db: &Database) -> Result<Vec<SessionDescriptor>, StoreError> {
    let mut descriptors = Vec::new();
    let mut stale = Vec::new();
    {
        let read_txn = db.begin_read()?;
        let sessions = read_txn.open_table(SESSIONS)?;
        let resumable = read_txn.open_table(RESUMABLE)?;
        for item in resumable.iter()? {
            let (token, _) = item?;
            let token = token.value();
            let Some(value) = sessions.get(token)? else {
                stale.push(token.to_string());
                continue;
            };
            match serde_json::from_slice::<SessionDescriptor>(value.value()) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(e) => warn!(error = %e, "Failed to deserialize session descriptor, skipping"),
            }
        }
    }

    if !stale.is_empty() {
        let write_txn = db.begin_write()?;
        {
            let mut resumable = write_txn.open_table(RESUMABLE)?;
            for token in &stale {
                resumable.remove(token.as_str())?;
            }
        }
        write_txn.commit()?;
        debug!(count = stale.len(), "Pruned resumable tokens without a descriptor");
    }

    Ok(descriptors)
}

fn remove_sync(db: &Database, token: &str) -> Result<bool, StoreError> {
    let write_txn = db.begin_write()?;
    let removed = {
        let mut sessions = write_txn.open_table(SESSIONS)?;
        let mut resumable = write_txn.open_table(RESUMABLE)?;
        let removed = sessions.remove(token)?.is_some();
        resumable.remove(token)?;
        removed
    };
    write_txn.commit()?;
    Ok(removed)
}

fn enqueue_sync(db: &Database, account: &str, event: &MessageEvent) -> Result<(), StoreError> {
    let value = serde_json::to_vec(event)?;
    let write_txn = db.begin_write()?;
    {
        let mut seqs = write_txn.open_table(QUEUE_SEQ)?;
        let seq = seqs.get(account)?.map(|v| v.value()).unwrap_or(0);
        seqs.insert(account, seq + 1)?;

        let mut queue = write_txn.open_table(QUEUE)?;
        let key = RedbStore::queue_key(account, seq);
        queue.insert(key.as_str(), value.as_slice())?;
    }
    write_txn.commit()?;
    Ok(())
}

fn drain_sync(db: &Database, account: &str) -> Result<Vec<MessageEvent>, StoreError> {
    let (start, end) = RedbStore::queue_range(account);
    let write_txn = db.begin_write()?;
    let mut events = Vec::new();
    {
        let mut queue = write_txn.open_table(QUEUE)?;
        let mut keys = Vec::new();
        for item in queue.range(start.as_str()..end.as_str())? {
            let (key, value) = item?;
            keys.push(key.value().to_string());
            match serde_json::from_slice::<MessageEvent>(value.value()) {
                Ok(event) => events.push(event),
                Err(e) => warn!(key = %key.value(), error = %e, "Dropping undecodable queued event"),
            }
        }
        for key in &keys {
            queue.remove(key.as_str())?;
        }
        let mut seqs = write_txn.open_table(QUEUE_SEQ)?;
        seqs.remove(account)?;
    }
    write_txn.commit()?;
    Ok(events)
}

#[async_trait]
impl SessionStore for RedbStore {
    async fn save(&self, descriptor: &SessionDescriptor) -> Result<(), StoreError> {
        let descriptor = descriptor.clone();
        self.blocking(move |db| save_sync(db, &descriptor)).await
    }

    async fn load(&self, token: &str) -> Result<Option<SessionDescriptor>, StoreError> {
        let token = token.to_string();
        self.blocking(move |db| load_sync(db, &token)).await
    }

    async fn load_all(&self) -> Result<Vec<SessionDescriptor>, StoreError> {
        let descriptors = self.blocking(load_all_sync).await?;
        info!(count = descriptors.len(), "Loaded resumable sessions");
        Ok(descriptors)
    }

    async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        let token = token.to_string();
        self.blocking(move |db| remove_sync(db, &token)).await
    }

    async fn enqueue(&self, account: &str, event: &MessageEvent) -> Result<(), StoreError> {
        let account = account.to_string();
        let event = event.clone();
        self.blocking(move |db| enqueue_sync(db, &account, &event)).await
    }

    async fn drain(&self, account: &str) -> Result<Vec<MessageEvent>, StoreError> {
        let account = account.to_string();
        self.blocking(move |db| drain_sync(db, &account)).await
    }
}
