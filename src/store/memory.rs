//! In-process session store.
//!
//! Nothing survives a restart. Used by tests and by `backend = "memory"`.

use std::collections::{BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use jabgate_proto::MessageEvent;
use parking_lot::Mutex;

use super::{SessionDescriptor, SessionStore};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, SessionDescriptor>,
    resumable: BTreeSet<String>,
    queues: HashMap<String, VecDeque<MessageEvent>>,
}

/// Session store held in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued events for an account, without draining them.
    pub fn queued(&self, account: &str) -> usize {
        self.inner.lock().queues.get(account).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, descriptor: &SessionDescriptor) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.resumable.insert(descriptor.token.clone());
        inner.sessions.insert(descriptor.token.clone(), descriptor.clone());
        Ok(())
    }

    async fn load(&self, token: &str) -> Result<Option<SessionDescriptor>, StoreError> {
        Ok(self.inner.lock().sessions.get(token).cloned())
    }

    async fn load_all(&self) -> Result<Vec<SessionDescriptor>, StoreError> {
        let mut inner = self.inner.lock();
        let Inner { sessions, resumable, .. } = &mut *inner;
        resumable.retain(|token| sessions.contains_key(token));
        Ok(resumable.iter().filter_map(|t| sessions.get(t).cloned()).collect())
    }

    async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        inner.resumable.remove(token);
        Ok(inner.sessions.remove(token).is_some())
    }

    async fn enqueue(&self, account: &str, event: &MessageEvent) -> Result<(), StoreError> {
        self.inner
            .lock()
            .queues
            .entry(account.to_string())
            .or_default()
            .push_back(event.clone());
        Ok(())
    }

    async fn drain(&self, account: &str) -> Result<Vec<MessageEvent>, StoreError> {
        Ok(self
            .inner
            .lock()
            .queues
            .remove(account)
            .map(Vec::from)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_consumes_backlog() {
        let store = MemoryStore::new();
        let event = MessageEvent {
            from: "b@example.com/res".into(),
            time: 1,
            kind: None,
            body: Some("hi".into()),
            otr: None,
        };
        store.enqueue("a@example.com", &event).await.unwrap();
        assert_eq!(store.queued("a@example.com"), 1);

        assert_eq!(store.drain("a@example.com").await.unwrap(), vec![event]);
        assert!(store.drain("a@example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_all_after_remove() {
        let store = MemoryStore::new();
        store.save(&SessionDescriptor::new("t1", "a@example.com", "S")).await.unwrap();
        store.save(&SessionDescriptor::new("t2", "b@example.com", "S")).await.unwrap();
        store.remove("t1").await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].token, "t2");
    }
}
