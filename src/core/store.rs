//! In-memory session registry
//!
//! Every connected user gets one [`ConversationSession`] behind its own
//! async mutex. A turn holds that lock until the reply is appended, which
//! keeps turns within a session strictly ordered. Nothing is persisted.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::session::{ConversationSession, SamplingParams};

/// A session plus bookkeeping for idle expiry
#[derive(Debug)]
pub struct SessionEntry {
    pub session: ConversationSession,
    pub last_active: DateTime<Utc>,
}

impl SessionEntry {
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

pub type SessionHandle = Arc<Mutex<SessionEntry>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    system_prompt: String,
    sampling: SamplingParams,
}

impl SessionStore {
    pub fn new(system_prompt: impl Into<String>, sampling: SamplingParams) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            system_prompt: system_prompt.into(),
            sampling,
        }
    }

    /// Start a fresh session and return its id
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let entry = SessionEntry {
            session: ConversationSession::new(&self.system_prompt, self.sampling.clone()),
            last_active: Utc::now(),
        };

        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(entry)));
        tracing::info!(session = %id, "session created");
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Lock a session and mark it active.
    ///
    /// The session may be swept or ended while we wait for its lock, so
    /// membership is checked again once the lock is held. A locked session
    /// is never swept, which makes the check stick.
    pub async fn lock(&self, id: &Uuid) -> Option<OwnedMutexGuard<SessionEntry>> {
        let handle = self.get(id).await?;
        let mut entry = handle.clone().lock_owned().await;

        let current = self.get(id).await?;
        if !Arc::ptr_eq(&current, &handle) {
            return None;
        }

        entry.touch();
        Some(entry)
    }

    /// End a session. Returns false if it did not exist.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session = %id, "session ended");
        }
        removed
    }

    /// Drop sessions idle for longer than `max_idle`; returns how many went.
    ///
    /// Sessions whose lock is held are mid-turn and always survive.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(entry) => entry.last_active >= cutoff,
            Err(_) => true,
        });

        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, remaining = sessions.len(), "expired idle sessions");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Run [`SessionStore::sweep_idle`] forever on a fixed interval.
pub async fn run_sweeper(
    store: Arc<SessionStore>,
    idle_timeout: std::time::Duration,
    interval: std::time::Duration,
) {
    let max_idle = match Duration::from_std(idle_timeout) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, "idle timeout out of range, sweeper disabled");
            return;
        }
    };

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        store.sweep_idle(max_idle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new("You are a wellness coach.", SamplingParams::default())
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = store();
        let id = store.create().await;
        assert_eq!(store.len().await, 1);

        let handle = store.get(&id).await.unwrap();
        assert_eq!(handle.lock().await.session.log().len(), 1);

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert!(store.get(&id).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = store();
        let a = store.create().await;
        let b = store.create().await;
        assert_ne!(a, b);

        store.get(&a).await.unwrap().lock().await.session.append_user("only in a");

        let b_handle = store.get(&b).await.unwrap();
        assert_eq!(b_handle.lock().await.session.history().count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_idle() {
        let store = store();
        let stale = store.create().await;
        let fresh = store.create().await;

        store.get(&stale).await.unwrap().lock().await.last_active =
            Utc::now() - Duration::hours(2);

        let removed = store.sweep_idle(Duration::hours(1)).await;
        assert_eq!(removed, 1);
        assert!(store.get(&stale).await.is_none());
        assert!(store.get(&fresh).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_skips_busy_session() {
        let store = store();
        let id = store.create().await;
        let handle = store.get(&id).await.unwrap();

        let mut guard = handle.lock().await;
        guard.last_active = Utc::now() - Duration::hours(2);

        assert_eq!(store.sweep_idle(Duration::hours(1)).await, 0);
        drop(guard);
        assert_eq!(store.sweep_idle(Duration::hours(1)).await, 1);
    }

    #[tokio::test]
    async fn test_lock_touches_session() {
        let store = store();
        let id = store.create().await;
        store.get(&id).await.unwrap().lock().await.last_active = Utc::now() - Duration::hours(2);

        let entry = store.lock(&id).await.unwrap();
        assert!(entry.last_active > Utc::now() - Duration::minutes(1));
        drop(entry);

        assert!(store.lock(&Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_lock_fails_for_session_removed_while_waiting() {
        let store = Arc::new(store());
        let id = store.create().await;
        let handle = store.get(&id).await.unwrap();
        let guard = handle.lock().await;

        let waiter = tokio::spawn({
            let store = store.clone();
            async move { store.lock(&id).await.is_some() }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(store.remove(&id).await);
        drop(guard);
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_touch_updates_last_active() {
        let store = store();
        let id = store.create().await;
        let handle = store.get(&id).await.unwrap();

        let mut entry = handle.lock().await;
        entry.last_active = Utc::now() - Duration::hours(2);
        entry.touch();
        assert!(entry.last_active > Utc::now() - Duration::minutes(1));
    }
}
