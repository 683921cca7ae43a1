use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lottery_shared::{
    KeyValueStore, LocalClock, Lottery, LotteryResult, RedemptionSession, SessionState,
};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::Config;
use crate::identity::IdentityResolver;

pub type SharedStore = Arc<dyn KeyValueStore>;
pub type SharedLottery = Arc<Mutex<Lottery<SharedStore>>>;

#[derive(Clone)]
pub struct AppState {
    pub lottery: SharedLottery,
    pub sessions: Arc<SessionRegistry>,
    pub identity: Arc<IdentityResolver>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: SharedStore) -> LotteryResult<Self> {
        let lottery = Lottery::open(
            store,
            LocalClock,
            config.prizes.clone(),
            config.settings.clone(),
        )?;

        Ok(Self {
            lottery: Arc::new(Mutex::new(lottery)),
            sessions: Arc::new(SessionRegistry::new(config.session_ttl)),
            identity: Arc::new(IdentityResolver::new(config.ip_echo_url.clone())),
            config: Arc::new(config),
        })
    }
}

struct SessionEntry {
    session: RedemptionSession,
    created_at: Instant,
}

/// Live redemption sessions by id. A session leaves the registry when it
/// settles, is abandoned, or sits unspun past the TTL.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn insert(&self, session: RedemptionSession) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.lock().insert(
            id,
            SessionEntry {
                session,
                created_at: Instant::now(),
            },
        );
        id
    }

    pub fn with_session<T>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut RedemptionSession) -> T,
    ) -> Option<T> {
        self.sessions.lock().get_mut(id).map(|entry| f(&mut entry.session))
    }

    pub fn remove(&self, id: &Uuid) -> Option<RedemptionSession> {
        self.sessions.lock().remove(id).map(|entry| entry.session)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Drops verified sessions that were never spun within the TTL.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.session.state() == SessionState::Spinning || entry.created_at.elapsed() < self.ttl
        });
        before - sessions.len()
    }
}

/// Abandons a spinning session if the request driving it goes away before
/// the spin settles.
pub struct SpinGuard {
    sessions: Arc<SessionRegistry>,
    id: Uuid,
    armed: bool,
}

impl SpinGuard {
    pub fn new(sessions: Arc<SessionRegistry>, id: Uuid) -> Self {
        Self {
            sessions,
            id,
            armed: true,
        }
    }

    /// Takes the session out of the registry for settling.
    pub fn take(mut self) -> Option<RedemptionSession> {
        self.armed = false;
        self.sessions.remove(&self.id)
    }
}

impl Drop for SpinGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(mut session) = self.sessions.remove(&self.id) {
            session.abandon();
            tracing::warn!("Spin for session {} was abandoned before settling", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_keeps_fresh_sessions() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        registry.insert(RedemptionSession::new());
        assert_eq!(registry.purge_expired(), 0);
        assert_eq!(registry.len(), 1);

        let expired = SessionRegistry::new(Duration::ZERO);
        expired.insert(RedemptionSession::new());
        assert_eq!(expired.purge_expired(), 1);
    }

    #[test]
    fn test_dropped_guard_removes_session() {
        let registry = Arc::new(SessionRegistry::new(Duration::from_secs(60)));
        let id = registry.insert(RedemptionSession::new());
        drop(SpinGuard::new(registry.clone(), id));
        assert!(registry.remove(&id).is_none());

        let id = registry.insert(RedemptionSession::new());
        let guard = SpinGuard::new(registry.clone(), id);
        assert!(guard.take().is_some());
        assert_eq!(registry.len(), 0);
    }
}
