//! Per-chat conversational state kept in memory with idle eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Which sub-state of the engine a chat is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Idle,
    /// Looking at one equipment, or choosing one when `None`.
    EquipmentView { equipment_id: Option<i64> },
    ChecklistFill,
    /// A NOK answer is waiting for its observation text.
    AwaitingObservation { item_id: i64 },
}

/// State of one chat.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSession {
    pub chat_id: i64,
    pub operator_id: Option<i64>,
    pub authenticated: bool,
    pub focus: Focus,
    pub checklist_uuid: Option<String>,
    /// Item currently presented.
    pub cursor: Option<i64>,
    /// Partial inputs, e.g. a QR scanned before login.
    pub scratch: HashMap<String, String>,
    pub last_activity: DateTime<Utc>,
}

impl OperatorSession {
    pub fn new(chat_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            operator_id: None,
            authenticated: false,
            focus: Focus::Idle,
            checklist_uuid: None,
            cursor: None,
            scratch: HashMap::new(),
            last_activity: now,
        }
    }

    pub fn login(&mut self, operator_id: i64) {
        self.operator_id = Some(operator_id);
        self.authenticated = true;
        self.focus = Focus::Idle;
    }

    /// Drop the checklist context and return to idle.
    pub fn leave_checklist(&mut self) {
        self.focus = Focus::Idle;
        self.checklist_uuid = None;
        self.cursor = None;
    }

    pub fn is_expired(&self, now: DateTime<Utc>, idle_timeout: chrono::Duration) -> bool {
        now - self.last_activity > idle_timeout
    }
}

/// How [`SessionStore::begin`] found the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session existed.
    New,
    /// A session existed but had been idle too long; it was discarded.
    Expired,
    Live,
}

/// Chat-id keyed sessions.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<i64, OperatorSession>>,
    idle_timeout: chrono::Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: chrono::Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Load the chat's session, discarding it first if it expired.
    pub async fn begin(&self, chat_id: i64, now: DateTime<Utc>) -> (OperatorSession, SessionStatus) {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&chat_id) {
            Some(s) if s.is_expired(now, self.idle_timeout) => {
                sessions.remove(&chat_id);
                debug!(chat_id, "Session expired");
                (OperatorSession::new(chat_id, now), SessionStatus::Expired)
            }
            Some(s) => (s.clone(), SessionStatus::Live),
            None => (OperatorSession::new(chat_id, now), SessionStatus::New),
        }
    }

    pub async fn get(&self, chat_id: i64) -> Option<OperatorSession> {
        self.sessions.read().await.get(&chat_id).cloned()
    }

    pub async fn save(&self, session: OperatorSession) {
        self.sessions.write().await.insert(session.chat_id, session);
    }

    pub async fn remove(&self, chat_id: i64) {
        self.sessions.write().await.remove(&chat_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every session idle longer than the timeout. Returns how many went.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, self.idle_timeout));
        before - sessions.len()
    }

    /// Periodically evict idle sessions in the background.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let evicted = store.evict_expired(Utc::now()).await;
                if evicted > 0 {
                    info!("Evicted {} idle sessions", evicted);
                }
            }
        })
    }
}
