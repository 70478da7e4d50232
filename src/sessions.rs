//! # Session Registry
//!
//! Owner id → session slot. Each slot has its own async mutex so that events
//! of one owner are handled one at a time while different owners proceed
//! concurrently. The map lock is only held to find or create a slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::dialogue::Session;

/// Default inactivity window for a waiting step
pub const DEFAULT_CONVERSATION_TIMEOUT: Duration = Duration::from_secs(600);

type Slot = Arc<AsyncMutex<Option<Session>>>;

/// Exclusive access to one owner's session
pub struct SessionGuard {
    pub owner: i64,
    /// True when the slot did not exist before this call
    pub fresh: bool,
    guard: OwnedMutexGuard<Option<Session>>,
}

impl std::ops::Deref for SessionGuard {
    type Target = Option<Session>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl std::ops::DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

pub struct SessionRegistry {
    slots: Mutex<HashMap<i64, Slot>>,
    timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERSATION_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_expired(&self, session: &Session) -> bool {
        session.idle_for() >= self.timeout
    }

    /// Wait for exclusive access to `owner`'s slot, creating it if needed
    pub async fn acquire(&self, owner: i64) -> SessionGuard {
        let (slot, fresh) = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            match slots.get(&owner) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot: Slot = Arc::new(AsyncMutex::new(None));
                    slots.insert(owner, Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        SessionGuard {
            owner,
            fresh,
            guard: slot.lock_owned().await,
        }
    }

    /// Whether `owner` has a session that has not timed out.
    ///
    /// Returns `false` while another task holds the slot.
    pub fn has_active_session(&self, owner: i64) -> bool {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            match slots.get(&owner) {
                Some(slot) => Arc::clone(slot),
                None => return false,
            }
        };
        let result = match slot.try_lock() {
            Ok(guard) => guard.as_ref().is_some_and(|s| !self.is_expired(s)),
            Err(_) => false,
        };
        result
    }

    /// Drop sessions idle past the timeout and prune empty slots.
    ///
    /// Slots currently held by a handler are skipped. Returns the owners
    /// whose sessions were discarded.
    pub fn expire_idle(&self) -> Vec<i64> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let mut expired = Vec::new();
        let mut empty = Vec::new();

        for (owner, slot) in slots.iter() {
            let Ok(mut guard) = slot.try_lock() else {
                continue;
            };
            match guard.as_ref() {
                Some(session) if self.is_expired(session) => {
                    info!(
                        user_id = owner,
                        flow = session.flow.name(),
                        step = session.step.as_str(),
                        "Conversation timed out"
                    );
                    *guard = None;
                    expired.push(*owner);
                }
                Some(_) => {}
                None => {
                    // Only the map holds it, so nobody can be waiting on it
                    if Arc::strong_count(slot) == 1 {
                        empty.push(*owner);
                    }
                }
            }
        }

        for owner in empty {
            slots.remove(&owner);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Expired idle sessions");
        }
        expired
    }

    /// Number of owners with a slot, active or not
    pub fn slot_count(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }
}
