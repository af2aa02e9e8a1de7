//! Runtime bookkeeping for in-progress charge and power sessions.
//!
//! A session is claimed when a start operation succeeds and released by
//! whichever comes first: the session's own exit path, an explicit stop, or
//! shutdown draining the table. Each claim gets a fresh session id so a
//! supervisor that is still tearing down cannot release its successor.

use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug)]
pub struct ChargingSession {
    pub session_id: Uuid,
    pub battery_id: Uuid,
    pub token: CancellationToken,
    pub handle: JoinHandle<()>,
}

#[derive(Debug)]
pub struct PoweringSession {
    pub session_id: Uuid,
    pub device_id: Uuid,
    /// Battery the device is drawing from.
    pub battery_id: Uuid,
    /// Name at start, so power-off can be reported after the battery is gone.
    pub battery_name: String,
    pub token: CancellationToken,
    pub handle: JoinHandle<()>,
}

pub trait Session: Send + 'static {
    fn session_id(&self) -> Uuid;
    fn into_handle(self) -> JoinHandle<()>;
}

impl Session for ChargingSession {
    fn session_id(&self) -> Uuid {
        self.session_id
    }
    fn into_handle(self) -> JoinHandle<()> {
        self.handle
    }
}

impl Session for PoweringSession {
    fn session_id(&self) -> Uuid {
        self.session_id
    }
    fn into_handle(self) -> JoinHandle<()> {
        self.handle
    }
}

/// Sessions keyed by battery id (charging) or device id (powering).
#[derive(Debug)]
pub struct SessionTable<S> {
    sessions: Mutex<HashMap<Uuid, S>>,
}

impl<S> Default for SessionTable<S> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<S: Session> SessionTable<S> {
    /// Locks the table for a check-then-insert sequence.
    pub fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, S>> {
        self.sessions.lock()
    }

    pub fn contains(&self, key: Uuid) -> bool {
        self.sessions.lock().contains_key(&key)
    }

    /// Removes the entry only if it still belongs to `session_id`, running
    /// `on_owned` before the table lock is dropped so no new session can
    /// claim the key in between.
    ///
    /// Returns true when the caller still owned the key, either because its
    /// entry was removed or because nobody has claimed the key since it was
    /// taken out by a stop or `drain`.
    pub fn release_then(&self, key: Uuid, session_id: Uuid, on_owned: impl FnOnce()) -> bool {
        let mut sessions = self.sessions.lock();
        let owned = match sessions.get(&key) {
            Some(current) if current.session_id() == session_id => {
                sessions.remove(&key);
                true
            }
            Some(_) => false,
            None => true,
        };
        if owned {
            on_owned();
        }
        owned
    }

    pub fn drain(&self) -> Vec<S> {
        self.sessions.lock().drain().map(|(_, s)| s).collect()
    }

    pub fn keys(&self) -> Vec<Uuid> {
        self.sessions.lock().keys().copied().collect()
    }
}

/// Join handles collected for a bounded wait, plus the means to abort them.
pub(crate) struct Drain {
    pub handles: Vec<JoinHandle<()>>,
    pub aborts: Vec<AbortHandle>,
}

impl Drain {
    pub fn new(handles: Vec<JoinHandle<()>>) -> Self {
        let aborts = handles.iter().map(JoinHandle::abort_handle).collect();
        Self { handles, aborts }
    }
}
