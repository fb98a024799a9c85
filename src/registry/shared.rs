use crate::db::snapshot::Persistence;
use crate::error::Result;
use crate::models::{PollId, UserId};
use crate::registry::PollRegistry;
use crate::voting::PollResults;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle that serializes every operation behind one lock, so a
/// reader never sees a vote recorded in the tally but not in the voter sets.
pub struct SharedRegistry<P> {
    inner: Arc<Mutex<PollRegistry<P>>>,
}

impl<P> Clone for SharedRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Persistence> SharedRegistry<P> {
    pub fn new(registry: PollRegistry<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    // Operations validate before mutating, so state behind a poisoned lock is intact
    fn lock(&self) -> MutexGuard<'_, PollRegistry<P>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_poll(&self, title: impl Into<String>, options: Vec<String>) -> Result<PollId> {
        self.lock().create_poll(title, options)
    }

    pub fn add_user(&self, user_id: impl Into<UserId>, name: impl Into<String>) -> Result<()> {
        self.lock().add_user(user_id, name)
    }

    pub fn vote(&self, poll_id: PollId, user_id: &str, option_index: usize) -> Result<()> {
        self.lock().vote(poll_id, user_id, option_index)
    }

    pub fn poll_results(&self, poll_id: PollId) -> Option<PollResults> {
        self.lock().poll_results(poll_id)
    }

    pub fn delete_poll(&self, poll_id: PollId) -> Result<()> {
        self.lock().delete_poll(poll_id)
    }

    pub fn clear_all(&self) {
        self.lock().clear_all();
    }

    /// Runs `f` against the registry while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce(&PollRegistry<P>) -> R) -> R {
        f(&self.lock())
    }
}
