pub mod shared;

use crate::config::StoreConfig;
use crate::db::snapshot::{KeyValuePersistence, Persistence, Snapshot};
use crate::db::{MemoryStore, SqliteStore};
use crate::error::{RegistryError, Result, StoreError};
use crate::models::{Poll, PollId, User, UserId};
use crate::voting::{plurality, PollResults};
use log::{debug, info, warn};
use std::collections::HashMap;

pub use shared::SharedRegistry;

pub type MemoryRegistry = PollRegistry<KeyValuePersistence<MemoryStore>>;
pub type SqliteRegistry = PollRegistry<KeyValuePersistence<SqliteStore>>;

/// In-memory polls and users with one-vote-per-user enforcement.
///
/// Every mutating call validates all of its preconditions before touching
/// state, then hands a fresh [`Snapshot`] to the persistence adapter.
pub struct PollRegistry<P> {
    polls: Vec<Poll>, // creation order, so also sorted by id
    users: HashMap<UserId, User>,
    next_poll_id: PollId,
    persistence: P,
}

impl MemoryRegistry {
    pub fn in_memory() -> Self {
        Self::open(KeyValuePersistence::new(MemoryStore::new()))
    }
}

impl SqliteRegistry {
    pub fn open_sqlite(config: &StoreConfig) -> Result<Self, StoreError> {
        let store = SqliteStore::from_config(config)?;
        Ok(Self::open(KeyValuePersistence::with_key(
            store,
            config.storage_key.clone(),
        )))
    }
}

impl<P: Persistence> PollRegistry<P> {
    /// Restores state from `persistence`. A snapshot that fails integrity
    /// checks is cleared and the registry starts empty.
    pub fn open(persistence: P) -> Self {
        let mut registry = Self {
            polls: Vec::new(),
            users: HashMap::new(),
            next_poll_id: 1,
            persistence,
        };

        if let Some(snapshot) = registry.persistence.load() {
            match snapshot.check() {
                Ok(()) => {
                    let state = snapshot.restore();
                    registry.polls = state.polls;
                    registry.users = state.users;
                    registry.next_poll_id = state.next_poll_id;
                    info!(
                        "Restored {} poll(s) and {} user(s)",
                        registry.polls.len(),
                        registry.users.len()
                    );
                }
                Err(e) => {
                    warn!("Discarding stored snapshot: {}", e);
                    registry.persistence.clear();
                }
            }
        }

        registry
    }

    pub fn create_poll<I>(&mut self, title: impl Into<String>, options: I) -> Result<PollId>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let title = title.into();
        if title.is_empty() {
            return Err(RegistryError::Validation(
                "a title is required".to_string(),
            ));
        }

        let options: Vec<String> = options.into_iter().map(Into::into).collect();
        if options.len() < 2 {
            return Err(RegistryError::Validation(format!(
                "at least 2 options are required, got {}",
                options.len()
            )));
        }

        let poll_id = self.next_poll_id;
        let next_poll_id = poll_id.checked_add(1).ok_or_else(|| {
            RegistryError::Validation(format!("no poll ids left after {}", poll_id))
        })?;
        self.next_poll_id = next_poll_id;
        info!("Created poll {} ('{}') with {} options", poll_id, title, options.len());
        self.polls.push(Poll::new(poll_id, title, options));

        self.persist();
        Ok(poll_id)
    }

    pub fn add_user(&mut self, user_id: impl Into<UserId>, name: impl Into<String>) -> Result<()> {
        let user_id = user_id.into();
        if self.users.contains_key(&user_id) {
            return Err(RegistryError::DuplicateUser(user_id));
        }

        debug!("Added user '{}'", user_id);
        self.users
            .insert(user_id.clone(), User::new(user_id, name.into()));

        self.persist();
        Ok(())
    }

    /// Records one vote. Checks run in order: poll exists, user exists, user
    /// has not voted in this poll, option index in range.
    pub fn vote(&mut self, poll_id: PollId, user_id: &str, option_index: usize) -> Result<()> {
        let index = self
            .poll_index(poll_id)
            .ok_or(RegistryError::PollNotFound(poll_id))?;

        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| RegistryError::UserNotFound(user_id.to_string()))?;

        if user.has_voted_in(poll_id) {
            return Err(RegistryError::AlreadyVoted {
                poll_id,
                user_id: user_id.to_string(),
            });
        }

        let poll = &mut self.polls[index];
        let option_count = poll.options.len();
        let option = poll
            .options
            .get_mut(option_index)
            .ok_or(RegistryError::InvalidOption {
                poll_id,
                index: option_index,
                option_count,
            })?;

        option.votes += 1;
        poll.voters.insert(user_id.to_string());
        user.voted_polls.insert(poll_id);
        debug!("User '{}' voted for option {} in poll {}", user_id, option_index, poll_id);

        self.persist();
        Ok(())
    }

    /// `None` for an unknown poll; lookups are not errors.
    pub fn poll_results(&self, poll_id: PollId) -> Option<PollResults> {
        self.poll(poll_id).map(plurality::calculate_results)
    }

    /// Removes the poll and strips it from every voter's record. The poll's
    /// voter set doubles as the reverse index for the cascade.
    pub fn delete_poll(&mut self, poll_id: PollId) -> Result<()> {
        let index = self
            .poll_index(poll_id)
            .ok_or(RegistryError::PollNotFound(poll_id))?;

        let poll = self.polls.remove(index);
        for voter in &poll.voters {
            if let Some(user) = self.users.get_mut(voter) {
                user.voted_polls.remove(&poll_id);
            }
        }
        info!("Deleted poll {} ({} voter record(s) cleared)", poll_id, poll.voters.len());

        self.persist();
        Ok(())
    }

    pub fn clear_all(&mut self) {
        self.polls.clear();
        self.users.clear();
        self.next_poll_id = 1;
        self.persistence.clear();
        info!("Cleared all polls and users");
    }

    pub fn poll(&self, poll_id: PollId) -> Option<&Poll> {
        self.poll_index(poll_id).map(|index| &self.polls[index])
    }

    pub fn polls(&self) -> &[Poll] {
        &self.polls
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn has_voted(&self, poll_id: PollId, user_id: &str) -> bool {
        self.user(user_id)
            .is_some_and(|user| user.has_voted_in(poll_id))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.polls, self.users.values(), self.next_poll_id)
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    fn poll_index(&self, poll_id: PollId) -> Option<usize> {
        self.polls
            .binary_search_by_key(&poll_id, |poll| poll.id)
            .ok()
    }

    fn persist(&mut self) {
        let snapshot = self.snapshot();
        self.persistence.save(&snapshot);
    }
}
