//! Snapshot wire format and the persistence adapter the registry saves through.

use crate::db::KeyValueStore;
use crate::error::SnapshotError;
use crate::models::{Poll, PollId, PollOption, User, UserId};
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_STORAGE_KEY: &str = "votingSystemData";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub polls: Vec<PollRecord>,
    pub users: Vec<UserRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_poll_id: Option<PollId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRecord {
    pub id: PollId,
    pub title: String,
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub voters: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub voted_polls: Vec<PollId>,
}

/// Registry state rebuilt from a validated snapshot.
#[derive(Debug)]
pub(crate) struct RestoredState {
    pub polls: Vec<Poll>,
    pub users: HashMap<UserId, User>,
    pub next_poll_id: PollId,
}

impl Snapshot {
    /// Captures registry state with sets written as sorted sequences and
    /// users ordered by id, so equal states serialize identically.
    pub fn capture<'a>(
        polls: &[Poll],
        users: impl IntoIterator<Item = &'a User>,
        next_poll_id: PollId,
    ) -> Self {
        let polls = polls
            .iter()
            .map(|poll| {
                let mut voters: Vec<UserId> = poll.voters.iter().cloned().collect();
                voters.sort();
                PollRecord {
                    id: poll.id,
                    title: poll.title.clone(),
                    options: poll.options.clone(),
                    voters,
                }
            })
            .collect();

        let mut users: Vec<UserRecord> = users
            .into_iter()
            .map(|user| {
                let mut voted_polls: Vec<PollId> = user.voted_polls.iter().copied().collect();
                voted_polls.sort_unstable();
                UserRecord {
                    id: user.id.clone(),
                    name: user.name.clone(),
                    voted_polls,
                }
            })
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            polls,
            users,
            next_poll_id: Some(next_poll_id),
            saved_at: Some(Utc::now()),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Like [`Snapshot::validate`], as a `Result`.
    pub fn check(&self) -> Result<(), SnapshotError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SnapshotError::Inconsistent(errors))
        }
    }

    /// Checks the cross-references the registry relies on:
    /// - poll ids strictly increasing and below `PollId::MAX`, titles
    ///   non-empty, at least two options
    /// - option tallies sum to the voter count without overflowing
    /// - no duplicate users, voters or voted polls
    /// - every voter/voted-poll pair is recorded on both sides
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(first) = self.polls.first() {
            if first.id == 0 {
                errors.push("poll ids must start at 1".to_string());
            }
        }
        for pair in self.polls.windows(2) {
            if pair[0].id >= pair[1].id {
                errors.push(format!(
                    "poll ids out of order: {} before {}",
                    pair[0].id, pair[1].id
                ));
            }
        }

        let mut voters_by_poll: HashMap<PollId, HashSet<&str>> = HashMap::new();
        for poll in &self.polls {
            if poll.id == PollId::MAX {
                errors.push(format!("poll id {} leaves no room for a successor", poll.id));
            }
            if poll.title.is_empty() {
                errors.push(format!("poll {} has an empty title", poll.id));
            }
            if poll.options.len() < 2 {
                errors.push(format!(
                    "poll {} has {} options, expected at least 2",
                    poll.id,
                    poll.options.len()
                ));
            }

            let mut voters = HashSet::new();
            for voter in &poll.voters {
                if !voters.insert(voter.as_str()) {
                    errors.push(format!("poll {} lists voter '{}' twice", poll.id, voter));
                }
            }

            let tallied = poll
                .options
                .iter()
                .try_fold(0u64, |total, option| total.checked_add(option.votes));
            match tallied {
                None => errors.push(format!("poll {} vote tally overflows", poll.id)),
                Some(tallied) if tallied != poll.voters.len() as u64 => errors.push(format!(
                    "poll {} tallies {} votes but has {} voters",
                    poll.id,
                    tallied,
                    poll.voters.len()
                )),
                Some(_) => {}
            }

            voters_by_poll.insert(poll.id, voters);
        }

        let mut polls_by_user: HashMap<&str, HashSet<PollId>> = HashMap::new();
        for user in &self.users {
            if polls_by_user.contains_key(user.id.as_str()) {
                errors.push(format!("user '{}' appears twice", user.id));
                continue;
            }

            let mut voted = HashSet::new();
            for poll_id in &user.voted_polls {
                if !voted.insert(*poll_id) {
                    errors.push(format!("user '{}' lists poll {} twice", user.id, poll_id));
                }
                match voters_by_poll.get(poll_id) {
                    None => errors.push(format!(
                        "user '{}' references missing poll {}",
                        user.id, poll_id
                    )),
                    Some(voters) if !voters.contains(user.id.as_str()) => errors.push(format!(
                        "user '{}' voted in poll {} but is not among its voters",
                        user.id, poll_id
                    )),
                    Some(_) => {}
                }
            }
            polls_by_user.insert(user.id.as_str(), voted);
        }

        for (poll_id, voters) in &voters_by_poll {
            for voter in voters {
                match polls_by_user.get(voter) {
                    None => errors.push(format!(
                        "poll {} lists unknown voter '{}'",
                        poll_id, voter
                    )),
                    Some(voted) if !voted.contains(poll_id) => errors.push(format!(
                        "poll {} lists voter '{}' who has no record of voting in it",
                        poll_id, voter
                    )),
                    Some(_) => {}
                }
            }
        }

        errors
    }

    /// Rebuilds registry state. Callers must have checked the snapshot first.
    pub(crate) fn restore(self) -> RestoredState {
        let max_id = self.polls.last().map(|poll| poll.id).unwrap_or(0);
        let next_poll_id = self
            .next_poll_id
            .unwrap_or(0)
            .max(max_id.saturating_add(1));

        let polls = self
            .polls
            .into_iter()
            .map(|record| Poll {
                id: record.id,
                title: record.title,
                options: record.options,
                voters: record.voters.into_iter().collect(),
            })
            .collect();

        let users = self
            .users
            .into_iter()
            .map(|record| {
                let user = User {
                    id: record.id.clone(),
                    name: record.name,
                    voted_polls: record.voted_polls.into_iter().collect(),
                };
                (record.id, user)
            })
            .collect();

        RestoredState {
            polls,
            users,
            next_poll_id,
        }
    }
}

/// Where the registry loads its state from and saves it to.
///
/// `load` returns a parsed snapshot; the registry checks its integrity and
/// calls `clear` if it fails. `save` and `clear` are fire-and-forget:
/// implementations log failures instead of returning them, and the in-memory
/// registry stays authoritative.
pub trait Persistence {
    fn load(&mut self) -> Option<Snapshot>;
    fn save(&mut self, snapshot: &Snapshot);
    fn clear(&mut self);
}

/// Stores the snapshot as JSON under a single key of a [`KeyValueStore`].
pub struct KeyValuePersistence<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> KeyValuePersistence<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: KeyValueStore> Persistence for KeyValuePersistence<S> {
    fn load(&mut self) -> Option<Snapshot> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to read snapshot '{}': {}", self.key, e);
                return None;
            }
        };

        match Snapshot::parse(&raw) {
            Ok(snapshot) => {
                debug!(
                    "Loaded snapshot '{}' with {} poll(s) and {} user(s)",
                    self.key,
                    snapshot.polls.len(),
                    snapshot.users.len()
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!("Discarding stored snapshot '{}': {}", self.key, e);
                if let Err(e) = self.store.remove(&self.key) {
                    error!("Failed to remove corrupt snapshot '{}': {}", self.key, e);
                }
                None
            }
        }
    }

    fn save(&mut self, snapshot: &Snapshot) {
        let encoded = match serde_json::to_string(snapshot) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Failed to encode snapshot '{}': {}", self.key, e);
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, &encoded) {
            error!("Failed to save snapshot '{}': {}", self.key, e);
        }
    }

    fn clear(&mut self) {
        if let Err(e) = self.store.remove(&self.key) {
            error!("Failed to clear snapshot '{}': {}", self.key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn option(text: &str, votes: u64) -> PollOption {
        PollOption {
            text: text.to_string(),
            votes,
        }
    }

    fn consistent_snapshot() -> Snapshot {
        Snapshot {
            polls: vec![
                PollRecord {
                    id: 1,
                    title: "Favorite color?".to_string(),
                    options: vec![option("Red", 1), option("Blue", 0)],
                    voters: vec!["u1".to_string()],
                },
                PollRecord {
                    id: 4,
                    title: "Lunch?".to_string(),
                    options: vec![option("Pizza", 0), option("Sushi", 0)],
                    voters: vec![],
                },
            ],
            users: vec![
                UserRecord {
                    id: "u1".to_string(),
                    name: "A".to_string(),
                    voted_polls: vec![1],
                },
                UserRecord {
                    id: "u2".to_string(),
                    name: "B".to_string(),
                    voted_polls: vec![],
                },
            ],
            next_poll_id: None,
            saved_at: None,
        }
    }

    #[test]
    fn consistent_snapshot_validates() {
        assert!(consistent_snapshot().validate().is_empty());
        assert!(consistent_snapshot().check().is_ok());
    }

    #[test]
    fn parses_camel_case_json() {
        let raw = r#"{
            "polls": [{"id": 1, "title": "T", "options": [{"text": "A", "votes": 1}, {"text": "B", "votes": 0}], "voters": ["u1"]}],
            "users": [{"id": "u1", "name": "Ivan", "votedPolls": [1]}],
            "nextPollId": 7
        }"#;

        let snapshot = Snapshot::parse(raw).unwrap();
        assert_eq!(snapshot.users[0].voted_polls, vec![1]);
        assert_eq!(snapshot.next_poll_id, Some(7));
        assert_eq!(snapshot.saved_at, None);
    }

    #[test]
    fn tally_mismatch_is_inconsistent() {
        let mut snapshot = consistent_snapshot();
        snapshot.polls[0].options[1].votes = 2;

        let errors = snapshot.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("tallies 3 votes but has 1 voters"));
        assert!(matches!(
            snapshot.check(),
            Err(SnapshotError::Inconsistent(ref e)) if e.len() == 1
        ));
    }

    #[test]
    fn one_sided_vote_record_is_inconsistent() {
        let mut snapshot = consistent_snapshot();
        snapshot.users[0].voted_polls.clear();

        let errors = snapshot.validate();
        assert!(errors.iter().any(|e| e.contains("no record of voting")));
    }

    #[test]
    fn dangling_poll_reference_is_inconsistent() {
        let mut snapshot = consistent_snapshot();
        snapshot.users[1].voted_polls.push(9);

        let errors = snapshot.validate();
        assert!(errors.iter().any(|e| e.contains("missing poll 9")));
    }

    #[test]
    fn out_of_order_ids_and_short_options_are_inconsistent() {
        let mut snapshot = consistent_snapshot();
        snapshot.polls.swap(0, 1);
        snapshot.polls[0].options.pop();

        let errors = snapshot.validate();
        assert!(errors.iter().any(|e| e.contains("out of order")));
        assert!(errors.iter().any(|e| e.contains("expected at least 2")));
    }

    #[test]
    fn overflowing_tally_is_inconsistent() {
        let mut snapshot = consistent_snapshot();
        // Red already holds one vote
        snapshot.polls[0].options[1].votes = u64::MAX;

        let errors = snapshot.validate();
        assert!(errors.iter().any(|e| e.contains("poll 1 vote tally overflows")));
    }

    #[test]
    fn maximum_poll_id_is_inconsistent() {
        let mut snapshot = consistent_snapshot();
        snapshot.polls[1].id = PollId::MAX;

        let errors = snapshot.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("leaves no room"));
    }

    #[test]
    fn whitespace_title_is_accepted() {
        let mut snapshot = consistent_snapshot();
        snapshot.polls[1].title = " ".to_string();
        assert!(snapshot.validate().is_empty());

        snapshot.polls[1].title.clear();
        assert!(snapshot.validate().iter().any(|e| e.contains("empty title")));
    }

    #[test]
    fn restore_raises_next_id_past_existing_polls() {
        let mut snapshot = consistent_snapshot();
        snapshot.next_poll_id = Some(2);

        let state = snapshot.restore();
        assert_eq!(state.next_poll_id, 5);
        assert_eq!(state.polls.len(), 2);
        assert!(state.users["u1"].voted_polls.contains(&1));
        assert!(state.polls[0].voters.contains("u1"));
    }

    #[test]
    fn adapter_discards_and_removes_corrupt_value() {
        let mut persistence = KeyValuePersistence::new(MemoryStore::new());
        persistence
            .store_mut()
            .set(DEFAULT_STORAGE_KEY, "{not json")
            .unwrap();
        persistence.store_mut().set("unrelated", "kept").unwrap();

        assert!(persistence.load().is_none());
        assert_eq!(persistence.store().len(), 1);
        assert_eq!(
            persistence.store_mut().get("unrelated").unwrap().as_deref(),
            Some("kept")
        );
    }

    #[test]
    fn adapter_round_trips_through_store() {
        let mut persistence = KeyValuePersistence::with_key(MemoryStore::new(), "polls");
        let snapshot = consistent_snapshot();

        persistence.save(&snapshot);
        assert_eq!(persistence.load(), Some(snapshot));

        persistence.clear();
        assert!(persistence.load().is_none());
        assert_eq!(persistence.key(), "polls");
    }
}
