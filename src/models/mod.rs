use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type PollId = u64;
pub type UserId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    pub options: Vec<PollOption>,
    pub voters: HashSet<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub voted_polls: HashSet<PollId>,
}

impl Poll {
    /// Builds a poll with every option at zero votes, keeping the input order.
    pub fn new(id: PollId, title: String, options: Vec<String>) -> Self {
        let options = options
            .into_iter()
            .map(|text| PollOption { text, votes: 0 })
            .collect();

        Self {
            id,
            title,
            options,
            voters: HashSet::new(),
        }
    }

    pub fn total_votes(&self) -> usize {
        self.voters.len()
    }

    // Sum of option tallies; equals total_votes() for any poll the registry owns.
    pub fn tallied_votes(&self) -> u64 {
        self.options.iter().map(|option| option.votes).sum()
    }
}

impl User {
    pub fn new(id: UserId, name: String) -> Self {
        Self {
            id,
            name,
            voted_polls: HashSet::new(),
        }
    }

    pub fn has_voted_in(&self, poll_id: PollId) -> bool {
        self.voted_polls.contains(&poll_id)
    }
}
