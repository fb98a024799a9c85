pub mod plurality;

use serde::Serialize;

// Read-only view of a poll's tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub title: String,
    pub results: Vec<VoteCount>, // One entry per option, in option order
    pub total_votes: usize,      // Size of the voter set
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteCount {
    pub text: String,
    pub votes: u64,
}

impl PollResults {
    /// Texts of the options holding the highest count. Ties return every
    /// tied option in poll order; a poll without votes has no leaders.
    pub fn leaders(&self) -> Vec<&str> {
        let top = self.results.iter().map(|count| count.votes).max().unwrap_or(0);
        if top == 0 {
            return Vec::new();
        }

        self.results
            .iter()
            .filter(|count| count.votes == top)
            .map(|count| count.text.as_str())
            .collect()
    }
}
