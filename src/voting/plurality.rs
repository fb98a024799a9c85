use crate::models::Poll;
use crate::voting::{PollResults, VoteCount};

/// One vote per voter, counted against a single option.
pub fn calculate_results(poll: &Poll) -> PollResults {
    let results = poll
        .options
        .iter()
        .map(|option| VoteCount {
            text: option.text.clone(),
            votes: option.votes,
        })
        .collect();

    // Derived from the voter set, not from the option tallies
    PollResults {
        title: poll.title.clone(),
        results,
        total_votes: poll.total_votes(),
    }
}
