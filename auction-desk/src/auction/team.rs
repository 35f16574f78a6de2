// Team budgets, rosters, and the max-bid reservation rule.

use serde::{Deserialize, Serialize};

use super::{PlayerId, TeamId};

/// A bidding team: budget totals and the ordered list of won items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Stable identifier assigned at setup (1-indexed import order).
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// The budget this team started the auction with.
    pub total_budget: u32,
    /// Budget left to bid with. Only resolutions move this, never bids.
    pub budget_remaining: u32,
    /// Item ids in the order they were won. Captains appear first.
    #[serde(default)]
    pub roster: Vec<PlayerId>,
    /// Roster capacity. The team stops bidding once this many items are won.
    pub max_roster_size: usize,
}

impl Team {
    /// Create a team with a full budget and an empty roster.
    pub fn new(id: TeamId, name: impl Into<String>, budget: u32, max_roster_size: usize) -> Self {
        Self {
            id,
            name: name.into(),
            total_budget: budget,
            budget_remaining: budget,
            roster: Vec::new(),
            max_roster_size,
        }
    }

    /// Budget committed to won items so far.
    pub fn budget_spent(&self) -> u32 {
        self.total_budget - self.budget_remaining
    }

    /// Count of roster slots still open.
    pub fn slots_remaining(&self) -> usize {
        self.max_roster_size.saturating_sub(self.roster.len())
    }

    pub fn roster_full(&self) -> bool {
        self.slots_remaining() == 0
    }

    /// Maximum bid this team can make given its remaining budget.
    ///
    /// Must reserve the minimum bid for every open slot except the one about
    /// to be filled. With exactly one slot left the whole remaining budget is
    /// in play; with none left no bid is possible.
    pub fn max_bid(&self, minimum_bid: u32) -> u32 {
        let open = self.slots_remaining();
        if open == 0 {
            return 0;
        }
        if open == 1 {
            return self.budget_remaining;
        }
        // Reserve the minimum bid for each slot that still needs filling after this one
        let reserved = (open as u32 - 1) * minimum_bid;
        self.budget_remaining
            .saturating_sub(reserved)
            .max(minimum_bid)
    }

    /// Whether an item is already on this roster.
    pub fn owns(&self, player_id: PlayerId) -> bool {
        self.roster.contains(&player_id)
    }

    /// Commit a won item: deduct the price and append to the roster.
    pub(crate) fn award(&mut self, player_id: PlayerId, price: u32) {
        self.budget_remaining = self.budget_remaining.saturating_sub(price);
        self.roster.push(player_id);
    }
}
