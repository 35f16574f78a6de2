// Per-item bidding round: the bid ledger, the high bid, and the passed-set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::TeamId;

/// A single accepted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// The team that placed the bid.
    pub team_id: TeamId,
    /// Bid amount.
    pub amount: u32,
    /// When the bid was accepted.
    pub placed_at: DateTime<Utc>,
}

/// The bidding round for the item currently up.
///
/// Reset for every new item. The high bid is held in an explicit field,
/// never derived by scanning the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    /// All accepted bids on this item, in chronological order.
    pub bids: Vec<Bid>,
    /// The bid currently holding the item, if any.
    pub highest: Option<Bid>,
    /// Teams that have opted out of bidding on this item.
    pub passed: BTreeSet<TeamId>,
    /// Whether bidding is open. Cleared at resolution and at completion.
    pub active: bool,
    /// When set, resolutions commit but do not advance to the next item;
    /// the operator advances explicitly. Sticky across rounds.
    #[serde(default)]
    pub hold_advance: bool,
}

impl RoundState {
    /// Open a fresh round for a new item. The hold-advance preference is an
    /// operator setting and survives the reset.
    pub(crate) fn open(&mut self) {
        self.bids.clear();
        self.highest = None;
        self.passed.clear();
        self.active = true;
    }

    /// Close bidding. Ledger contents are kept for inspection until the
    /// next round opens.
    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// Append an accepted bid and move the high-bid pointer to it.
    pub(crate) fn record_bid(&mut self, bid: Bid) {
        self.highest = Some(bid.clone());
        self.bids.push(bid);
    }

    /// Add a team to the passed-set. Returns false if it was already there.
    pub(crate) fn mark_passed(&mut self, team_id: TeamId) -> bool {
        self.passed.insert(team_id)
    }

    pub fn has_passed(&self, team_id: TeamId) -> bool {
        self.passed.contains(&team_id)
    }

    /// Amount of the current high bid, if any.
    pub fn highest_amount(&self) -> Option<u32> {
        self.highest.as_ref().map(|b| b.amount)
    }
}
