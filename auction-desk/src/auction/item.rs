// Auction item representation and outcome transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{PlayerId, TeamId};

/// The lifecycle state of an auction item, derived from its outcome fields.
///
/// An item is in exactly one state at any time:
/// - `Pending`: not yet brought up (or returned for a second pass).
/// - `Sold`: won by a team, price committed.
/// - `Unsold`: brought up and not sold; may return to the queue while a
///   team can still afford it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    Pending,
    Sold,
    Unsold,
}

impl PlayerStatus {
    /// Return the display string for this status.
    pub fn display_str(&self) -> &'static str {
        match self {
            PlayerStatus::Pending => "PENDING",
            PlayerStatus::Sold => "SOLD",
            PlayerStatus::Unsold => "UNSOLD",
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// A player up for auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable identifier assigned at setup (1-indexed import order).
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Opening price when no bids exist yet. When absent, the configured
    /// minimum bid is the opening price.
    #[serde(default)]
    pub base_price: Option<u32>,
    /// Free-form category tag (e.g. "batter", "bowler", "keeper").
    #[serde(default)]
    pub role: Option<String>,
    /// Quality rating from the source sheet, 1 (lowest) to 5.
    #[serde(default)]
    pub rating: Option<u8>,
    /// Marked as a team captain in the import. Captains are attached to
    /// teams at zero cost before bidding starts when the captain count
    /// matches the team count exactly.
    #[serde(default)]
    pub is_captain: bool,
    /// Final hammer price. Set together with `winner` when the item sells.
    #[serde(default)]
    pub sold_price: Option<u32>,
    /// The team that won this item.
    #[serde(default)]
    pub winner: Option<TeamId>,
    /// Brought up and not sold. Mutually exclusive with `sold_price`/`winner`.
    #[serde(default)]
    pub is_unsold: bool,
}

impl Player {
    /// Create a pending player with no base price or tags.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            base_price: None,
            role: None,
            rating: None,
            is_captain: false,
            sold_price: None,
            winner: None,
            is_unsold: false,
        }
    }

    /// Derive the lifecycle state from the outcome fields.
    pub fn status(&self) -> PlayerStatus {
        if self.sold_price.is_some() {
            PlayerStatus::Sold
        } else if self.is_unsold {
            PlayerStatus::Unsold
        } else {
            PlayerStatus::Pending
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status() == PlayerStatus::Pending
    }

    pub fn is_sold(&self) -> bool {
        self.status() == PlayerStatus::Sold
    }

    /// The price a first bid is measured against: the base price if one was
    /// imported, otherwise the configured minimum bid.
    pub fn opening_bid(&self, minimum_bid: u32) -> u32 {
        self.base_price.unwrap_or(minimum_bid)
    }

    /// Commit a sale. Clears any unsold flag from a previous pass.
    pub(crate) fn mark_sold(&mut self, price: u32, winner: TeamId) {
        self.sold_price = Some(price);
        self.winner = Some(winner);
        self.is_unsold = false;
    }

    /// Mark as brought up and not sold.
    pub(crate) fn mark_unsold(&mut self) {
        self.is_unsold = true;
        self.sold_price = None;
        self.winner = None;
    }

    /// Return an unsold item to the pending pool.
    pub(crate) fn reset_to_pending(&mut self) {
        self.is_unsold = false;
        self.sold_price = None;
        self.winner = None;
    }
}
