// Auction domain: items, teams, bidding rounds, history, sequencing.

pub mod engine;
pub mod history;
pub mod item;
pub mod round;
pub mod team;

pub use engine::{Auction, AuctionError, AuctionRules, AuctionState};
pub use history::UndoStack;
pub use item::{Player, PlayerStatus};
pub use round::{Bid, RoundState};
pub use team::Team;

/// Identifier for an auction item. Assigned at setup, stable for the
/// lifetime of the auction.
pub type PlayerId = u32;

/// Identifier for a bidding team. Assigned at setup, stable for the
/// lifetime of the auction.
pub type TeamId = u32;
