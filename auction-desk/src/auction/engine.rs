// Auction sequencing and the single-writer operation surface.
//
// `Auction` owns the complete state and applies every mutation in order:
// start, bids, passes, resolutions, undo, forced end. Validation failures
// are refused transitions returned as `AuctionError`; a rejected call
// leaves the state untouched.

use chrono::Utc;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::history::UndoStack;
use super::item::{Player, PlayerStatus};
use super::round::{Bid, RoundState};
use super::team::Team;
use super::{PlayerId, TeamId};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// The engine-facing slice of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRules {
    /// Floor for opening bids and the amount reserved per open roster slot.
    pub minimum_bid: u32,
    /// Step added to the high bid to obtain the next callable amount.
    pub bid_increment: u32,
    /// Whether unsold items get a randomized return pass at the end of
    /// the list.
    pub unsold_return: bool,
}

impl Default for AuctionRules {
    fn default() -> Self {
        Self {
            minimum_bid: 10,
            bid_increment: 10,
            unsold_return: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A refused transition. The auction state is unchanged whenever one of
/// these is returned.
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    #[error("auction has already started")]
    AlreadyStarted,

    #[error("auction has not started")]
    NotStarted,

    #[error("auction is already completed")]
    Completed,

    #[error("no bidding round is active")]
    RoundInactive,

    #[error("the current item has not been resolved")]
    ItemUnresolved,

    #[error("unknown team id {0}")]
    UnknownTeam(TeamId),

    #[error("bid of {amount} does not beat the current high bid of {highest}")]
    BidNotHigher { amount: u32, highest: u32 },

    #[error("bid of {amount} exceeds team {team_id}'s remaining budget of {remaining}")]
    OverBudget {
        team_id: TeamId,
        amount: u32,
        remaining: u32,
    },

    #[error("bid of {amount} exceeds team {team_id}'s max bid of {max_bid}")]
    OverMaxBid {
        team_id: TeamId,
        amount: u32,
        max_bid: u32,
    },

    #[error("cannot mark the item sold without a bid")]
    NoBids,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("setup needs at least one team")]
    NoTeams,

    #[error("duplicate team id {0}")]
    DuplicateTeam(TeamId),

    #[error("duplicate player id {0}")]
    DuplicatePlayer(PlayerId),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The complete, serializable auction state. This is the persisted snapshot
/// shape: a JSON round-trip reproduces it exactly, timestamps included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionState {
    /// All items in auction order. Reordered once if unsold items return.
    pub players: Vec<Player>,
    /// All bidding teams, in setup order.
    pub teams: Vec<Team>,
    /// Index of the item currently (or most recently) up.
    pub cursor: usize,
    pub is_started: bool,
    pub is_completed: bool,
    /// Which terminal condition ended the auction. Set exactly once, when
    /// `is_completed` flips.
    #[serde(default)]
    pub completion_reason: Option<String>,
    /// The bidding round for the item at `cursor`.
    pub round: RoundState,
}

impl AuctionState {
    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    fn team_mut(&mut self, id: TeamId) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.id == id)
    }

    /// The item at the cursor, while the auction is live. `Some` also covers
    /// the window between a resolution and the next advance, so a resolved
    /// item can still be displayed.
    pub fn current_player(&self) -> Option<&Player> {
        if !self.is_started || self.is_completed {
            return None;
        }
        self.players.get(self.cursor)
    }

    pub fn all_rosters_full(&self) -> bool {
        self.teams.iter().all(Team::roster_full)
    }

    /// Count of items sold so far (captains included).
    pub fn sold_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_sold()).count()
    }

    /// Money committed across all teams.
    pub fn total_spent(&self) -> u32 {
        self.players.iter().filter_map(|p| p.sold_price).sum()
    }
}

// ---------------------------------------------------------------------------
// Eligibility calculator
// ---------------------------------------------------------------------------

/// The smallest amount the next bid is measured against: one increment over
/// the high bid, or the opening price when no bid exists yet.
pub fn minimum_next_bid(round: &RoundState, item: &Player, rules: &AuctionRules) -> u32 {
    match round.highest_amount() {
        Some(high) => high.saturating_add(rules.bid_increment),
        None => item.opening_bid(rules.minimum_bid),
    }
}

/// Whether a team can take part in the current round: roster space, not
/// passed, and enough budget to call the next bid.
pub fn is_eligible(team: &Team, item: &Player, round: &RoundState, rules: &AuctionRules) -> bool {
    if team.roster_full() {
        return false;
    }
    if round.has_passed(team.id) {
        return false;
    }
    team.budget_remaining >= minimum_next_bid(round, item, rules)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The auction engine: state plus undo history, driven by one writer.
#[derive(Debug, Clone)]
pub struct Auction {
    state: AuctionState,
    history: UndoStack,
    rules: AuctionRules,
}

impl Auction {
    /// Build a fresh auction over the given items and teams. The item order
    /// is taken as given; callers shuffle beforehand if they want a random
    /// order.
    pub fn new(
        players: Vec<Player>,
        teams: Vec<Team>,
        rules: AuctionRules,
    ) -> Result<Self, AuctionError> {
        if teams.is_empty() {
            return Err(AuctionError::NoTeams);
        }
        for (i, team) in teams.iter().enumerate() {
            if teams[..i].iter().any(|t| t.id == team.id) {
                return Err(AuctionError::DuplicateTeam(team.id));
            }
        }
        for (i, player) in players.iter().enumerate() {
            if players[..i].iter().any(|p| p.id == player.id) {
                return Err(AuctionError::DuplicatePlayer(player.id));
            }
        }

        Ok(Self {
            state: AuctionState {
                players,
                teams,
                cursor: 0,
                is_started: false,
                is_completed: false,
                completion_reason: None,
                round: RoundState::default(),
            },
            history: UndoStack::new(),
            rules,
        })
    }

    /// Rebuild an engine from a persisted snapshot. The undo history is not
    /// part of the snapshot; a resumed session starts with an empty stack.
    pub fn from_snapshot(state: AuctionState, rules: AuctionRules) -> Self {
        Self {
            state,
            history: UndoStack::new(),
            rules,
        }
    }

    // -- queries ------------------------------------------------------------

    pub fn state(&self) -> &AuctionState {
        &self.state
    }

    pub fn rules(&self) -> &AuctionRules {
        &self.rules
    }

    /// Clone the full state for persistence or observers.
    pub fn snapshot(&self) -> AuctionState {
        self.state.clone()
    }

    pub fn is_started(&self) -> bool {
        self.state.is_started
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_completed
    }

    /// Why the auction ended, once it has.
    pub fn completion_reason(&self) -> Option<&str> {
        self.state.completion_reason.as_deref()
    }

    pub fn players(&self) -> &[Player] {
        &self.state.players
    }

    pub fn teams(&self) -> &[Team] {
        &self.state.teams
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.state.team(id)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.state.current_player()
    }

    pub fn round(&self) -> &RoundState {
        &self.state.round
    }

    pub fn all_rosters_full(&self) -> bool {
        self.state.all_rosters_full()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Description of the bid the next `undo` would roll back.
    pub fn undo_description(&self) -> Option<&str> {
        self.history.last_description()
    }

    /// Ceiling for the given team under the slot-reservation rule.
    pub fn max_bid(&self, team_id: TeamId) -> Result<u32, AuctionError> {
        let team = self
            .state
            .team(team_id)
            .ok_or(AuctionError::UnknownTeam(team_id))?;
        Ok(team.max_bid(self.rules.minimum_bid))
    }

    /// The smallest callable amount on the current item, while a round is
    /// active.
    pub fn minimum_next_bid(&self) -> Option<u32> {
        if !self.state.round.active {
            return None;
        }
        let item = self.state.current_player()?;
        Some(minimum_next_bid(&self.state.round, item, &self.rules))
    }

    /// Teams that can take part in the current round. Empty when no round
    /// is active.
    pub fn eligible_teams(&self) -> Vec<TeamId> {
        if !self.state.round.active {
            return Vec::new();
        }
        let Some(item) = self.state.current_player() else {
            return Vec::new();
        };
        self.state
            .teams
            .iter()
            .filter(|t| is_eligible(t, item, &self.state.round, &self.rules))
            .map(|t| t.id)
            .collect()
    }

    // -- mutations ----------------------------------------------------------

    /// Start the auction: attach captains, then open bidding on the first
    /// pending item. Completes immediately if a terminal condition already
    /// holds.
    pub fn start(&mut self) -> Result<(), AuctionError> {
        if self.state.is_completed {
            return Err(AuctionError::Completed);
        }
        if self.state.is_started {
            return Err(AuctionError::AlreadyStarted);
        }

        self.assign_captains();
        self.state.is_started = true;
        info!(
            "Auction started: {} items, {} teams",
            self.state.players.len(),
            self.state.teams.len()
        );
        self.seek_from(0);
        Ok(())
    }

    /// Place a bid on the current item.
    ///
    /// On acceptance the full pre-bid state is pushed onto the undo stack,
    /// the bid is appended to the ledger, and the high-bid pointer moves.
    /// The caller rearms its countdown after a successful call.
    pub fn place_bid(&mut self, team_id: TeamId, amount: u32) -> Result<(), AuctionError> {
        self.ensure_active()?;
        let team = self
            .state
            .team(team_id)
            .ok_or(AuctionError::UnknownTeam(team_id))?;

        if let Some(highest) = self.state.round.highest_amount() {
            if amount <= highest {
                return Err(AuctionError::BidNotHigher { amount, highest });
            }
        }
        if amount > team.budget_remaining {
            return Err(AuctionError::OverBudget {
                team_id,
                amount,
                remaining: team.budget_remaining,
            });
        }
        let max_bid = team.max_bid(self.rules.minimum_bid);
        if amount > max_bid {
            return Err(AuctionError::OverMaxBid {
                team_id,
                amount,
                max_bid,
            });
        }

        let description = format!("bid of {} by {}", amount, team.name);
        self.history.push(self.state.clone(), description);
        self.state.round.record_bid(Bid {
            team_id,
            amount,
            placed_at: Utc::now(),
        });
        debug!("Bid accepted: {} by team {}", amount, team_id);
        Ok(())
    }

    /// Opt a team out of the current round. Idempotent; never snapshotted
    /// for undo.
    pub fn pass(&mut self, team_id: TeamId) -> Result<(), AuctionError> {
        self.ensure_active()?;
        if self.state.team(team_id).is_none() {
            return Err(AuctionError::UnknownTeam(team_id));
        }
        if self.state.round.mark_passed(team_id) {
            debug!("Team {} passed", team_id);
        }
        Ok(())
    }

    /// Sell the current item to the high bidder: set the hammer price and
    /// winner, deduct the budget, append to the roster, then advance unless
    /// hold-advance is set. Commits are final; the undo stack is cleared.
    pub fn resolve_sold(&mut self) -> Result<(), AuctionError> {
        self.ensure_active()?;
        let winning = self
            .state
            .round
            .highest
            .clone()
            .ok_or(AuctionError::NoBids)?;

        let player_id;
        let player_name;
        {
            let player = &mut self.state.players[self.state.cursor];
            player_id = player.id;
            player_name = player.name.clone();
            player.mark_sold(winning.amount, winning.team_id);
        }
        if let Some(team) = self.state.team_mut(winning.team_id) {
            team.award(player_id, winning.amount);
        }

        self.history.clear();
        self.state.round.deactivate();
        info!(
            "SOLD: {} to team {} for {}",
            player_name, winning.team_id, winning.amount
        );

        if !self.state.round.hold_advance {
            self.seek_from(self.state.cursor + 1);
        }
        Ok(())
    }

    /// Mark the current item unsold and advance unless hold-advance is set.
    /// Allowed even when bids exist: an explicit no-sale call from the
    /// operator discards the ledger with the round.
    pub fn resolve_unsold(&mut self) -> Result<(), AuctionError> {
        self.ensure_active()?;
        let player = &mut self.state.players[self.state.cursor];
        let player_name = player.name.clone();
        player.mark_unsold();

        self.history.clear();
        self.state.round.deactivate();
        info!("UNSOLD: {}", player_name);

        if !self.state.round.hold_advance {
            self.seek_from(self.state.cursor + 1);
        }
        Ok(())
    }

    /// Countdown-expiry resolution: sold to the high bidder if one exists,
    /// unsold otherwise.
    pub fn resolve_expired(&mut self) -> Result<(), AuctionError> {
        self.ensure_active()?;
        if self.state.round.highest.is_some() {
            debug!("Countdown expired with a high bid, resolving sold");
            self.resolve_sold()
        } else {
            debug!("Countdown expired with no bids, resolving unsold");
            self.resolve_unsold()
        }
    }

    /// Roll back the most recent accepted bid by restoring its pre-bid
    /// snapshot wholesale. Never crosses a commit point: resolutions clear
    /// the stack.
    pub fn undo(&mut self) -> Result<(), AuctionError> {
        let entry = self.history.pop().ok_or(AuctionError::NothingToUndo)?;
        self.state = entry.state;
        info!("Undid {}", entry.description);
        Ok(())
    }

    /// Move to the next pending item. Only callable once the current item
    /// is resolved; the hold-advance flow uses this to continue after a
    /// presentation delay.
    pub fn advance(&mut self) -> Result<(), AuctionError> {
        if !self.state.is_started {
            return Err(AuctionError::NotStarted);
        }
        if self.state.is_completed {
            return Err(AuctionError::Completed);
        }
        if self.state.round.active {
            return Err(AuctionError::ItemUnresolved);
        }
        self.seek_from(self.state.cursor + 1);
        Ok(())
    }

    /// Force-complete the auction.
    pub fn end_auction(&mut self) -> Result<(), AuctionError> {
        if !self.state.is_started {
            return Err(AuctionError::NotStarted);
        }
        if self.state.is_completed {
            return Err(AuctionError::Completed);
        }
        self.complete("ended by the operator");
        Ok(())
    }

    /// Toggle the presentation-delay mode: resolutions commit but wait for
    /// an explicit `advance`.
    pub fn set_hold_advance(&mut self, hold: bool) {
        self.state.round.hold_advance = hold;
    }

    // -- internals ----------------------------------------------------------

    fn ensure_active(&self) -> Result<(), AuctionError> {
        if !self.state.is_started {
            return Err(AuctionError::NotStarted);
        }
        if self.state.is_completed {
            return Err(AuctionError::Completed);
        }
        if !self.state.round.active {
            return Err(AuctionError::RoundInactive);
        }
        Ok(())
    }

    /// Attach captains before bidding begins. All-or-nothing: only when the
    /// captain count matches the team count exactly does each team get one
    /// captain at zero cost, in list order. On a mismatch the flags are
    /// ignored and those items are auctioned normally.
    fn assign_captains(&mut self) {
        let captain_idxs: Vec<usize> = self
            .state
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_captain)
            .map(|(i, _)| i)
            .collect();
        if captain_idxs.is_empty() {
            return;
        }
        if captain_idxs.len() != self.state.teams.len() {
            warn!(
                "{} captains flagged for {} teams, skipping captain pre-assignment",
                captain_idxs.len(),
                self.state.teams.len()
            );
            return;
        }

        for (team_pos, idx) in captain_idxs.into_iter().enumerate() {
            let player_id = self.state.players[idx].id;
            let team_id = self.state.teams[team_pos].id;
            self.state.players[idx].mark_sold(0, team_id);
            self.state.teams[team_pos].award(player_id, 0);
        }
        info!("Attached {} captains at zero cost", self.state.teams.len());
    }

    /// Whether any team with roster space can still afford the opening bid
    /// of any item with the given status.
    fn any_affordable(&self, status: PlayerStatus) -> bool {
        let candidates: Vec<&Player> = self
            .state
            .players
            .iter()
            .filter(|p| p.status() == status)
            .collect();
        self.state
            .teams
            .iter()
            .filter(|t| !t.roster_full())
            .any(|t| {
                candidates
                    .iter()
                    .any(|p| t.budget_remaining >= p.opening_bid(self.rules.minimum_bid))
            })
    }

    /// Move the cursor to the next pending item at or past `from`, running
    /// the terminal checks and the unsold-return pass on the way.
    fn seek_from(&mut self, from: usize) {
        if self.state.all_rosters_full() {
            self.complete("all rosters are full");
            return;
        }

        let next = self
            .state
            .players
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, p)| p.is_pending())
            .map(|(i, _)| i);

        match next {
            Some(idx) => {
                if !self.any_affordable(PlayerStatus::Pending) {
                    self.complete("no team with roster space can afford any remaining item");
                    return;
                }
                self.state.cursor = idx;
                self.state.round.open();
                let player = &self.state.players[idx];
                info!(
                    "Up for bidding: {} (opening {})",
                    player.name,
                    player.opening_bid(self.rules.minimum_bid)
                );
            }
            None => {
                if !self.requeue_unsold() {
                    self.complete("no items left to auction");
                }
            }
        }
    }

    /// The unsold-return pass. When enabled, unsold items exist, and some
    /// team with space can afford at least one of them: reset them all to
    /// pending, shuffle them, append them after the resolved items, and
    /// open bidding on the first. Returns false when the pass does not
    /// trigger.
    fn requeue_unsold(&mut self) -> bool {
        if !self.rules.unsold_return {
            return false;
        }
        if !self
            .state
            .players
            .iter()
            .any(|p| p.status() == PlayerStatus::Unsold)
        {
            return false;
        }
        if !self.any_affordable(PlayerStatus::Unsold) {
            info!("Unsold items remain but no team can afford them, not returning");
            return false;
        }

        let mut kept = Vec::with_capacity(self.state.players.len());
        let mut returned = Vec::new();
        for mut player in self.state.players.drain(..) {
            if player.status() == PlayerStatus::Unsold {
                player.reset_to_pending();
                returned.push(player);
            } else {
                kept.push(player);
            }
        }
        returned.shuffle(&mut rand::thread_rng());
        info!(
            "Returning {} unsold items to the queue in random order",
            returned.len()
        );

        self.state.cursor = kept.len();
        kept.extend(returned);
        self.state.players = kept;
        self.state.round.open();
        let player = &self.state.players[self.state.cursor];
        info!(
            "Up for bidding: {} (opening {})",
            player.name,
            player.opening_bid(self.rules.minimum_bid)
        );
        true
    }

    fn complete(&mut self, reason: &str) {
        self.state.is_completed = true;
        self.state.completion_reason = Some(reason.to_string());
        self.state.round.deactivate();
        self.history.clear();
        info!("Auction completed: {}", reason);
    }
}
