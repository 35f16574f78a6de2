// Operator console orchestration: command parsing, the application state,
// and the event loop.
//
// Owns the auction engine, the persistence handle, and the countdown timer.
// Commands arrive over an mpsc channel from the stdin reader; countdown
// expiry auto-resolves the item on the block. Every successful mutation
// saves a snapshot so a crash resumes from the last accepted action.

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::auction::{Auction, TeamId};
use crate::store::Store;
use crate::timer::{countdown, RoundTimer};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Start,
    /// `bid <team> [amount]`; without an amount, the minimum next bid.
    Bid { team: String, amount: Option<u32> },
    Pass { team: String },
    Sold,
    Unsold,
    Undo,
    Advance,
    Hold(bool),
    Status,
    Teams,
    End,
    Help,
    Quit,
}

const HELP_TEXT: &str = "\
commands:
  start                open the auction
  bid <team> [amount]  place a bid; without an amount, the minimum next bid
  pass <team>          opt the team out of this round
  sold                 hammer down to the high bidder
  unsold               close the round with no sale
  undo                 roll back the last accepted bid
  next                 bring up the next item (after hold-advance)
  hold on|off          make resolutions wait for 'next'
  status               show the item on the block
  teams                show budgets and rosters
  end                  force-complete the auction
  quit                 save and exit
teams can be named by id or (single-word) name";

/// Translate one console line into a command.
///
/// Returns `Err` with a usage message for anything unrecognized. A blank
/// line parses to `Status` so a bare Enter reprints the block.
pub fn parse_command(line: &str) -> Result<OperatorCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(OperatorCommand::Status);
    };
    let rest: Vec<&str> = parts.collect();

    match verb.to_lowercase().as_str() {
        "start" => Ok(OperatorCommand::Start),
        "bid" | "b" => match rest.as_slice() {
            [team] => Ok(OperatorCommand::Bid {
                team: team.to_string(),
                amount: None,
            }),
            [team, amount] => amount
                .parse::<u32>()
                .map(|a| OperatorCommand::Bid {
                    team: team.to_string(),
                    amount: Some(a),
                })
                .map_err(|_| format!("'{amount}' is not an amount; usage: bid <team> [amount]")),
            _ => Err("usage: bid <team> [amount]".into()),
        },
        "pass" | "p" => match rest.as_slice() {
            [team] => Ok(OperatorCommand::Pass {
                team: team.to_string(),
            }),
            _ => Err("usage: pass <team>".into()),
        },
        "sold" => Ok(OperatorCommand::Sold),
        "unsold" => Ok(OperatorCommand::Unsold),
        "undo" => Ok(OperatorCommand::Undo),
        "next" | "advance" => Ok(OperatorCommand::Advance),
        "hold" => match rest.as_slice() {
            ["on"] => Ok(OperatorCommand::Hold(true)),
            ["off"] => Ok(OperatorCommand::Hold(false)),
            _ => Err("usage: hold on|off".into()),
        },
        "status" | "s" => Ok(OperatorCommand::Status),
        "teams" | "t" => Ok(OperatorCommand::Teams),
        "end" => Ok(OperatorCommand::End),
        "help" | "h" | "?" => Ok(OperatorCommand::Help),
        "quit" | "q" | "exit" => Ok(OperatorCommand::Quit),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Console application state: the engine plus its runtime companions.
pub struct App {
    pub auction: Auction,
    pub store: Store,
    pub timer: RoundTimer,
    completion_recorded: bool,
}

impl App {
    /// Wrap a new or resumed auction. A resumed session with a live round
    /// gets a fresh countdown.
    pub fn new(auction: Auction, store: Store, timer: RoundTimer) -> Self {
        let completion_recorded = auction.is_completed();
        let mut app = Self {
            auction,
            store,
            timer,
            completion_recorded,
        };
        if app.auction.round().active {
            app.timer.arm();
        }
        app
    }

    /// Apply one command and return the line(s) to print.
    pub fn handle_command(&mut self, cmd: OperatorCommand) -> String {
        match cmd {
            OperatorCommand::Start => match self.auction.start() {
                Ok(()) => self.commit_and_render(),
                Err(e) => format!("refused: {e}"),
            },
            OperatorCommand::Bid { team, amount } => self.handle_bid(&team, amount),
            OperatorCommand::Pass { team } => self.handle_pass(&team),
            OperatorCommand::Sold => match self.auction.resolve_sold() {
                Ok(()) => self.commit_and_render(),
                Err(e) => format!("refused: {e}"),
            },
            OperatorCommand::Unsold => match self.auction.resolve_unsold() {
                Ok(()) => self.commit_and_render(),
                Err(e) => format!("refused: {e}"),
            },
            OperatorCommand::Undo => {
                let undone = self.auction.undo_description().map(str::to_string);
                match self.auction.undo() {
                    Ok(()) => {
                        self.sync_timer();
                        self.after_mutation();
                        match undone {
                            Some(d) => format!("rolled back {d}"),
                            None => "rolled back".into(),
                        }
                    }
                    Err(e) => format!("refused: {e}"),
                }
            }
            OperatorCommand::Advance => match self.auction.advance() {
                Ok(()) => self.commit_and_render(),
                Err(e) => format!("refused: {e}"),
            },
            OperatorCommand::Hold(on) => {
                self.auction.set_hold_advance(on);
                self.after_mutation();
                if on {
                    "hold-advance on: resolutions wait for 'next'".into()
                } else {
                    "hold-advance off".into()
                }
            }
            OperatorCommand::Status => self.render_status(),
            OperatorCommand::Teams => self.render_teams(),
            OperatorCommand::End => match self.auction.end_auction() {
                Ok(()) => {
                    self.sync_timer();
                    self.after_mutation();
                    format!("{}\n{}", self.render_status(), self.render_teams())
                }
                Err(e) => format!("refused: {e}"),
            },
            OperatorCommand::Help => HELP_TEXT.to_string(),
            // Quit is intercepted by the event loop.
            OperatorCommand::Quit => String::new(),
        }
    }

    /// Countdown expiry: sold to the high bidder, unsold otherwise.
    pub fn handle_timer_expiry(&mut self) -> String {
        self.timer.disarm();
        match self.auction.resolve_expired() {
            Ok(()) => format!("time!\n{}", self.commit_and_render()),
            Err(e) => {
                warn!("countdown fired without an active round: {e}");
                String::new()
            }
        }
    }

    fn handle_bid(&mut self, token: &str, amount: Option<u32>) -> String {
        let Some(team_id) = self.resolve_team(token) else {
            return format!("no team matching '{token}'");
        };
        let amount = match amount.or_else(|| self.auction.minimum_next_bid()) {
            Some(a) => a,
            None => return "refused: no bidding round is active".into(),
        };
        match self.auction.place_bid(team_id, amount) {
            Ok(()) => {
                self.timer.arm();
                self.after_mutation();
                let name = self.team_name(team_id);
                format!("{name} bids {amount}")
            }
            Err(e) => format!("refused: {e}"),
        }
    }

    fn handle_pass(&mut self, token: &str) -> String {
        let Some(team_id) = self.resolve_team(token) else {
            return format!("no team matching '{token}'");
        };
        match self.auction.pass(team_id) {
            Ok(()) => {
                self.after_mutation();
                let name = self.team_name(team_id);
                let eligible = self.auction.eligible_teams().len();
                format!("{name} passes ({eligible} teams still eligible)")
            }
            Err(e) => format!("refused: {e}"),
        }
    }

    /// Match a console token against team ids, then case-insensitive names.
    fn resolve_team(&self, token: &str) -> Option<TeamId> {
        if let Ok(id) = token.parse::<TeamId>() {
            if self.auction.team(id).is_some() {
                return Some(id);
            }
        }
        self.auction
            .teams()
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(token))
            .map(|t| t.id)
    }

    fn team_name(&self, id: TeamId) -> String {
        self.auction
            .team(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("team {id}"))
    }

    fn commit_and_render(&mut self) -> String {
        self.sync_timer();
        self.after_mutation();
        self.render_status()
    }

    /// Align the countdown with the round: a live round gets a fresh timer,
    /// anything else stops it.
    fn sync_timer(&mut self) {
        if self.auction.round().active {
            self.timer.arm();
        } else {
            self.timer.disarm();
        }
    }

    /// Persist the post-mutation state, and write the completion record the
    /// first time the auction reports completed. Store failures are logged
    /// and do not interrupt the auction.
    fn after_mutation(&mut self) {
        if let Err(e) = self.store.save_snapshot(&self.auction.snapshot()) {
            warn!("failed to save snapshot: {:#}", e);
        }
        if self.auction.is_completed() && !self.completion_recorded {
            let reason = self
                .auction
                .completion_reason()
                .unwrap_or("completed")
                .to_string();
            match self.store.record_completion(&self.auction.snapshot(), &reason) {
                Ok(()) => self.completion_recorded = true,
                Err(e) => warn!("failed to record completion: {:#}", e),
            }
            self.timer.disarm();
        }
    }

    // -- rendering ----------------------------------------------------------

    /// One status block for the console: the item on the block, the ledger
    /// position, and who can still bid.
    pub fn render_status(&self) -> String {
        if !self.auction.is_started() {
            return format!(
                "not started: {} items, {} teams (type 'start')",
                self.auction.players().len(),
                self.auction.teams().len()
            );
        }
        if self.auction.is_completed() {
            return format!(
                "auction complete ({}): {} sold, {} spent",
                self.auction.completion_reason().unwrap_or("completed"),
                self.auction.state().sold_count(),
                self.auction.state().total_spent()
            );
        }
        let Some(player) = self.auction.current_player() else {
            return "no current item".into();
        };

        let mut lines = Vec::new();
        let mut tags = Vec::new();
        if let Some(role) = &player.role {
            tags.push(role.clone());
        }
        if let Some(r) = player.rating {
            tags.push(format!("rating {r}"));
        }
        let tag_str = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        lines.push(format!(
            "item {}/{}: {}{}",
            self.auction.state().cursor + 1,
            self.auction.players().len(),
            player.name,
            tag_str
        ));

        match &self.auction.round().highest {
            Some(bid) => lines.push(format!(
                "high bid: {} by {} ({} bids)",
                bid.amount,
                self.team_name(bid.team_id),
                self.auction.round().bids.len()
            )),
            None => lines.push(format!(
                "no bids yet (opening {})",
                player.opening_bid(self.auction.rules().minimum_bid)
            )),
        }

        if !self.auction.round().active {
            lines.push("round closed (hold-advance), type 'next' to continue".into());
        } else {
            if let Some(min) = self.auction.minimum_next_bid() {
                lines.push(format!("next bid: at least {min}"));
            }
            let eligible: Vec<String> = self
                .auction
                .eligible_teams()
                .iter()
                .map(|id| self.team_name(*id))
                .collect();
            lines.push(if eligible.is_empty() {
                "no eligible teams left".into()
            } else {
                format!("eligible: {}", eligible.join(", "))
            });
            if let Some(remaining) = self.timer.remaining() {
                lines.push(format!("{}s on the clock", remaining.as_secs()));
            }
        }

        let pending = self
            .auction
            .players()
            .iter()
            .filter(|p| p.is_pending())
            .count();
        lines.push(format!("left in pool: {pending}"));
        lines.join("\n")
    }

    /// Budget and roster table for all teams.
    pub fn render_teams(&self) -> String {
        let minimum_bid = self.auction.rules().minimum_bid;
        self.auction
            .teams()
            .iter()
            .map(|team| {
                let roster: Vec<String> = team
                    .roster
                    .iter()
                    .filter_map(|id| {
                        self.auction.players().iter().find(|p| p.id == *id).map(|p| {
                            if p.is_captain && p.sold_price == Some(0) {
                                format!("{} (captain)", p.name)
                            } else {
                                format!("{} ({})", p.name, p.sold_price.unwrap_or(0))
                            }
                        })
                    })
                    .collect();
                let roster_str = if roster.is_empty() {
                    "-".to_string()
                } else {
                    roster.join(", ")
                };
                format!(
                    "{:>2} {:<16} budget {}/{}  max bid {}  slots {}/{}  {}",
                    team.id,
                    team.name,
                    team.budget_remaining,
                    team.total_budget,
                    team.max_bid(minimum_bid),
                    team.roster.len(),
                    team.max_roster_size,
                    roster_str
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the operator event loop until quit or channel close.
///
/// Listens on two sources with `tokio::select!`:
/// 1. Operator commands from the stdin reader
/// 2. The bidding countdown
///
/// The countdown deadline is copied out of the timer each iteration, so
/// command handlers are free to rearm or disarm it.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<OperatorCommand>,
    app: &mut App,
) -> anyhow::Result<()> {
    info!("Operator event loop started");

    loop {
        let deadline = app.timer.deadline();
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(OperatorCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        let output = app.handle_command(cmd);
                        if !output.is_empty() {
                            println!("{output}");
                        }
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            _ = countdown(deadline) => {
                let output = app.handle_timer_expiry();
                if !output.is_empty() {
                    println!("{output}");
                }
            }
        }
    }

    info!("Operator event loop exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
