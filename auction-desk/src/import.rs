// Player and team roster loading from CSV.
//
// Reads two operator-authored sheets: a player list with optional base
// prices, roles, ratings, and captain flags, and a team list with optional
// per-team budget overrides. Ids are assigned from row order, 1-indexed.

use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::auction::{Player, Team};
use crate::config::{Config, PathsSection};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

/// Player sheet row. Only `name` is required; extra columns from spreadsheet
/// exports are silently ignored.
#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    name: String,
    #[serde(default)]
    base_price: Option<u32>,
    #[serde(default)]
    role: String,
    #[serde(default)]
    rating: Option<u8>,
    #[serde(default)]
    captain: String,
}

/// Team sheet row. A missing `budget` falls back to the configured default.
#[derive(Debug, Deserialize)]
struct RawTeamRow {
    name: String,
    #[serde(default)]
    budget: Option<u32>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spreadsheet-style truthiness for the captain column.
fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_players_from_reader<R: Read>(rdr: R) -> Result<Vec<Player>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut players = Vec::new();
    for result in reader.deserialize::<RawPlayerRow>() {
        match result {
            Ok(raw) => {
                let name = raw.name.trim();
                if name.is_empty() {
                    warn!("skipping player row with an empty name");
                    continue;
                }
                let rating = match raw.rating {
                    Some(r) if (1..=5).contains(&r) => Some(r),
                    Some(r) => {
                        warn!("player '{}': rating {} out of 1-5 range, dropping it", name, r);
                        None
                    }
                    None => None,
                };
                let role = raw.role.trim();

                let mut player = Player::new(players.len() as u32 + 1, name);
                player.base_price = raw.base_price;
                player.role = (!role.is_empty()).then(|| role.to_string());
                player.rating = rating;
                player.is_captain = is_truthy(&raw.captain);
                players.push(player);
            }
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
            }
        }
    }
    Ok(players)
}

fn load_teams_from_reader<R: Read>(
    rdr: R,
    default_budget: u32,
    roster_size: usize,
) -> Result<Vec<Team>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut teams = Vec::new();
    for result in reader.deserialize::<RawTeamRow>() {
        match result {
            Ok(raw) => {
                let name = raw.name.trim();
                if name.is_empty() {
                    warn!("skipping team row with an empty name");
                    continue;
                }
                if teams.iter().any(|t: &Team| t.name == name) {
                    warn!("duplicate team name '{}', keeping both rows", name);
                }
                let budget = raw.budget.unwrap_or(default_budget);
                teams.push(Team::new(
                    teams.len() as u32 + 1,
                    name,
                    budget,
                    roster_size,
                ));
            }
            Err(e) => {
                warn!("skipping malformed team row: {}", e);
            }
        }
    }
    Ok(teams)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

/// Load the player pool from a CSV file.
pub fn load_players(path: &Path) -> Result<Vec<Player>, ImportError> {
    let file = std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_players_from_reader(file).map_err(|e| ImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load the team list from a CSV file. Teams without a budget column get
/// `default_budget`; all teams get the configured roster size.
pub fn load_teams(
    path: &Path,
    default_budget: u32,
    roster_size: usize,
) -> Result<Vec<Team>, ImportError> {
    let file = std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_teams_from_reader(file, default_budget, roster_size).map_err(|e| ImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load both sheets using paths from the config.
pub fn load_rosters(config: &Config) -> Result<(Vec<Player>, Vec<Team>), ImportError> {
    load_rosters_from_paths(
        &config.paths,
        config.teams.default_budget,
        config.auction.roster_size,
    )
}

/// Load both sheets from explicit paths. Exposed for testing and flexibility.
pub fn load_rosters_from_paths(
    paths: &PathsSection,
    default_budget: u32,
    roster_size: usize,
) -> Result<(Vec<Player>, Vec<Team>), ImportError> {
    let players = load_players(Path::new(&paths.players))?;
    let teams = load_teams(Path::new(&paths.teams), default_budget, roster_size)?;

    if players.is_empty() {
        return Err(ImportError::Validation(
            "player CSV produced zero valid rows".into(),
        ));
    }
    if teams.is_empty() {
        return Err(ImportError::Validation(
            "team CSV produced zero valid rows".into(),
        ));
    }

    Ok((players, teams))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
