// Configuration loading and validation for auction.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::auction::AuctionRules;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// auction.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub auction: AuctionSection,
    pub teams: TeamsSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuctionSection {
    /// Floor for opening bids and the per-slot budget reservation.
    pub minimum_bid: u32,
    /// Step between a high bid and the next callable amount.
    pub bid_increment: u32,
    /// Roster capacity applied to every team.
    pub roster_size: usize,
    /// Whether unsold items return to the queue in randomized order.
    #[serde(default = "default_unsold_return")]
    pub unsold_return: bool,
    #[serde(default)]
    pub timer: TimerSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimerSection {
    /// Per-item countdown on/off.
    pub enabled: bool,
    /// Countdown length. Rearmed on every accepted bid.
    pub seconds: u64,
}

impl Default for TimerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamsSection {
    /// Starting budget for teams without an override in the teams CSV.
    pub default_budget: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub players: String,
    pub teams: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            players: "data/players.csv".into(),
            teams: "data/teams.csv".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    pub path: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: "auction-desk.db".into(),
        }
    }
}

fn default_unsold_return() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load and validate `auction.toml` from the given path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        let config: Config = toml::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        validate(&config)?;
        Ok(config)
    }

    /// The engine-facing slice of this configuration.
    pub fn rules(&self) -> AuctionRules {
        AuctionRules {
            minimum_bid: self.auction.minimum_bid,
            bid_increment: self.auction.bid_increment,
            unsold_return: self.auction.unsold_return,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let positive_fields: &[(&str, u32)] = &[
        ("auction.minimum_bid", config.auction.minimum_bid),
        ("auction.bid_increment", config.auction.bid_increment),
        ("teams.default_budget", config.teams.default_budget),
    ];
    for (name, val) in positive_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be greater than 0".into(),
            });
        }
    }

    if config.auction.roster_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "auction.roster_size".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.auction.timer.enabled && config.auction.timer.seconds == 0 {
        return Err(ConfigError::ValidationError {
            field: "auction.timer.seconds".into(),
            message: "must be greater than 0 when the timer is enabled".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
