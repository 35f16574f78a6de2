// Auction desk entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Load the player and team sheets
// 4. Open database
// 5. Build a fresh auction or resume the saved one
// 6. Create the command channel, spawn the stdin reader
// 7. Run the operator event loop
// 8. Cleanup on exit

use auction_desk::app::{self, App};
use auction_desk::auction::{Auction, AuctionRules, Player, Team};
use auction_desk::config::Config;
use auction_desk::import;
use auction_desk::store::Store;
use auction_desk::timer::RoundTimer;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use rand::seq::SliceRandom;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Auction desk starting up");

    // 2. Load config (path may be given as the first argument)
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "auction.toml".to_string());
    let config = Config::load(Path::new(&config_path)).context("failed to load configuration")?;
    info!(
        "Config loaded: minimum bid {}, increment {}, roster size {}",
        config.auction.minimum_bid, config.auction.bid_increment, config.auction.roster_size
    );

    // 3. Load the player and team sheets
    let (players, teams) = import::load_rosters(&config).context("failed to load auction sheets")?;
    info!("Loaded {} players and {} teams", players.len(), teams.len());

    // 4. Open database
    let store = Store::open(&config.database.path).context("failed to open database")?;
    info!("Database opened at {}", config.database.path);

    // 5. Build a fresh auction, or resume an unfinished one from the last
    // saved snapshot
    let rules = config.rules();
    let auction = match store
        .load_latest_snapshot()
        .context("failed to read saved snapshots")?
    {
        Some(saved) if !saved.is_completed => {
            info!("Resuming auction from the last saved snapshot");
            println!("resuming a previous session ('status' shows where it stands)");
            Auction::from_snapshot(saved, rules)
        }
        Some(_) => {
            info!("Previous auction is complete, starting fresh");
            store
                .clear_snapshots()
                .context("failed to clear old snapshots")?;
            fresh_auction(players, teams, rules)?
        }
        None => {
            info!("Starting a fresh auction");
            fresh_auction(players, teams, rules)?
        }
    };

    let timer = RoundTimer::new(
        config.auction.timer.enabled,
        Duration::from_secs(config.auction.timer.seconds),
    );
    let mut app = App::new(auction, store, timer);

    // 6. Create the command channel and spawn the stdin reader
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let reader_handle = tokio::spawn(read_stdin_commands(cmd_tx));

    // 7. Run the operator event loop (blocks until quit or stdin EOF)
    println!(
        "auction desk ready: {} players, {} teams (type 'help' for commands)",
        app.auction.players().len(),
        app.auction.teams().len()
    );
    if let Err(e) = app::run(cmd_rx, &mut app).await {
        error!("Operator loop error: {:#}", e);
    }

    // 8. Cleanup: the reader task blocks on stdin, so abort it
    reader_handle.abort();

    info!("Auction desk shut down cleanly");
    Ok(())
}

/// Shuffle the imported list so the sale order is not the sheet order, then
/// build the engine.
fn fresh_auction(
    mut players: Vec<Player>,
    teams: Vec<Team>,
    rules: AuctionRules,
) -> anyhow::Result<Auction> {
    players.shuffle(&mut rand::thread_rng());
    Auction::new(players, teams, rules).context("failed to build the auction")
}

/// Read console lines, parse them, and forward commands to the event loop.
/// Usage errors are printed here; the loop only ever sees valid commands.
async fn read_stdin_commands(cmd_tx: mpsc::Sender<app::OperatorCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match app::parse_command(&line) {
                Ok(cmd) => {
                    let quitting = cmd == app::OperatorCommand::Quit;
                    if cmd_tx.send(cmd).await.is_err() {
                        break;
                    }
                    if quitting {
                        break;
                    }
                }
                Err(usage) => println!("{usage}"),
            },
            Ok(None) => {
                // EOF behaves like quit.
                let _ = cmd_tx.send(app::OperatorCommand::Quit).await;
                break;
            }
            Err(e) => {
                warn!("stdin read error: {}", e);
                break;
            }
        }
    }
}

/// Initialize tracing to log to a file (not the terminal, which belongs to
/// the operator console).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gavel.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auction_desk=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
