//! Flowboard command-line shell.
//!
//! Works with board files and relays without a UI: validate and normalize
//! board files, copy boards to and from a relay, and watch a live session.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use thiserror::Error;

use flowboard_core::session::{SessionConfig, SessionError, SessionEvent, SyncSession};
use flowboard_core::storage::{BoardStore, FileStore, HttpStore, StorageError};
use flowboard_core::{Board, CollabEvent};

/// How often `watch` drives the session.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Flowboard board and relay tools.
#[derive(Parser)]
#[command(name = "flowboard", about = "Flowboard board and relay tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a board file and print a summary.
    Validate {
        /// Board file (default: the user data directory).
        file: Option<PathBuf>,

        /// Rewrite the file in normalized form.
        #[arg(long)]
        fix: bool,
    },
    /// Download the relay's board into a file.
    Pull {
        /// Relay base URL, e.g. http://localhost:3751
        #[arg(short, long)]
        relay: String,

        /// Destination file (default: the user data directory).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Upload a board file to the relay, replacing its board.
    Push {
        #[arg(short, long)]
        relay: String,

        /// Board file (default: the user data directory).
        file: Option<PathBuf>,
    },
    /// Join a relay session and report presence and board changes.
    Watch {
        #[arg(short, long)]
        relay: String,

        /// Display name announced to other peers.
        #[arg(short, long, default_value = "")]
        name: String,

        /// Stop after this many seconds (default: run until killed).
        #[arg(long)]
        seconds: Option<u64>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file, fix } => run_validate(file, fix),
        Commands::Pull { relay, out } => run_pull(&relay, out),
        Commands::Push { relay, file } => run_push(&relay, file),
        Commands::Watch { relay, name, seconds } => run_watch(relay, name, seconds),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn file_store(path: Option<PathBuf>) -> Result<FileStore, StorageError> {
    match path {
        Some(path) => FileStore::new(path),
        None => FileStore::default_location(),
    }
}

fn run_validate(file: Option<PathBuf>, fix: bool) -> Result<(), AppError> {
    let store = file_store(file)?;
    let board = store.load()?;
    println!("{}: {}", store.path().display(), summarize(&board));
    if fix {
        store.save(&board)?;
        println!("Rewrote {}", store.path().display());
    }
    Ok(())
}

fn run_pull(relay: &str, out: Option<PathBuf>) -> Result<(), AppError> {
    let remote = HttpStore::new(relay)?;
    let board = remote.load()?;
    let store = file_store(out)?;
    store.save(&board)?;
    println!("Pulled {} into {}", summarize(&board), store.path().display());
    Ok(())
}

fn run_push(relay: &str, file: Option<PathBuf>) -> Result<(), AppError> {
    let store = file_store(file)?;
    let board = store.load()?;
    let remote = HttpStore::new(relay)?;
    remote.save(&board)?;
    println!("Pushed {} to {}", summarize(&board), remote.board_url());
    Ok(())
}

fn run_watch(relay: String, name: String, seconds: Option<u64>) -> Result<(), AppError> {
    let storage = Arc::new(HttpStore::new(&relay)?);
    let config = SessionConfig {
        relay_url: Some(relay),
        display_name: name,
        ..SessionConfig::default()
    };
    let mut session = SyncSession::native(config, storage)?;

    let start = Instant::now();
    session.open(start)?;
    println!("Opened {}", summarize(session.canvas().board()));

    let deadline = seconds.map(|s| start + Duration::from_secs(s));
    loop {
        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            break;
        }
        for event in session.tick(now) {
            report(&session, &event);
        }
        std::thread::sleep(TICK_INTERVAL);
    }

    session.close(Instant::now())?;
    Ok(())
}

fn report<S: BoardStore + 'static>(session: &SyncSession<S>, event: &SessionEvent) {
    match event {
        SessionEvent::Sync(CollabEvent::Joined { peer_id }) => {
            println!("Joined as {}: {}", peer_id, summarize(session.canvas().board()));
        }
        SessionEvent::Sync(CollabEvent::PresenceChanged) => {
            let names: Vec<&str> = session.users().iter().map(|u| u.name.as_str()).collect();
            println!("Present: {}", names.join(", "));
        }
        SessionEvent::Sync(CollabEvent::BoardReplaced) => {
            println!("Board updated: {}", summarize(session.canvas().board()));
        }
        SessionEvent::Sync(CollabEvent::Disconnected) => println!("Disconnected; reconnecting"),
        SessionEvent::SaveFailed(e) => eprintln!("Save failed: {}", e),
        other => log::debug!("{:?}", other),
    }
}

/// One-line description of a board.
fn summarize(board: &Board) -> String {
    let mut summary = format!("{} node(s), {} edge(s)", board.nodes.len(), board.edges.len());
    let dangling = board.dangling_edge_count();
    if dangling > 0 {
        summary.push_str(&format!(" ({} dangling)", dangling));
    }
    if let Some(bounds) = board.content_bounds() {
        summary.push_str(&format!(", {:.0}x{:.0} board units", bounds.width(), bounds.height()));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["flowboard", "watch", "-r", "http://localhost:3751", "--name", "Ada"]).unwrap();
        match cli.command {
            Commands::Watch { relay, name, seconds } => {
                assert_eq!(relay, "http://localhost:3751");
                assert_eq!(name, "Ada");
                assert_eq!(seconds, None);
            }
            _ => panic!("expected watch"),
        }
        assert!(Cli::try_parse_from(["flowboard", "push"]).is_err());
    }

    #[test]
    fn test_summarize() {
        let board = Board::from_json(
            r#"{"nodes":[{"id":"a","type":"text","x":0,"y":0,"width":100,"height":50,"text":"A"}],
                "edges":[{"id":"e","fromId":"a","toId":"gone"}]}"#,
        )
        .unwrap();
        assert_eq!(summarize(&board), "1 node(s), 1 edge(s) (1 dangling), 100x50 board units");
        assert_eq!(summarize(&Board::new()), "0 node(s), 0 edge(s)");
    }

    #[test]
    fn test_validate_fix_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        std::fs::write(&path, r#"{"nodes":[{"id":"c","type":"checkbox","x":0,"y":0,"items":[]}]}"#).unwrap();

        run_validate(Some(path.clone()), true).unwrap();
        let board = Board::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(board.nodes[0].items().len(), 1);
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_validate(Some(dir.path().join("absent.json")), false).unwrap_err();
        assert!(matches!(err, AppError::Storage(StorageError::NotFound(_))));
    }
}
