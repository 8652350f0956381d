//! Relay-backed storage: `GET`/`POST /board.json` over HTTP.

use super::{BoardStore, StorageError, StorageResult};
use crate::board::Board;
use std::io::Read;
use std::time::Duration;
use url::Url;

/// Path of the board resource on the relay.
pub const BOARD_PATH: &str = "/board.json";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads and writes the authoritative board held by a relay.
pub struct HttpStore {
    agent: ureq::Agent,
    board_url: Url,
}

impl HttpStore {
    /// Create a store for the relay at `base_url` (e.g. `http://localhost:3751`).
    pub fn new(base_url: &str) -> StorageResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| StorageError::Http(format!("Invalid relay URL {}: {}", base_url, e)))?;
        let board_url = base
            .join(BOARD_PATH)
            .map_err(|e| StorageError::Http(format!("Invalid relay URL {}: {}", base_url, e)))?;
        let agent = ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build();
        Ok(Self { agent, board_url })
    }

    pub fn board_url(&self) -> &Url {
        &self.board_url
    }
}

fn map_ureq_error(action: &str, err: ureq::Error) -> StorageError {
    match err {
        ureq::Error::Status(404, _) => StorageError::NotFound(action.to_string()),
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            StorageError::Http(format!("{} failed with status {}: {}", action, code, body))
        }
        ureq::Error::Transport(t) => StorageError::Http(format!("{} failed: {}", action, t)),
    }
}

impl BoardStore for HttpStore {
    fn load(&self) -> StorageResult<Board> {
        let resp = self
            .agent
            .get(self.board_url.as_str())
            .set("Accept", "application/json")
            .call()
            .map_err(|e| map_ureq_error("GET /board.json", e))?;
        let mut body = String::new();
        resp.into_reader()
            .read_to_string(&mut body)
            .map_err(|e| StorageError::Io(format!("Failed to read board body: {}", e)))?;
        Board::from_json(&body).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn save(&self, board: &Board) -> StorageResult<()> {
        let json = board
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.agent
            .post(self.board_url.as_str())
            .set("Content-Type", "application/json")
            .send_string(&json)
            .map_err(|e| map_ureq_error("POST /board.json", e))?;
        Ok(())
    }
}
