// Error types for the game engine and the place catalog

use std::io;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GameError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Round {round} has already been resolved")]
    AlreadyResolved { round: usize },

    #[error("Session is already finalized")]
    SessionFinalized,

    #[error("Round index {index} is out of range for a session of {len} rounds")]
    OutOfRange { index: usize, len: usize },

    #[error("Session is still in progress")]
    InProgress,

    #[error("Round {round} has no target location yet")]
    RoundBlocked { round: usize },

    #[error("Invalid coordinate: ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Unable to read place catalog: {0}")]
    Io(#[from] io::Error),

    #[error("Unable to parse place catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Bundled catalog not found: {0}")]
    MissingBundle(String),

    #[error("Place {0} is listed more than once")]
    DuplicatePlace(u32),

    #[error("Place not found: {0}")]
    UnknownPlace(u32),

    #[error("Catalog has {available} places, {wanted} requested")]
    NotEnoughPlaces { wanted: usize, available: usize },

    #[error("Malformed game link: {0}")]
    BadLink(String),

    #[error(transparent)]
    Game(#[from] GameError),
}

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("Unable to write game output: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Game(#[from] GameError),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Unable to read history: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Unable to write CSV: {0}")]
    Csv(#[from] csv::Error),
}
