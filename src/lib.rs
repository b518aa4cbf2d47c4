// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod history;
pub mod play;
pub mod round;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod timer;

pub use catalog::{Catalog, GameLink, Place};
pub use error::{CatalogError, ExportError, GameError, PlayError};
pub use geo::{distance_yards, Coordinate};
pub use round::{Resolution, RoundResult, RoundTarget};
pub use scoring::ScoringPolicy;
pub use session::{SessionEngine, SessionSummary};
