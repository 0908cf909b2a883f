//! Self-play training data export
//!
//! This crate provides functionality for:
//! - Encoding positions into input planes and search results into policy vectors
//! - Assigning per-ply value targets once a game has ended
//! - Writing the aligned `x` / `y_value` / `y_policy` arrays to a chunked dataset
//! - Playing self-play games with the stand-in search and exporting them
//!
//! # Example
//!
//! ```no_run
//! use chesszero_export::{play_game, ExportConfig, Exporter, SelfPlayConfig};
//! use chesszero_search::{SearchConfig, UniformSearch};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut exporter = Exporter::create("data", ExportConfig::default())?;
//! let mut search = UniformSearch::new();
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! let config = SelfPlayConfig::new()
//!     .with_search(SearchConfig::default().with_simulations(800))
//!     .with_max_plies(300);
//!
//! let summary = play_game(&mut exporter, &mut search, &config, &mut rng, |result| {
//!     println!("{result}");
//! })?;
//! println!("Game finished after {} plies: {:?}", summary.len(), summary.result());
//! println!("Committed rows: {}", exporter.committed_len());
//! # Ok(())
//! # }
//! ```

mod config;
mod data;
pub mod dataset;
mod encode;
mod error;
mod exporter;
mod game;
pub mod storage;
mod value;

// Re-export public API
pub use config::{Config, ExportConfig, SelfPlayConfig};
pub use data::{CommittedGame, GameRecord, GameResult, PositionCommit, TrainingExample};
pub use dataset::{Dataset, DatasetLayout, RowState};
pub use encode::{encode_planes, encode_policy};
pub use error::{EncodeError, ExportError, Result};
pub use exporter::Exporter;
pub use game::{play_game, GameSummary, Termination};
pub use value::{assign_values, Outcome};
