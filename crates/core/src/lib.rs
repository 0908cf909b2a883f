//! Chess board collaborator for the self-play exporter.
//!
//! Wraps [`chess::Board`] with the move counters the input planes need and
//! provides the two fixed lookup structures the dataset is defined over:
//! the plane layout and the move-label tables.

mod board;
mod error;
pub mod labels;
pub mod planes;

pub use board::{Board, FIFTY_MOVE_PLIES};
pub use error::BoardError;
pub use labels::{label_table, mirror_move, LabelTable, Perspective, NB_LABELS};
pub use planes::{BOARD_HEIGHT, BOARD_WIDTH, NB_CHANNELS, NB_VALUES_TOTAL};

pub use chess::{BoardStatus, ChessMove, Color, Piece, Square};
