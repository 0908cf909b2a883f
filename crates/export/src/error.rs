use std::path::PathBuf;

use chess::ChessMove;
use chesszero_core::Perspective;
use chesszero_search::SearchError;
use thiserror::Error;

/// Failure to turn one position into training rows
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("{moves} legal moves but {probabilities} target probabilities")]
    LengthMismatch { moves: usize, probabilities: usize },

    #[error("Move {mv} has no entry in the {perspective:?} label table")]
    UnknownMove {
        mv: ChessMove,
        perspective: Perspective,
    },

    #[error("Move {mv} has non-finite probability {probability}")]
    NonFiniteProbability { mv: ChessMove, probability: f32 },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to encode position at offset {offset} (ply {ply}): {source}")]
    Encode {
        offset: usize,
        ply: usize,
        #[source]
        source: EncodeError,
    },

    #[error("Search result at offset {offset} (ply {ply}) belongs to a different position")]
    PositionMismatch { offset: usize, ply: usize },

    #[error(
        "Game starting at offset {start} recorded {recorded} positions but was finalized with {claimed} plies"
    )]
    PlyCountMismatch {
        start: usize,
        recorded: usize,
        claimed: usize,
    },

    #[error("No game is being recorded (cursor at offset {offset})")]
    NoOpenGame { offset: usize },

    #[error("Writing {rows} row(s) at offset {offset} exceeds capacity {capacity}")]
    CapacityExceeded {
        offset: usize,
        rows: usize,
        capacity: usize,
    },

    #[error("Array '{array}' expects rows of shape {expected:?}, got {found:?}")]
    ShapeMismatch {
        array: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Array '{array}' stores {found}, expected {expected}")]
    DtypeMismatch {
        array: String,
        expected: String,
        found: String,
    },

    #[error("Dataset arrays are misaligned: x={x}, y_value={value}, y_policy={policy}")]
    MisalignedArrays { x: usize, value: usize, policy: usize },

    #[error("Row {offset} lies below the commit watermark {committed} and cannot be rewritten")]
    CommittedRow { offset: usize, committed: usize },

    #[error("Manifest commits {committed} rows but the arrays hold only {len}")]
    CorruptManifest { committed: usize, len: usize },

    #[error("Invalid dataset layout: {0}")]
    InvalidLayout(String),

    #[error("Dataset stores normalize_planes={stored} but the export requests {requested}")]
    EncodingMismatch { stored: bool, requested: bool },

    #[error("Row {offset} is not fully committed (committed length {committed})")]
    Uncommitted { offset: usize, committed: usize },

    #[error("Export aborted after a failure at offset {offset}")]
    Aborted { offset: usize },

    #[error("Dataset already exists at {0}")]
    DatasetExists(PathBuf),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read chunk: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error("Failed to write chunk: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, ExportError>;
