use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Board error: {0}")]
    BoardError(#[from] chesszero_core::BoardError),

    #[error("Terminal position cannot be searched")]
    TerminalPosition,

    #[error("Node has no children to derive a policy from")]
    NoChildren,

    #[error("Invalid node ID: {0}")]
    InvalidNodeId(usize),

    #[error("Root node not initialized")]
    RootNotInitialized,

    #[error("Invalid smoothing configuration: {0}")]
    InvalidConfig(String),

    #[error("Smoothed policy has a non-finite entry at child {0}")]
    NonFinitePolicy(usize),
}

pub type Result<T> = std::result::Result<T, SearchError>;
