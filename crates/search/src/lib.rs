// Module declarations
mod config;
mod error;
mod search;
mod search_result;
mod selection;
mod smoothing;
mod tree;

// Public exports
pub use config::{SearchConfig, SmoothingConfig};
pub use error::{Result, SearchError};
pub use search::UniformSearch;
pub use search_result::{value_to_centipawns, SearchResult};
pub use selection::select_move;
pub use smoothing::{retrieve_legal_moves, smooth_visits, smoothed_policy};
pub use tree::{NodeId, NodeRef, NodeSnapshot, SearchNode, SearchTree, TreeNode};
