use chess::ChessMove;
use chesszero_core::Board;

use crate::error::{Result, SearchError};

/// Node ID in the arena-style tree
pub type NodeId = usize;

/// View of a searched position that the exporter derives a training policy
/// from: the position itself plus one visit count per child move.
pub trait SearchNode {
    fn board(&self) -> &Board;

    /// Moves leading to the children, in child order
    fn child_moves(&self) -> Vec<ChessMove>;

    /// Visit count of every child, aligned with [`SearchNode::child_moves`]
    fn child_visits(&self) -> Vec<u32>;

    fn child_count(&self) -> usize {
        self.child_moves().len()
    }
}

/// A single node in the search tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Board state at this node
    pub state: Board,

    /// Move that led to this state (None for root)
    pub move_action: Option<ChessMove>,

    /// Parent node ID
    pub parent: Option<NodeId>,

    /// Child node IDs
    pub children: Vec<NodeId>,

    /// Number of times this node has been visited
    pub visit_count: u32,

    /// Sum of values backed up through this node
    pub total_value: f32,

    /// Whether children have been created
    pub is_expanded: bool,

    /// Terminal value if the position is over (-1, 0)
    pub terminal_value: Option<f32>,
}

impl TreeNode {
    /// Create a new root node
    pub fn new_root(state: Board) -> Self {
        Self {
            state,
            move_action: None,
            parent: None,
            children: Vec::new(),
            visit_count: 0,
            total_value: 0.0,
            is_expanded: false,
            terminal_value: None,
        }
    }

    /// Create a new child node
    pub fn new_child(state: Board, move_action: ChessMove, parent: NodeId) -> Self {
        Self {
            move_action: Some(move_action),
            parent: Some(parent),
            ..Self::new_root(state)
        }
    }

    /// Get Q-value (average value)
    pub fn q_value(&self) -> f32 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.total_value / self.visit_count as f32
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_value.is_some()
    }
}

/// Search tree using arena allocation
#[derive(Debug, Clone)]
pub struct SearchTree {
    /// Arena of all nodes
    pub nodes: Vec<TreeNode>,

    /// Root node ID (usually 0)
    pub root_id: NodeId,
}

impl SearchTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(1024),
            root_id: 0,
        }
    }

    /// Initialize the tree with a root node
    pub fn initialize_root(&mut self, board: Board) -> NodeId {
        self.nodes.clear();
        self.nodes.push(TreeNode::new_root(board));
        self.root_id = 0;
        self.root_id
    }

    /// Add a new node and return its ID
    pub fn add_node(&mut self, node: TreeNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> Result<NodeRef<'_>> {
        if id < self.nodes.len() {
            Ok(NodeRef { tree: self, id })
        } else {
            Err(SearchError::InvalidNodeId(id))
        }
    }

    pub fn root(&self) -> Result<NodeRef<'_>> {
        if self.nodes.is_empty() {
            return Err(SearchError::RootNotInitialized);
        }
        self.node(self.root_id)
    }

    /// Get the number of nodes in the tree
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest path from the root
    pub fn max_depth(&self) -> u32 {
        let mut depths = vec![0u32; self.nodes.len()];
        let mut max = 0;
        // Children are always pushed after their parent
        for (id, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                depths[id] = depths[parent] + 1;
                max = max.max(depths[id]);
            }
        }
        max
    }

    /// Follow the most visited child from `id` until a leaf
    pub fn principal_variation(&self, id: NodeId) -> Vec<ChessMove> {
        let mut pv = Vec::new();
        let mut current = id;
        while let Some(&best) = self.nodes[current]
            .children
            .iter()
            .filter(|&&c| self.nodes[c].visit_count > 0)
            .max_by_key(|&&c| self.nodes[c].visit_count)
        {
            if let Some(mv) = self.nodes[best].move_action {
                pv.push(mv);
            }
            current = best;
        }
        pv
    }

    /// Clear the tree
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

impl Default for SearchTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed handle to one node of a [`SearchTree`]
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a SearchTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn data(&self) -> &'a TreeNode {
        &self.tree.nodes[self.id]
    }

    /// (move, visit count) for every child
    pub fn move_visits(&self) -> Vec<(ChessMove, u32)> {
        self.data()
            .children
            .iter()
            .filter_map(|&c| {
                let child = &self.tree.nodes[c];
                child.move_action.map(|mv| (mv, child.visit_count))
            })
            .collect()
    }
}

impl SearchNode for NodeRef<'_> {
    fn board(&self) -> &Board {
        &self.data().state
    }

    fn child_moves(&self) -> Vec<ChessMove> {
        self.move_visits().into_iter().map(|(mv, _)| mv).collect()
    }

    fn child_visits(&self) -> Vec<u32> {
        self.move_visits().into_iter().map(|(_, v)| v).collect()
    }

    fn child_count(&self) -> usize {
        self.data().children.len()
    }
}

/// Owned copy of a node's statistics, for engines that hand over a flat list
/// of (move, visits) instead of a tree
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub board: Board,
    pub children: Vec<(ChessMove, u32)>,
}

impl NodeSnapshot {
    pub fn new(board: Board, children: Vec<(ChessMove, u32)>) -> Self {
        Self { board, children }
    }
}

impl SearchNode for NodeSnapshot {
    fn board(&self) -> &Board {
        &self.board
    }

    fn child_moves(&self) -> Vec<ChessMove> {
        self.children.iter().map(|(mv, _)| *mv).collect()
    }

    fn child_visits(&self) -> Vec<u32> {
        self.children.iter().map(|(_, v)| *v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_children(visits: &[u32]) -> SearchTree {
        let mut tree = SearchTree::new();
        let board = Board::new();
        let root = tree.initialize_root(board);
        for (mv, &v) in board.legal_moves().into_iter().zip(visits) {
            let mut state = board;
            state.do_move(mv).unwrap();
            let mut child = TreeNode::new_child(state, mv, root);
            child.visit_count = v;
            let id = tree.add_node(child);
            tree.nodes[root].children.push(id);
        }
        tree.nodes[root].is_expanded = true;
        tree
    }

    #[test]
    fn test_empty_tree_has_no_root() {
        let tree = SearchTree::new();
        assert_eq!(tree.root().err(), Some(SearchError::RootNotInitialized));
        assert_eq!(tree.size(), 0);
    }

    #[test]
    fn test_node_ref_exposes_children() {
        let tree = tree_with_children(&[3, 0, 7]);
        let root = tree.root().unwrap();

        assert_eq!(root.child_count(), 3);
        assert_eq!(root.child_visits(), vec![3, 0, 7]);
        assert_eq!(root.child_moves().len(), 3);
        assert_eq!(root.board(), &Board::new());
    }

    #[test]
    fn test_invalid_node_id() {
        let tree = tree_with_children(&[1]);
        assert_eq!(tree.node(5).err(), Some(SearchError::InvalidNodeId(5)));
    }

    #[test]
    fn test_principal_variation_follows_visits() {
        let tree = tree_with_children(&[3, 0, 7]);
        let root = tree.root().unwrap();
        let pv = tree.principal_variation(root.id());
        assert_eq!(pv, vec![root.child_moves()[2]]);
        assert_eq!(tree.max_depth(), 1);
    }

    #[test]
    fn test_snapshot_node() {
        let board = Board::new();
        let moves = board.legal_moves();
        let snapshot = NodeSnapshot::new(board, vec![(moves[0], 4), (moves[1], 1)]);

        assert_eq!(snapshot.child_count(), 2);
        assert_eq!(snapshot.child_visits(), vec![4, 1]);
        assert_eq!(snapshot.child_moves(), vec![moves[0], moves[1]]);
    }
}
