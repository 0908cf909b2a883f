use std::time::Instant;

use chess::BoardStatus;
use chesszero_core::Board;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::search_result::{value_to_centipawns, SearchResult};
use crate::selection::select_move;
use crate::smoothing::smoothed_policy;
use crate::tree::{NodeId, SearchTree, TreeNode};

/// Stand-in search that walks the tree by picking children uniformly at
/// random.
///
/// It has no evaluation function: non-terminal leaves are worth 0 and only
/// checkmates propagate a signal. It exists to drive self-play exports and
/// benchmarks without a network; the visit statistics it produces have the
/// same shape as a real engine's.
pub struct UniformSearch {
    tree: SearchTree,
    nodes_searched: u64,
}

impl UniformSearch {
    pub fn new() -> Self {
        Self {
            tree: SearchTree::new(),
            nodes_searched: 0,
        }
    }

    /// Run the configured number of simulations from `board`
    pub fn search<R: Rng + ?Sized>(
        &mut self,
        board: &Board,
        config: &SearchConfig,
        rng: &mut R,
    ) -> Result<SearchResult> {
        if board.is_game_over() {
            return Err(SearchError::TerminalPosition);
        }

        let start = Instant::now();
        let nodes_pre_search = self.nodes_searched;

        let root_id = self.tree.initialize_root(*board);
        self.expand(root_id)?;

        for _ in 0..config.num_simulations {
            let leaf_id = self.select_leaf(root_id, rng);
            let value = self.expand(leaf_id)?;
            self.backup(leaf_id, value);
        }
        self.nodes_searched += self.tree.size() as u64;

        let mut result = self.create_search_result(root_id, config, rng)?;
        result.nodes = self.nodes_searched;
        result.nodes_pre_search = nodes_pre_search;
        result.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    /// Descend from `root_id` through random children until an unexpanded
    /// or terminal node
    fn select_leaf<R: Rng + ?Sized>(&self, root_id: NodeId, rng: &mut R) -> NodeId {
        let mut current = root_id;
        loop {
            let node = &self.tree.nodes[current];
            if !node.is_expanded || node.is_terminal() {
                return current;
            }
            match node.children.choose(rng) {
                Some(&child) => current = child,
                None => return current,
            }
        }
    }

    /// Create the children of `id`; returns the leaf value from the point of
    /// view of the side to move at `id`
    fn expand(&mut self, id: NodeId) -> Result<f32> {
        let state = self.tree.nodes[id].state;

        if state.is_game_over() {
            let value = match state.status() {
                BoardStatus::Checkmate => -1.0,
                _ => 0.0,
            };
            let node = &mut self.tree.nodes[id];
            node.terminal_value = Some(value);
            node.is_expanded = true;
            return Ok(value);
        }

        if !self.tree.nodes[id].is_expanded {
            for mv in state.legal_moves() {
                let mut child_state = state;
                child_state.do_move(mv)?;
                let child_id = self.tree.add_node(TreeNode::new_child(child_state, mv, id));
                self.tree.nodes[id].children.push(child_id);
            }
            self.tree.nodes[id].is_expanded = true;
        }

        Ok(0.0)
    }

    /// Add `value` to every node on the path to the root, flipping its sign
    /// at each step since the players alternate
    fn backup(&mut self, leaf_id: NodeId, value: f32) {
        let mut value = value;
        let mut current = Some(leaf_id);
        while let Some(id) = current {
            let node = &mut self.tree.nodes[id];
            node.visit_count += 1;
            node.total_value += value;
            current = node.parent;
            value = -value;
        }
    }

    fn create_search_result<R: Rng + ?Sized>(
        &self,
        root_id: NodeId,
        config: &SearchConfig,
        rng: &mut R,
    ) -> Result<SearchResult> {
        let root = self.tree.node(root_id)?;
        let move_visits = root.move_visits();
        if move_visits.is_empty() {
            return Err(SearchError::NoChildren);
        }

        let legal_moves = move_visits.iter().map(|(mv, _)| *mv).collect();
        let policy = smoothed_policy(&root, &config.smoothing)?;
        let root_value = root.data().q_value();

        let mut result = SearchResult::new(root.data().state, legal_moves, policy);
        result.best_move = select_move(&move_visits, config.temperature, rng);
        result.root_value = root_value;
        result.centipawns = value_to_centipawns(root_value);
        result.depth = self.tree.max_depth();
        result.pv = self.tree.principal_variation(root_id);
        result.chess960 = config.chess960;
        Ok(result)
    }

    /// Reset the tree (clear all nodes)
    pub fn reset(&mut self) {
        self.tree.clear();
    }

    /// Get the number of nodes in the tree
    pub fn tree_size(&self) -> usize {
        self.tree.size()
    }
}

impl Default for UniformSearch {
    fn default() -> Self {
        Self::new()
    }
}
