use std::fmt;

use chess::ChessMove;
use chesszero_core::Board;

/// Base of the logarithmic value -> centipawn mapping
const VALUE_TO_CENTI_PARAM: f32 = 1.2;

/// Result of one completed search
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Position that was searched
    pub root: Board,

    /// Move selected for play, if any
    pub best_move: Option<ChessMove>,

    /// Legal moves considered at the root
    pub legal_moves: Vec<ChessMove>,

    /// Target probability of each legal move, aligned with `legal_moves`
    pub policy: Vec<f32>,

    /// Q-value of the root node from the side to move's point of view
    pub root_value: f32,

    pub centipawns: i32,
    pub depth: u32,

    /// Total nodes searched by the engine so far
    pub nodes: u64,

    /// Value of `nodes` when this search started
    pub nodes_pre_search: u64,

    pub elapsed_ms: u64,

    /// Principal variation starting at `root`
    pub pv: Vec<ChessMove>,

    /// Render castling in chess960 notation
    pub chess960: bool,
}

impl SearchResult {
    /// Create a result carrying only the training policy; the reporting
    /// fields start at zero
    pub fn new(root: Board, legal_moves: Vec<ChessMove>, policy: Vec<f32>) -> Self {
        Self {
            root,
            best_move: None,
            legal_moves,
            policy,
            root_value: 0.0,
            centipawns: 0,
            depth: 0,
            nodes: 0,
            nodes_pre_search: 0,
            elapsed_ms: 0,
            pv: Vec::new(),
            chess960: false,
        }
    }

    /// Target probability of `mv`, or 0 if it is not a legal move here
    pub fn probability_of(&self, mv: ChessMove) -> f32 {
        self.legal_moves
            .iter()
            .position(|&m| m == mv)
            .and_then(|i| self.policy.get(i).copied())
            .unwrap_or(0.0)
    }

    /// Nodes per second of this search, rounded to the nearest integer
    pub fn nps(&self) -> u64 {
        if self.elapsed_ms == 0 {
            return 0;
        }
        let searched = self.nodes.saturating_sub(self.nodes_pre_search) as f32;
        (searched / (self.elapsed_ms as f32 / 1000.0) + 0.5) as u64
    }

    /// PV moves in UCI notation, replayed from the root so castling can be
    /// recognised. Rendering stops at the first move that is not legal.
    pub fn pv_notation(&self) -> Vec<String> {
        let mut board = self.root;
        let mut moves = Vec::with_capacity(self.pv.len());
        for &mv in &self.pv {
            moves.push(board.uci_move(mv, self.chess960));
            if board.do_move(mv).is_err() {
                break;
            }
        }
        moves
    }
}

/// Protocol line reported to the controlling process after every search
impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "info score cp {} depth {} nodes {} time {} nps {} pv",
            self.centipawns,
            self.depth,
            self.nodes,
            self.elapsed_ms,
            self.nps()
        )?;
        for mv in self.pv_notation() {
            write!(f, " {mv}")?;
        }
        Ok(())
    }
}

/// Map a value in [-1, 1] to a centipawn score
pub fn value_to_centipawns(value: f32) -> i32 {
    if value.abs() >= 1.0 {
        return if value > 0.0 { 9999 } else { -9999 };
    }
    (-(value.signum() * (1.0 - value.abs()).ln()) / VALUE_TO_CENTI_PARAM.ln() * 100.0) as i32
}
