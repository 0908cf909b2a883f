use anyhow::{anyhow, bail, ensure, Result};
use chess::{BoardStatus, ChessMove};
use chesszero_core::{Board, FIFTY_MOVE_PLIES};
use chesszero_search::{SearchResult, UniformSearch};
use rand::Rng;

use crate::config::SelfPlayConfig;
use crate::data::{CommittedGame, GameResult};
use crate::exporter::Exporter;

/// Why a self-play game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Checkmate,
    Stalemate,
    FiftyMoveRule,
    /// Adjudicated as a draw after `max_plies`
    PlyLimit,
}

/// Outcome of one exported self-play game
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub committed: CommittedGame,
    pub termination: Termination,
    /// Moves played, one per exported position
    pub moves: Vec<ChessMove>,
    pub final_board: Board,
}

impl GameSummary {
    pub fn result(&self) -> GameResult {
        self.committed.result
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// Play a single self-play game and export every searched position
///
/// # Arguments
/// * `exporter` - Receives one row per position and the value targets at the end
/// * `search` - Engine that produces the move and training policy
/// * `config` - Search settings, start position and ply cap
/// * `on_search` - Called with every completed search, e.g. to print the info line
pub fn play_game<R, F>(
    exporter: &mut Exporter,
    search: &mut UniformSearch,
    config: &SelfPlayConfig,
    rng: &mut R,
    mut on_search: F,
) -> Result<GameSummary>
where
    R: Rng + ?Sized,
    F: FnMut(&SearchResult),
{
    ensure!(config.max_plies > 0, "max_plies must be at least 1");

    let mut board = match &config.start_fen {
        Some(fen) => Board::from_fen(fen)?,
        None => Board::new(),
    };
    if board.is_game_over() {
        bail!("Start position is already decided");
    }

    let mut moves = Vec::new();
    while !board.is_game_over() && moves.len() < config.max_plies {
        let result = search.search(&board, &config.search, rng)?;
        on_search(&result);

        exporter.record_position(&board, &result)?;

        let mv = result
            .best_move
            .ok_or_else(|| anyhow!("Search returned no move at ply {}", moves.len()))?;
        board.do_move(mv)?;
        moves.push(mv);

        search.reset();
    }

    let termination = termination_of(&board);
    let result = determine_result(&board, termination);
    let committed = exporter.finalize_game(result, moves.len())?;

    Ok(GameSummary {
        committed,
        termination,
        moves,
        final_board: board,
    })
}

/// Why the game on `board` is over; a live board has hit the ply cap
fn termination_of(board: &Board) -> Termination {
    match board.status() {
        BoardStatus::Checkmate => Termination::Checkmate,
        BoardStatus::Stalemate => Termination::Stalemate,
        BoardStatus::Ongoing if board.halfmove_clock() >= FIFTY_MOVE_PLIES => {
            Termination::FiftyMoveRule
        }
        BoardStatus::Ongoing => Termination::PlyLimit,
    }
}

/// Determine the result from a finished board
fn determine_result(board: &Board, termination: Termination) -> GameResult {
    match termination {
        // Side to move was mated
        Termination::Checkmate => GameResult::win_for(!board.side_to_move()),
        Termination::Stalemate | Termination::FiftyMoveRule | Termination::PlyLimit => {
            GameResult::Draw
        }
    }
}
