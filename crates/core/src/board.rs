use std::str::FromStr;

use chess::{BoardStatus, ChessMove, Color, File, MoveGen, Piece};

use crate::error::BoardError;

/// Half-moves without a capture or pawn move after which the game is drawn
pub const FIFTY_MOVE_PLIES: u32 = 100;

/// Chess position with the move counters tracked alongside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    inner: chess::Board,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Board {
    /// Standard starting position
    pub fn new() -> Self {
        Self {
            inner: chess::Board::default(),
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Parse a FEN string. The two counter fields are optional.
    pub fn from_fen(fen: &str) -> Result<Self, BoardError> {
        let invalid = |reason: String| BoardError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };

        let inner = chess::Board::from_str(fen).map_err(|e| invalid(e.to_string()))?;
        let fields: Vec<&str> = fen.split_whitespace().collect();

        let halfmove_clock = match fields.get(4) {
            Some(f) => f
                .parse()
                .map_err(|_| invalid(format!("bad half-move clock '{f}'")))?,
            None => 0,
        };
        let fullmove_number = match fields.get(5) {
            Some(f) => f
                .parse()
                .map_err(|_| invalid(format!("bad full-move number '{f}'")))?,
            None => 1,
        };

        Ok(Self {
            inner,
            halfmove_clock,
            fullmove_number,
        })
    }

    pub fn inner(&self) -> &chess::Board {
        &self.inner
    }

    pub fn side_to_move(&self) -> Color {
        self.inner.side_to_move()
    }

    /// Half-moves since the last capture or pawn move
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.inner).collect()
    }

    pub fn is_legal(&self, mv: ChessMove) -> bool {
        self.inner.legal(mv)
    }

    /// Apply a legal move, updating the counters
    pub fn do_move(&mut self, mv: ChessMove) -> Result<(), BoardError> {
        if !self.is_legal(mv) {
            return Err(BoardError::IllegalMove(mv.to_string()));
        }

        let resets_clock = self.inner.piece_on(mv.get_source()) == Some(Piece::Pawn)
            || self.inner.piece_on(mv.get_dest()).is_some();
        self.halfmove_clock = if resets_clock {
            0
        } else {
            self.halfmove_clock + 1
        };
        if self.side_to_move() == Color::Black {
            self.fullmove_number += 1;
        }
        self.inner = self.inner.make_move_new(mv);
        Ok(())
    }

    pub fn status(&self) -> BoardStatus {
        self.inner.status()
    }

    /// Checkmate, stalemate or the fifty-move rule
    pub fn is_game_over(&self) -> bool {
        self.status() != BoardStatus::Ongoing || self.halfmove_clock >= FIFTY_MOVE_PLIES
    }

    /// Whether `mv` is a castling move in this position
    pub fn is_castling(&self, mv: ChessMove) -> bool {
        let src = mv.get_source().get_file().to_index();
        let dst = mv.get_dest().get_file().to_index();
        self.inner.piece_on(mv.get_source()) == Some(Piece::King) && src.abs_diff(dst) == 2
    }

    /// UCI notation for `mv`.
    ///
    /// In chess960 mode castling is written as the king capturing its own
    /// rook (`e1h1`), otherwise as the two-square king step (`e1g1`).
    pub fn uci_move(&self, mv: ChessMove, chess960: bool) -> String {
        if chess960 && self.is_castling(mv) {
            let kingside =
                mv.get_dest().get_file().to_index() > mv.get_source().get_file().to_index();
            let rook_file = if kingside {
                File::H
            } else {
                File::A
            };
            let rook_square = chess::Square::make_square(mv.get_dest().get_rank(), rook_file);
            return format!("{}{}", mv.get_source(), rook_square);
        }
        mv.to_string()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
