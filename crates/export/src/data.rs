use std::ops::Range;

use chess::Color;
use ndarray::{Array1, Array3};

use crate::value::Outcome;

/// Result of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
}

impl GameResult {
    /// Win for `color`
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameResult::WhiteWin,
            Color::Black => GameResult::BlackWin,
        }
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            GameResult::WhiteWin => Some(Color::White),
            GameResult::BlackWin => Some(Color::Black),
            GameResult::Draw => None,
        }
    }

    /// The result seen from the side that moved first
    pub fn relative_to(self, first_mover: Color) -> Outcome {
        match self.winner() {
            None => Outcome::Draw,
            Some(winner) if winner == first_mover => Outcome::FirstMoverWins,
            Some(_) => Outcome::SecondMoverWins,
        }
    }
}

/// Contiguous offset range holding one game's positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRecord {
    /// Offset of ply 0
    pub start: usize,
    /// Positions recorded so far
    pub plys: usize,
    /// Side to move at ply 0
    pub first_mover: Color,
}

impl GameRecord {
    pub fn new(start: usize, first_mover: Color) -> Self {
        Self {
            start,
            plys: 0,
            first_mover,
        }
    }

    /// Offset one past the last recorded position
    pub fn end(&self) -> usize {
        self.start + self.plys
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    pub fn len(&self) -> usize {
        self.plys
    }

    pub fn is_empty(&self) -> bool {
        self.plys == 0
    }
}

/// Planes and policy of one position were written; its value is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionCommit {
    pub offset: usize,
    /// Ply of the position within its game
    pub ply: usize,
}

/// A game whose value rows were written and which lies below the watermark
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedGame {
    pub record: GameRecord,
    pub result: GameResult,
    pub values: Array1<i16>,
}

/// One fully committed row, as read back from a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    /// `[C, H, W]` input planes
    pub planes: Array3<i16>,
    /// `[L]` target policy
    pub policy: Array1<f32>,
    /// Target value in {-1, 0, 1}
    pub value: i16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_outcome() {
        assert_eq!(
            GameResult::WhiteWin.relative_to(Color::White),
            Outcome::FirstMoverWins
        );
        assert_eq!(
            GameResult::WhiteWin.relative_to(Color::Black),
            Outcome::SecondMoverWins
        );
        assert_eq!(
            GameResult::BlackWin.relative_to(Color::Black),
            Outcome::FirstMoverWins
        );
        assert_eq!(GameResult::Draw.relative_to(Color::White), Outcome::Draw);
    }

    #[test]
    fn test_record_range() {
        let mut record = GameRecord::new(10, Color::White);
        assert!(record.is_empty());
        record.plys = 3;
        assert_eq!(record.range(), 10..13);
        assert_eq!(record.end(), 13);
    }
}
