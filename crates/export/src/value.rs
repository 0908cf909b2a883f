//! Per-ply value targets.

use ndarray::Array1;

/// Game result relative to the side that moved at ply 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    FirstMoverWins,
    SecondMoverWins,
    Draw,
}

impl Outcome {
    /// Target for the first mover's plies
    pub fn value(self) -> i16 {
        match self {
            Outcome::FirstMoverWins => 1,
            Outcome::SecondMoverWins => -1,
            Outcome::Draw => 0,
        }
    }
}

/// Value target of every ply of a `plys`-long game: `R, -R, R, ...`
pub fn assign_values(outcome: Outcome, plys: usize) -> Array1<i16> {
    let r = outcome.value();
    Array1::from_shape_fn(plys, |ply| if ply % 2 == 0 { r } else { -r })
}
