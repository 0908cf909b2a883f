//! Board and policy encoding for one training row.

use chess::{ChessMove, Color};
use chesszero_core::{
    label_table, Board, Perspective, BOARD_HEIGHT, BOARD_WIDTH, NB_CHANNELS, NB_LABELS,
    NB_VALUES_TOTAL,
};
use ndarray::{Array1, Array3};

use crate::error::EncodeError;

/// Encode `board` as `[C, H, W]` planes.
///
/// The board produces `f32` planes; each value is truncated toward zero, so
/// normalized counters below 1 are stored as 0.
pub fn encode_planes(board: &Board, normalize: bool) -> Array3<i16> {
    let values = board.to_planes(normalize);
    debug_assert_eq!(values.len(), NB_VALUES_TOTAL);

    Array3::from_shape_fn((NB_CHANNELS, BOARD_HEIGHT, BOARD_WIDTH), |(c, h, w)| {
        values[(c * BOARD_HEIGHT + h) * BOARD_WIDTH + w] as i16
    })
}

/// Scatter `probabilities` into a dense `[L]` policy vector.
///
/// Each move is looked up in the label table of `side_to_move`; indices of
/// moves not listed stay zero. Nothing is renormalized.
pub fn encode_policy(
    legal_moves: &[ChessMove],
    probabilities: &[f32],
    side_to_move: Color,
) -> Result<Array1<f32>, EncodeError> {
    if legal_moves.len() != probabilities.len() {
        return Err(EncodeError::LengthMismatch {
            moves: legal_moves.len(),
            probabilities: probabilities.len(),
        });
    }

    let table = label_table(Perspective::for_side(side_to_move));
    let mut policy = Array1::<f32>::zeros(NB_LABELS);
    for (&mv, &p) in legal_moves.iter().zip(probabilities) {
        let label = table.index_of(mv).ok_or(EncodeError::UnknownMove {
            mv,
            perspective: table.perspective(),
        })?;
        if !p.is_finite() {
            return Err(EncodeError::NonFiniteProbability { mv, probability: p });
        }
        policy[label] = p;
    }
    Ok(policy)
}
