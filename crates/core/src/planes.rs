//! Input plane layout.
//!
//! Planes are written from the side-to-move perspective: when Black is to
//! move the board is mirrored vertically so that "own" pieces always start at
//! the bottom rows, matching the mirrored label table.

use chess::{Color, Square, ALL_SQUARES};

use crate::board::Board;

pub const NB_CHANNELS: usize = 20;
pub const BOARD_HEIGHT: usize = 8;
pub const BOARD_WIDTH: usize = 8;
pub const NB_VALUES_PER_PLANE: usize = BOARD_HEIGHT * BOARD_WIDTH;
pub const NB_VALUES_TOTAL: usize = NB_CHANNELS * NB_VALUES_PER_PLANE;

/// First channel of the opponent's piece planes (own pieces occupy 0..6)
pub const CHANNEL_OPPONENT_PIECES: usize = 6;
pub const CHANNEL_COLOR: usize = 12;
pub const CHANNEL_TOTAL_MOVES: usize = 13;
pub const CHANNEL_OWN_KINGSIDE: usize = 14;
pub const CHANNEL_OWN_QUEENSIDE: usize = 15;
pub const CHANNEL_OPP_KINGSIDE: usize = 16;
pub const CHANNEL_OPP_QUEENSIDE: usize = 17;
pub const CHANNEL_NO_PROGRESS: usize = 18;
pub const CHANNEL_EN_PASSANT: usize = 19;

const MAX_FULLMOVES: f32 = 500.0;
const MAX_NO_PROGRESS: f32 = 50.0;

impl Board {
    /// Encode the position as `NB_CHANNELS x BOARD_HEIGHT x BOARD_WIDTH`
    /// values in row-major order.
    ///
    /// With `normalize` the move counters are scaled into `[0, 1)`; otherwise
    /// they are written as raw counts.
    pub fn to_planes(&self, normalize: bool) -> Vec<f32> {
        let mut planes = vec![0f32; NB_VALUES_TOTAL];
        let us = self.side_to_move();
        let flip = us == Color::Black;
        let inner = self.inner();

        for &sq in ALL_SQUARES.iter() {
            if let (Some(piece), Some(color)) = (inner.piece_on(sq), inner.color_on(sq)) {
                let base = if color == us {
                    0
                } else {
                    CHANNEL_OPPONENT_PIECES
                };
                planes[plane_index(base + piece.to_index(), sq, flip)] = 1.0;
            }
        }

        if us == Color::White {
            fill_plane(&mut planes, CHANNEL_COLOR, 1.0);
        }

        let total_moves = scale(self.fullmove_number(), MAX_FULLMOVES, normalize);
        fill_plane(&mut planes, CHANNEL_TOTAL_MOVES, total_moves);

        let ours = inner.castle_rights(us);
        let theirs = inner.castle_rights(!us);
        let rights = [
            (CHANNEL_OWN_KINGSIDE, ours.has_kingside()),
            (CHANNEL_OWN_QUEENSIDE, ours.has_queenside()),
            (CHANNEL_OPP_KINGSIDE, theirs.has_kingside()),
            (CHANNEL_OPP_QUEENSIDE, theirs.has_queenside()),
        ];
        for (channel, present) in rights {
            if present {
                fill_plane(&mut planes, channel, 1.0);
            }
        }

        let no_progress = scale(self.halfmove_clock(), MAX_NO_PROGRESS, normalize);
        fill_plane(&mut planes, CHANNEL_NO_PROGRESS, no_progress);

        // chess reports the capturable pawn; mark the square behind it
        if let Some(pawn) = inner.en_passant() {
            let target = pawn.uforward(us);
            planes[plane_index(CHANNEL_EN_PASSANT, target, flip)] = 1.0;
        }

        planes
    }
}

/// Flat index of `sq` on `channel`, mirrored vertically when `flip` is set
pub fn plane_index(channel: usize, sq: Square, flip: bool) -> usize {
    let rank = sq.get_rank().to_index();
    let row = if flip { BOARD_HEIGHT - 1 - rank } else { rank };
    channel * NB_VALUES_PER_PLANE + row * BOARD_WIDTH + sq.get_file().to_index()
}

fn fill_plane(planes: &mut [f32], channel: usize, value: f32) {
    let start = channel * NB_VALUES_PER_PLANE;
    planes[start..start + NB_VALUES_PER_PLANE].fill(value);
}

fn scale(count: u32, max: f32, normalize: bool) -> f32 {
    if normalize {
        count as f32 / max
    } else {
        count as f32
    }
}
