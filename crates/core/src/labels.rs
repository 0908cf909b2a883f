//! Move-label tables.
//!
//! The label space enumerates every queen-like and knight-like from/to pair
//! on the board plus the knight, bishop and rook under-promotions. Queen
//! promotions share the plain from/to label. The network always reasons from
//! White's point of view, so moves of the side to move are looked up in
//! either the forward table (White) or the mirrored table (Black), where both
//! squares have their ranks flipped.

use std::collections::HashMap;

use chess::{ChessMove, Color, File, Piece, Rank, Square};
use once_cell::sync::Lazy;

/// Size of the policy label space
pub const NB_LABELS: usize = 1858;

const QUEEN_DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const KNIGHT_JUMPS: [(i32, i32); 8] = [
    (2, 1),
    (1, 2),
    (-1, 2),
    (-2, 1),
    (-2, -1),
    (-1, -2),
    (1, -2),
    (2, -1),
];

const UNDER_PROMOTIONS: [Piece; 3] = [Piece::Knight, Piece::Bishop, Piece::Rook];

/// Which of the two tables a move is looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Perspective {
    /// White to move, moves are used as they are
    Forward,
    /// Black to move, moves are mirrored vertically first
    Mirrored,
}

impl Perspective {
    pub fn for_side(side: Color) -> Self {
        match side {
            Color::White => Perspective::Forward,
            Color::Black => Perspective::Mirrored,
        }
    }

    fn orient(self, mv: ChessMove) -> ChessMove {
        match self {
            Perspective::Forward => mv,
            Perspective::Mirrored => mirror_move(mv),
        }
    }
}

/// Immutable move -> label index lookup for one perspective
pub struct LabelTable {
    perspective: Perspective,
    moves: Vec<ChessMove>,
    index: HashMap<ChessMove, usize>,
}

impl LabelTable {
    fn build(perspective: Perspective) -> Self {
        let moves = canonical_moves();
        let index = moves
            .iter()
            .enumerate()
            .map(|(label, &mv)| (perspective.orient(mv), label))
            .collect();

        Self {
            perspective,
            moves,
            index,
        }
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    /// Label index of `mv`, or `None` if the move is outside the label space
    pub fn index_of(&self, mv: ChessMove) -> Option<usize> {
        self.index.get(&strip_queen_promotion(mv)).copied()
    }

    /// The move (as played by the side to move) that maps to `label`
    pub fn move_at(&self, label: usize) -> Option<ChessMove> {
        self.moves.get(label).map(|&mv| self.perspective.orient(mv))
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

static FORWARD_TABLE: Lazy<LabelTable> = Lazy::new(|| LabelTable::build(Perspective::Forward));
static MIRRORED_TABLE: Lazy<LabelTable> = Lazy::new(|| LabelTable::build(Perspective::Mirrored));

/// Shared table for `perspective`, built on first use
pub fn label_table(perspective: Perspective) -> &'static LabelTable {
    match perspective {
        Perspective::Forward => &FORWARD_TABLE,
        Perspective::Mirrored => &MIRRORED_TABLE,
    }
}

/// Flip both squares of `mv` across the horizontal axis
pub fn mirror_move(mv: ChessMove) -> ChessMove {
    ChessMove::new(
        mirror_square(mv.get_source()),
        mirror_square(mv.get_dest()),
        mv.get_promotion(),
    )
}

fn mirror_square(sq: Square) -> Square {
    Square::make_square(Rank::from_index(7 - sq.get_rank().to_index()), sq.get_file())
}

fn strip_queen_promotion(mv: ChessMove) -> ChessMove {
    match mv.get_promotion() {
        Some(Piece::Queen) => ChessMove::new(mv.get_source(), mv.get_dest(), None),
        _ => mv,
    }
}

fn square_at(rank: i32, file: i32) -> Option<Square> {
    if (0..8).contains(&rank) && (0..8).contains(&file) {
        Some(Square::make_square(
            Rank::from_index(rank as usize),
            File::from_index(file as usize),
        ))
    } else {
        None
    }
}

fn canonical_moves() -> Vec<ChessMove> {
    let mut moves = Vec::with_capacity(NB_LABELS);

    for rank in 0..8 {
        for file in 0..8 {
            let from = Square::make_square(
                Rank::from_index(rank as usize),
                File::from_index(file as usize),
            );

            for (dr, df) in QUEEN_DIRECTIONS {
                for dist in 1..8 {
                    match square_at(rank + dr * dist, file + df * dist) {
                        Some(to) => moves.push(ChessMove::new(from, to, None)),
                        None => break,
                    }
                }
            }

            for (dr, df) in KNIGHT_JUMPS {
                if let Some(to) = square_at(rank + dr, file + df) {
                    moves.push(ChessMove::new(from, to, None));
                }
            }

            if rank == 6 {
                for df in -1..=1 {
                    if let Some(to) = square_at(7, file + df) {
                        for piece in UNDER_PROMOTIONS {
                            moves.push(ChessMove::new(from, to, Some(piece)));
                        }
                    }
                }
            }
        }
    }

    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    fn mv(s: &str) -> ChessMove {
        let src = Square::from_str(&s[0..2]).unwrap();
        let dst = Square::from_str(&s[2..4]).unwrap();
        let promotion = match s.as_bytes().get(4) {
            Some(b'q') => Some(Piece::Queen),
            Some(b'r') => Some(Piece::Rook),
            Some(b'b') => Some(Piece::Bishop),
            Some(b'n') => Some(Piece::Knight),
            _ => None,
        };
        ChessMove::new(src, dst, promotion)
    }

    #[test]
    fn test_table_sizes() {
        for perspective in [Perspective::Forward, Perspective::Mirrored] {
            let table = label_table(perspective);
            assert_eq!(table.len(), NB_LABELS);
            assert_eq!(table.index.len(), NB_LABELS);
        }
    }

    #[test]
    fn test_every_label_reachable() {
        for perspective in [Perspective::Forward, Perspective::Mirrored] {
            let table = label_table(perspective);
            let labels: HashSet<usize> = (0..NB_LABELS)
                .map(|label| table.index_of(table.move_at(label).unwrap()).unwrap())
                .collect();
            assert_eq!(labels.len(), NB_LABELS);
        }
    }

    #[test]
    fn test_mirrored_move_shares_label() {
        let forward = label_table(Perspective::Forward);
        let mirrored = label_table(Perspective::Mirrored);

        let white = mv("e2e4");
        let black = mv("e7e5");
        assert_eq!(mirror_move(black), white);
        assert_eq!(forward.index_of(white), mirrored.index_of(black));
    }

    #[test]
    fn test_queen_promotion_uses_plain_label() {
        let forward = label_table(Perspective::Forward);
        assert_eq!(forward.index_of(mv("a7a8q")), forward.index_of(mv("a7a8")));

        let knight = forward.index_of(mv("a7a8n")).unwrap();
        let bishop = forward.index_of(mv("a7a8b")).unwrap();
        let rook = forward.index_of(mv("a7a8r")).unwrap();
        let plain = forward.index_of(mv("a7a8")).unwrap();
        let distinct: HashSet<usize> = [knight, bishop, rook, plain].into_iter().collect();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn test_black_under_promotion() {
        let mirrored = label_table(Perspective::Mirrored);
        let forward = label_table(Perspective::Forward);
        assert_eq!(mirrored.index_of(mv("b2a1n")), forward.index_of(mv("b7a8n")));
        // A forward-only under-promotion is outside the mirrored table
        assert_eq!(mirrored.index_of(mv("b7a8n")), None);
    }

    #[test]
    fn test_impossible_move_has_no_label() {
        let forward = label_table(Perspective::Forward);
        assert_eq!(forward.index_of(mv("a1b4")), None);
        assert_eq!(forward.index_of(mv("e2e4n")), None);
    }

    #[test]
    fn test_label_order_is_stable() {
        let forward = label_table(Perspective::Forward);
        assert_eq!(forward.move_at(0), Some(mv("a1a2")));
        assert_eq!(forward.move_at(42), Some(mv("b1a1")));
        assert_eq!(forward.move_at(NB_LABELS), None);

        let mirrored = label_table(Perspective::Mirrored);
        assert_eq!(mirrored.move_at(0), Some(mv("a8a7")));
    }
}
