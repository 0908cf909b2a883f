use chess::ChessMove;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Select the move to play from root visit counts
///
/// - temperature ≈ 0: argmax (deterministic)
/// - temperature = 1: proportional to visits
/// - temperature > 1: more exploration (visits^(1/t))
///
/// Returns `None` only when `move_visits` is empty.
pub fn select_move<R: Rng + ?Sized>(
    move_visits: &[(ChessMove, u32)],
    temperature: f32,
    rng: &mut R,
) -> Option<ChessMove> {
    let argmax = || {
        move_visits
            .iter()
            .max_by_key(|(_, v)| v)
            .map(|(m, _)| *m)
    };

    if temperature < 0.01 {
        return argmax();
    }

    let inv_temp = 1.0f64 / temperature as f64;
    let weights: Vec<f64> = move_visits
        .iter()
        .map(|(_, v)| {
            let w = *v as f64;
            if w == 0.0 {
                0.0
            } else {
                w.powf(inv_temp)
            }
        })
        .collect();

    // Fails when every weight is zero
    match WeightedIndex::new(&weights) {
        Ok(dist) => Some(move_visits[dist.sample(rng)].0),
        Err(_) => argmax(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chesszero_core::Board;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn moves(n: usize) -> Vec<ChessMove> {
        Board::new().legal_moves().into_iter().take(n).collect()
    }

    #[test]
    fn test_select_move_argmax() {
        let m = moves(3);
        let move_visits = vec![(m[0], 10), (m[1], 20), (m[2], 5)];
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(select_move(&move_visits, 0.0, &mut rng), Some(m[1]));
    }

    #[test]
    fn test_select_move_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(select_move(&[], 1.0, &mut rng), None);
    }

    #[test]
    fn test_select_move_all_zero_falls_back() {
        let m = moves(2);
        let mut rng = StdRng::seed_from_u64(0);
        let picked = select_move(&[(m[0], 0), (m[1], 0)], 1.0, &mut rng);
        assert!(picked.is_some());
    }

    #[test]
    fn test_select_move_with_temperature_sampling() {
        let m = moves(3);
        let move_visits = vec![(m[0], 10), (m[1], 10), (m[2], 10)];
        let mut rng = StdRng::seed_from_u64(7);

        let mut picked = HashSet::new();
        for _ in 0..50 {
            picked.insert(select_move(&move_visits, 1.0, &mut rng).unwrap());
        }

        // With non-zero temperature and equal visits, sampling should pick multiple moves
        assert!(picked.len() > 1);
    }
}
