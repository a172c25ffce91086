//! Weighted random selection.
//!
//! Each item owns a band `[cum - weight, cum)` on the line `[0, total)`.
//! A uniform draw `r` in `[0, total)` picks the item whose band contains it,
//! so an item is selected with probability exactly `weight / total`.
//! Zero-weight items own an empty band and are never selected.

use rand::Rng;
use thiserror::Error;

/// Anything carrying a selection weight.
pub trait Weighted {
    fn weight(&self) -> i64;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("no eligible items")]
    Empty,
    #[error("total weight is zero")]
    ZeroTotalWeight,
    #[error("item at position {0} has a negative weight")]
    NegativeWeight(usize),
    #[error("total weight overflows")]
    WeightOverflow,
    #[error("draw {draw} is outside [0, {total})")]
    DrawOutOfRange { draw: i64, total: i64 },
}

/// Sum of all weights, validating every entry.
pub fn total_weight<T: Weighted>(items: &[T]) -> Result<i64, SelectError> {
    if items.is_empty() {
        return Err(SelectError::Empty);
    }
    let mut total: i64 = 0;
    for (idx, item) in items.iter().enumerate() {
        let w = item.weight();
        if w < 0 {
            return Err(SelectError::NegativeWeight(idx));
        }
        total = total.checked_add(w).ok_or(SelectError::WeightOverflow)?;
    }
    if total <= 0 {
        return Err(SelectError::ZeroTotalWeight);
    }
    Ok(total)
}

/// Deterministic pick for a given draw `r`, which must lie in `[0, total)`.
pub fn pick_at<T: Weighted>(items: &[T], draw: i64) -> Result<&T, SelectError> {
    let total = total_weight(items)?;
    if !(0..total).contains(&draw) {
        return Err(SelectError::DrawOutOfRange { draw, total });
    }

    let mut cum: i64 = 0;
    for item in items {
        cum += item.weight();
        if draw < cum {
            return Ok(item);
        }
    }
    // cum == total > draw after the loop, so the walk always returns above
    Err(SelectError::DrawOutOfRange { draw, total })
}

/// Draws `r` uniformly from `[0, total)` and picks the matching item.
pub fn pick<'a, T: Weighted, R: Rng + ?Sized>(
    items: &'a [T],
    rng: &mut R,
) -> Result<&'a T, SelectError> {
    let total = total_weight(items)?;
    let draw = rng.gen_range(0..total);
    pick_at(items, draw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[derive(Debug, PartialEq)]
    struct Item(&'static str, i64);

    impl Weighted for Item {
        fn weight(&self) -> i64 {
            self.1
        }
    }

    #[test]
    fn test_band_boundaries_are_half_open() {
        let items = [Item("a", 1), Item("b", 9)];
        assert_eq!(pick_at(&items, 0).unwrap().0, "a");
        assert_eq!(pick_at(&items, 1).unwrap().0, "b");
        assert_eq!(pick_at(&items, 9).unwrap().0, "b");
        assert_eq!(
            pick_at(&items, 10),
            Err(SelectError::DrawOutOfRange { draw: 10, total: 10 })
        );
    }

    #[test]
    fn test_zero_weight_item_is_never_picked() {
        let items = [Item("a", 2), Item("zero", 0), Item("c", 3)];
        for draw in 0..5 {
            assert_ne!(pick_at(&items, draw).unwrap().0, "zero");
        }
        assert_eq!(pick_at(&items, 1).unwrap().0, "a");
        assert_eq!(pick_at(&items, 2).unwrap().0, "c");
    }

    #[test]
    fn test_equal_weights_follow_list_order() {
        let items = [Item("first", 5), Item("second", 5)];
        assert_eq!(pick_at(&items, 4).unwrap().0, "first");
        assert_eq!(pick_at(&items, 5).unwrap().0, "second");
    }

    #[test]
    fn test_failures() {
        let empty: [Item; 0] = [];
        assert_eq!(total_weight(&empty), Err(SelectError::Empty));
        assert_eq!(
            total_weight(&[Item("a", 0), Item("b", 0)]),
            Err(SelectError::ZeroTotalWeight)
        );
        assert_eq!(
            total_weight(&[Item("a", 3), Item("b", -1)]),
            Err(SelectError::NegativeWeight(1))
        );
        assert_eq!(
            total_weight(&[Item("a", i64::MAX), Item("b", 1)]),
            Err(SelectError::WeightOverflow)
        );
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let items = [Item("a", 1), Item("b", 2), Item("c", 3)];
        let mut r1 = StdRng::seed_from_u64(42);
        let mut r2 = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(
                pick(&items, &mut r1).unwrap().0,
                pick(&items, &mut r2).unwrap().0
            );
        }
    }

    #[test]
    fn test_one_to_nine_split_converges() {
        let items = [Item("a", 1), Item("b", 9)];
        let mut rng = StdRng::seed_from_u64(20250901);
        let draws = 10_000;
        let b_count = (0..draws)
            .filter(|_| pick(&items, &mut rng).unwrap().0 == "b")
            .count();
        let ratio = b_count as f64 / draws as f64;
        assert!((ratio - 0.9).abs() < 0.02, "b ratio was {ratio}");
    }

    #[test]
    fn test_distribution_matches_weights() {
        let items = [Item("a", 1), Item("b", 2), Item("c", 3), Item("d", 4)];
        let mut rng = StdRng::seed_from_u64(7);
        let draws = 100_000;
        let mut counts = [0usize; 4];
        for _ in 0..draws {
            let picked = pick(&items, &mut rng).unwrap();
            let idx = items.iter().position(|i| i == picked).unwrap();
            counts[idx] += 1;
        }
        for (idx, item) in items.iter().enumerate() {
            let expected = item.1 as f64 / 10.0;
            let observed = counts[idx] as f64 / draws as f64;
            assert!(
                (observed - expected).abs() < 0.01,
                "{}: expected {expected}, observed {observed}",
                item.0
            );
        }
    }
}
