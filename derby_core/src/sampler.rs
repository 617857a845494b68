//! Duplicate-free sampling driven by a [`RandomSource`].

use crate::error::RaceError;
use crate::rng::RandomSource;

/// Draws `count` distinct items from `items`.
///
/// Runs a Fisher–Yates shuffle over a private copy (last index down to 1,
/// swapping with `floor(rng() * (i + 1))`) and keeps the first `count`
/// elements. The whole pool is shuffled regardless of `count`, so the number
/// of draws depends only on `items.len()`. `items` is never modified.
///
/// # Errors
/// - `RaceError::InvalidArgument` - `count` exceeds `items.len()`
pub fn pick_unique<T, R>(items: &[T], count: usize, rng: &mut R) -> Result<Vec<T>, RaceError>
where
    T: Clone,
    R: RandomSource + ?Sized,
{
    if count > items.len() {
        return Err(RaceError::InvalidArgument {
            count,
            available: items.len(),
        });
    }

    let mut pool = items.to_vec();
    for i in (1..pool.len()).rev() {
        // min() guards against a source that returns exactly 1.0
        let j = ((rng.next_f64() * (i + 1) as f64).floor() as usize).min(i);
        pool.swap(i, j);
    }

    pool.truncate(count);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{from_fn, Mulberry32};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn ids() -> Vec<u32> {
        (1..=20).collect()
    }

    #[test]
    fn test_fails_when_count_exceeds_items() {
        let mut rng = Mulberry32::new(1);
        let err = pick_unique(&[1, 2, 3], 4, &mut rng).unwrap_err();

        assert_eq!(err, RaceError::InvalidArgument { count: 4, available: 3 });
    }

    #[test]
    fn test_returns_exactly_count_unique_members() {
        let items = ids();
        let mut rng = Mulberry32::new(2);

        let picked = pick_unique(&items, 10, &mut rng).unwrap();

        assert_eq!(picked.len(), 10);
        assert_eq!(picked.iter().collect::<HashSet<_>>().len(), 10);
        assert!(picked.iter().all(|x| items.contains(x)));
    }

    #[test]
    fn test_does_not_mutate_source() {
        let items = ids();
        let copy = items.clone();
        let mut rng = Mulberry32::new(4);

        pick_unique(&items, 10, &mut rng).unwrap();
        assert_eq!(items, copy);
    }

    #[test]
    fn test_same_seed_same_pick() {
        let items = ids();

        let a = pick_unique(&items, 10, &mut Mulberry32::new(42)).unwrap();
        let b = pick_unique(&items, 10, &mut Mulberry32::new(42)).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_count_still_shuffles_whole_pool() {
        let mut draws = 0;
        let mut rng = from_fn(|| {
            draws += 1;
            0.0
        });

        let picked = pick_unique(&[1, 2, 3], 0, &mut rng).unwrap();
        drop(rng);

        assert!(picked.is_empty());
        assert_eq!(draws, 2);
    }

    #[test]
    fn test_zero_draws_rotate_deterministically() {
        // j = 0 every step: each element in turn swaps with the head
        let mut rng = from_fn(|| 0.0);
        let picked = pick_unique(&[1, 2, 3, 4], 4, &mut rng).unwrap();

        assert_eq!(picked, vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_empty_items() {
        let mut rng = Mulberry32::new(1);
        let picked: Vec<u32> = pick_unique(&[], 0, &mut rng).unwrap();
        assert!(picked.is_empty());
    }

    proptest! {
        #[test]
        fn prop_pick_is_a_duplicate_free_subset(
            seed in any::<u32>(),
            len in 0usize..40,
            count_frac in 0.0f64..=1.0,
        ) {
            let items: Vec<usize> = (0..len).collect();
            let count = ((len as f64) * count_frac).floor() as usize;
            let mut rng = Mulberry32::new(seed);

            let picked = pick_unique(&items, count, &mut rng).unwrap();

            prop_assert_eq!(picked.len(), count);
            let unique: HashSet<_> = picked.iter().collect();
            prop_assert_eq!(unique.len(), count);
            prop_assert!(picked.iter().all(|x| *x < len));
        }

        #[test]
        fn prop_oversized_count_is_rejected(len in 0usize..20, extra in 1usize..5) {
            let items: Vec<usize> = (0..len).collect();
            let mut rng = Mulberry32::new(0);

            let result = pick_unique(&items, len + extra, &mut rng);
            prop_assert_eq!(result, Err(RaceError::InvalidArgument { count: len + extra, available: len }));
        }
    }
}
