use indexmap::IndexSet;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use crate::constants::sampler::PAIR_EXHAUSTIVE_SHARE;
use crate::errors::SamplerError;
use crate::types::Topic;

/// One (positive topic, negative topic) dataset definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    /// Topic supplying positive documents.
    pub positive: Topic,
    /// Topic supplying negative documents.
    pub negative: Topic,
}

impl Pair {
    /// Build a pair from its two topics.
    pub fn new(positive: impl Into<Topic>, negative: impl Into<Topic>) -> Self {
        Self {
            positive: positive.into(),
            negative: negative.into(),
        }
    }
}

/// Draw `count` distinct pairs uniformly from the two key sets.
pub fn sample_pairs<R: Rng + ?Sized>(
    positive: &[Topic],
    negative: &[Topic],
    count: usize,
    rng: &mut R,
) -> Result<IndexSet<Pair>, SamplerError> {
    extend_pairs(IndexSet::new(), positive, negative, count, rng)
}

/// Top up `existing` to `count` distinct pairs drawn from the two key sets.
///
/// Fails with `QuotaUnreachable` before drawing anything when fewer than
/// `count` combinations exist. When the remaining draws would cover a large
/// share of the combination space, the untaken combinations are shuffled
/// instead of rejection-sampled so the call always terminates promptly.
pub fn extend_pairs<R: Rng + ?Sized>(
    mut existing: IndexSet<Pair>,
    positive: &[Topic],
    negative: &[Topic],
    count: usize,
    rng: &mut R,
) -> Result<IndexSet<Pair>, SamplerError> {
    let positive: IndexSet<&Topic> = positive.iter().collect();
    let negative: IndexSet<&Topic> = negative.iter().collect();
    let available = positive.len().saturating_mul(negative.len());
    if count > available {
        return Err(SamplerError::QuotaUnreachable {
            requested: count,
            available,
            details: format!(
                "{} positive x {} negative topics cannot form {count} distinct pairs",
                positive.len(),
                negative.len()
            ),
        });
    }
    existing.retain(|pair| {
        positive.contains(&pair.positive) && negative.contains(&pair.negative)
    });
    existing.truncate(count);
    let missing = count - existing.len();
    if missing == 0 {
        return Ok(existing);
    }
    if missing as f64 > PAIR_EXHAUSTIVE_SHARE * available as f64 {
        let mut untaken: Vec<Pair> = positive
            .iter()
            .flat_map(|pos| negative.iter().map(move |neg| Pair::new(*pos, *neg)))
            .filter(|pair| !existing.contains(pair))
            .collect();
        untaken.shuffle(rng);
        existing.extend(untaken.into_iter().take(missing));
        return Ok(existing);
    }
    let positive: Vec<&Topic> = positive.into_iter().collect();
    let negative: Vec<&Topic> = negative.into_iter().collect();
    while existing.len() < count {
        if let (Some(pos), Some(neg)) = (positive.choose(rng), negative.choose(rng)) {
            existing.insert(Pair::new(*pos, *neg));
        }
    }
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn topics(prefix: &str, n: usize) -> Vec<Topic> {
        (0..n).map(|idx| format!("{prefix}/{idx}")).collect()
    }

    #[test]
    fn pairs_are_distinct_and_exact() {
        let mut rng = StdRng::seed_from_u64(10);
        let pairs = sample_pairs(&topics("P", 5), &topics("N", 4), 7, &mut rng).unwrap();
        assert_eq!(pairs.len(), 7);
    }

    #[test]
    fn full_combination_space_is_reachable() {
        let mut rng = StdRng::seed_from_u64(10);
        let pairs = sample_pairs(&topics("P", 3), &topics("N", 3), 9, &mut rng).unwrap();
        assert_eq!(pairs.len(), 9);
    }

    #[test]
    fn over_quota_is_unreachable() {
        let mut rng = StdRng::seed_from_u64(10);
        let result = sample_pairs(&topics("P", 2), &topics("N", 3), 7, &mut rng);
        assert!(matches!(
            result,
            Err(SamplerError::QuotaUnreachable { requested: 7, available: 6, .. })
        ));
        let empty = sample_pairs(&[], &topics("N", 3), 1, &mut rng);
        assert!(matches!(empty, Err(SamplerError::QuotaUnreachable { .. })));
    }

    #[test]
    fn extend_keeps_valid_existing_pairs() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut existing = IndexSet::new();
        existing.insert(Pair::new("P/0", "N/0"));
        existing.insert(Pair::new("P/gone", "N/0"));
        let pairs = extend_pairs(existing, &topics("P", 4), &topics("N", 4), 3, &mut rng).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs.get_index(0), Some(&Pair::new("P/0", "N/0")));
        assert!(!pairs.contains(&Pair::new("P/gone", "N/0")));
    }

    #[test]
    fn same_seed_gives_same_pairs() {
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            sample_pairs(&topics("P", 10), &topics("N", 10), 12, &mut rng).unwrap()
        };
        assert_eq!(draw(5), draw(5));
    }
}
