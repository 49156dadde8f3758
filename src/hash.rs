use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub fn stable_hash_with(f: impl FnOnce(&mut DefaultHasher)) -> u64 {
    let mut hasher = DefaultHasher::new();
    f(&mut hasher);
    hasher.finish()
}

/// Seed for per-topic randomized work within one convergence round.
pub fn topic_round_seed(seed: u64, side: &str, topic: &str, round: u64) -> u64 {
    stable_hash_with(|hasher| {
        seed.hash(hasher);
        side.hash(hasher);
        topic.hash(hasher);
        round.hash(hasher);
    })
}
