use serde::{Deserialize, Serialize};
use std::hash::Hash;

use crate::constants::config::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_DEPTH_PROB, DEFAULT_DRAW_ATTEMPTS_FACTOR,
    DEFAULT_LINKS_PER_TOPIC, DEFAULT_MAX_DESCENT_DEPTH, DEFAULT_MAX_ROUNDS,
    DEFAULT_MIN_LINK_PROPORTION, DEFAULT_NEGATIVE_ROOT, DEFAULT_PAIR_COUNT, DEFAULT_POOL_SIZE,
    DEFAULT_POSITIVE_ROOT, DEFAULT_RANDOM_ATTEMPTS_FACTOR, DEFAULT_SEED,
};
use crate::constants::taxonomy::{RELATION_NARROW, RELATION_SYMBOLIC};
use crate::errors::SamplerError;
use crate::hash::stable_hash_with;
use crate::types::{HashPart, RelationTag, Topic};

/// Strategy used to gather links for a candidate topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkStrategy {
    /// Deterministic level-by-level expansion of the topic subtree.
    Bfs,
    /// Repeated random descents, one sampled link per landing topic.
    Randomized,
}

impl LinkStrategy {
    /// Short label used in logs and fingerprints.
    pub fn label(self) -> &'static str {
        match self {
            LinkStrategy::Bfs => "bfs",
            LinkStrategy::Randomized => "randomized",
        }
    }
}

/// Relation tags recognized when reading subtopics from the structure dump.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTags {
    /// Tags whose targets are returned as subtopics.
    pub subtopic_tags: Vec<RelationTag>,
    /// Subset of tags whose targets carry an alias-namespace prefix to strip.
    pub alias_tags: Vec<RelationTag>,
}

impl Default for RelationTags {
    fn default() -> Self {
        Self {
            subtopic_tags: vec![RELATION_NARROW.to_string(), RELATION_SYMBOLIC.to_string()],
            alias_tags: vec![RELATION_SYMBOLIC.to_string()],
        }
    }
}

/// Top-level sampler configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Category root of the topics used for positive documents.
    pub positive_root: Topic,
    /// Category root of the topics used for negative documents.
    pub negative_root: Topic,
    /// Probability of descending one more level during a random walk.
    pub depth_prob: f64,
    /// Number of usable topics required on each side.
    pub pool_size: usize,
    /// Number of distinct (positive, negative) pairs requested.
    pub pair_count: usize,
    /// Target links (documents) per topic.
    pub links_per_topic: usize,
    /// Minimum share of `links_per_topic` a topic must reach to stay pooled.
    pub min_link_proportion: f64,
    /// Link collection strategy.
    pub strategy: LinkStrategy,
    /// Relation tags recognized as subtopic edges.
    pub relation_tags: RelationTags,
    /// RNG seed that controls the whole sampling run.
    pub seed: u64,
    /// Max entries retained by each taxonomy cache.
    pub cache_capacity: usize,
    /// Max recursion depth of a single random descent.
    pub max_descent_depth: usize,
    /// Randomized collector attempts per requested link.
    pub random_attempts_factor: usize,
    /// Candidate draws allowed per missing pool slot within a round.
    pub draw_attempts_factor: usize,
    /// Hard ceiling on convergence rounds before failing with `QuotaUnreachable`.
    pub max_rounds: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            positive_root: DEFAULT_POSITIVE_ROOT.to_string(),
            negative_root: DEFAULT_NEGATIVE_ROOT.to_string(),
            depth_prob: DEFAULT_DEPTH_PROB,
            pool_size: DEFAULT_POOL_SIZE,
            pair_count: DEFAULT_PAIR_COUNT,
            links_per_topic: DEFAULT_LINKS_PER_TOPIC,
            min_link_proportion: DEFAULT_MIN_LINK_PROPORTION,
            strategy: LinkStrategy::Bfs,
            relation_tags: RelationTags::default(),
            seed: DEFAULT_SEED,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_descent_depth: DEFAULT_MAX_DESCENT_DEPTH,
            random_attempts_factor: DEFAULT_RANDOM_ATTEMPTS_FACTOR,
            draw_attempts_factor: DEFAULT_DRAW_ATTEMPTS_FACTOR,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl SamplerConfig {
    /// Reject configurations that cannot produce a valid run.
    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.positive_root.trim().is_empty() || self.negative_root.trim().is_empty() {
            return Err(SamplerError::Configuration(
                "category roots must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.depth_prob) {
            return Err(SamplerError::Configuration(format!(
                "depth_prob must lie in [0, 1], got {}",
                self.depth_prob
            )));
        }
        if !(0.0..=1.0).contains(&self.min_link_proportion) {
            return Err(SamplerError::Configuration(format!(
                "min_link_proportion must lie in [0, 1], got {}",
                self.min_link_proportion
            )));
        }
        if self.pool_size == 0 {
            return Err(SamplerError::Configuration(
                "pool_size must be greater than zero".to_string(),
            ));
        }
        if self.links_per_topic == 0 {
            return Err(SamplerError::Configuration(
                "links_per_topic must be greater than zero".to_string(),
            ));
        }
        if self.max_rounds == 0 || self.draw_attempts_factor == 0 {
            return Err(SamplerError::Configuration(
                "max_rounds and draw_attempts_factor must be greater than zero".to_string(),
            ));
        }
        let combinations = self.pool_size.saturating_mul(self.pool_size);
        if self.pair_count > combinations {
            return Err(SamplerError::Configuration(format!(
                "pair_count {} exceeds the {} combinations of two pools of size {}",
                self.pair_count, combinations, self.pool_size
            )));
        }
        if self.relation_tags.subtopic_tags.is_empty() {
            return Err(SamplerError::Configuration(
                "at least one subtopic relation tag is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum number of links a pooled topic must hold.
    pub fn min_links(&self) -> usize {
        (self.min_link_proportion * self.links_per_topic as f64).floor() as usize
    }

    /// Attempt budget handed to the randomized link collector.
    pub fn random_attempts(&self) -> usize {
        self.links_per_topic
            .saturating_mul(self.random_attempts_factor)
    }

    /// Fingerprint of the settings a checkpoint must agree with to be resumable.
    pub fn fingerprint(&self) -> u64 {
        let parts: Vec<HashPart> = vec![
            self.positive_root.clone(),
            self.negative_root.clone(),
            self.strategy.label().to_string(),
            self.links_per_topic.to_string(),
            self.relation_tags.subtopic_tags.join(","),
            self.relation_tags.alias_tags.join(","),
        ];
        stable_hash_with(|hasher| {
            self.seed.hash(hasher);
            parts.join("|").hash(hasher);
        })
    }
}
