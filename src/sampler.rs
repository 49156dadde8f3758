use chrono::Utc;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::checkpoint::{Checkpoint, CheckpointStore, PersistedSide};
use crate::config::{LinkStrategy, SamplerConfig};
use crate::constants::sampler::{SIDE_NEGATIVE, SIDE_POSITIVE};
use crate::errors::SamplerError;
use crate::metrics::pool_summary;
use crate::pairs::{Pair, extend_pairs};
use crate::pool::{PoolBuilder, TopicPool};
use crate::rng::DeterministicRng;
use crate::taxonomy::{Taxonomy, TaxonomySource};
use crate::walker::CategoryWalker;

/// Converged output of a sampling run, handed to the document pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusPlan {
    /// Usable topics under the positive root.
    pub positive: TopicPool,
    /// Usable topics under the negative root.
    pub negative: TopicPool,
    /// Distinct (positive, negative) pairs in sampling order.
    pub pairs: Vec<Pair>,
    /// Convergence rounds spent, including rounds restored from a checkpoint.
    pub rounds: u64,
}

/// Mutable state of one run, mirrored by `Checkpoint`.
struct RunState {
    positive: PoolBuilder,
    negative: PoolBuilder,
    rounds: u64,
    rng: DeterministicRng,
    pairs: IndexSet<Pair>,
}

/// Drives both pool builders and the pair sampler until the quota is met.
///
/// Each round grows every unsatisfied side by net new candidates, resolves
/// and filters them, and checkpoints. Rounds are capped by `max_rounds`.
pub struct TopicPairSampler {
    config: SamplerConfig,
    taxonomy: Taxonomy,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl TopicPairSampler {
    /// Validate `config` and wrap `source` in a fresh memoizing accessor.
    pub fn new(
        config: SamplerConfig,
        source: Arc<dyn TaxonomySource>,
    ) -> Result<Self, SamplerError> {
        config.validate()?;
        let taxonomy = Taxonomy::from_config(source, &config);
        Ok(Self {
            config,
            taxonomy,
            checkpoints: None,
        })
    }

    /// Save progress to (and resume from) `store`.
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Memoizing taxonomy accessor owned by this sampler.
    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Run the convergence loop and pair sampling to completion.
    ///
    /// Pools restored from a checkpoint with more than `pool_size` topics are
    /// cut back to their first `pool_size` topics before pairs are drawn.
    pub fn run(&self) -> Result<CorpusPlan, SamplerError> {
        let mut state = self.restore_or_start()?;
        let walker = CategoryWalker::from_config(&self.taxonomy, &self.config);
        let target = self.config.pool_size;
        let min_links = self.config.min_links();
        // BFS collection is deterministic, so a rejected topic would be rejected again.
        let skip_rejected = self.config.strategy == LinkStrategy::Bfs;
        state.positive.apply_filter(min_links);
        state.negative.apply_filter(min_links);

        let mut rounds_this_run = 0usize;
        while !(state.positive.is_satisfied(target) && state.negative.is_satisfied(target)) {
            if rounds_this_run >= self.config.max_rounds {
                let available = state.positive.pool().len().min(state.negative.pool().len());
                return Err(SamplerError::QuotaUnreachable {
                    requested: target,
                    available,
                    details: format!(
                        "pools still short after {} rounds (positive {}, negative {})",
                        rounds_this_run,
                        state.positive.pool().len(),
                        state.negative.pool().len()
                    ),
                });
            }
            rounds_this_run += 1;
            let round = state.rounds;
            state.rounds += 1;
            for builder in [&mut state.positive, &mut state.negative] {
                if builder.is_satisfied(target) {
                    continue;
                }
                let missing = target - builder.pool().len();
                let max_draws = missing.saturating_mul(self.config.draw_attempts_factor);
                builder.grow_candidates(&walker, target, max_draws, skip_rejected, &mut state.rng)?;
                let outcome = builder.resolve_pending(&walker, &self.config, round)?;
                info!(
                    side = builder.side(),
                    round,
                    drawn = outcome.drawn,
                    accepted = outcome.accepted,
                    rejected = outcome.rejected,
                    pooled = builder.pool().len(),
                    target,
                    "convergence round complete"
                );
            }
            self.save(&state)?;
        }

        for builder in [&mut state.positive, &mut state.negative] {
            let surplus = builder.truncate_pool(target);
            if surplus > 0 {
                info!(
                    side = builder.side(),
                    surplus,
                    target,
                    "restored pool larger than requested, trimmed"
                );
            }
        }

        for builder in [&state.positive, &state.negative] {
            if let Some(summary) = pool_summary(builder.pool()) {
                info!(
                    side = builder.side(),
                    topics = summary.topics,
                    min_links = summary.min_links,
                    max_links = summary.max_links,
                    mean_links = summary.mean_links,
                    "pool converged"
                );
            }
        }

        let pairs = extend_pairs(
            std::mem::take(&mut state.pairs),
            &state.positive.pool().topics(),
            &state.negative.pool().topics(),
            self.config.pair_count,
            &mut state.rng,
        )?;
        state.pairs = pairs;
        self.save(&state)?;
        debug!(
            structure_cache = ?self.taxonomy.structure_cache_stats(),
            link_cache = ?self.taxonomy.link_cache_stats(),
            "taxonomy cache usage"
        );

        Ok(CorpusPlan {
            positive: state.positive.pool().clone(),
            negative: state.negative.pool().clone(),
            pairs: state.pairs.into_iter().collect(),
            rounds: state.rounds,
        })
    }

    fn restore_or_start(&self) -> Result<RunState, SamplerError> {
        let persisted = match self.checkpoints.as_ref() {
            Some(store) => store.load_checkpoint()?,
            None => None,
        };
        let Some(checkpoint) = persisted else {
            return Ok(RunState {
                positive: PoolBuilder::new(SIDE_POSITIVE, self.config.positive_root.clone()),
                negative: PoolBuilder::new(SIDE_NEGATIVE, self.config.negative_root.clone()),
                rounds: 0,
                rng: DeterministicRng::new(self.config.seed),
                pairs: IndexSet::new(),
            });
        };
        let expected = self.config.fingerprint();
        if checkpoint.config_fingerprint != expected {
            return Err(SamplerError::Checkpoint(format!(
                "checkpoint was written for a different configuration (expected fingerprint {expected}, found {})",
                checkpoint.config_fingerprint
            )));
        }
        info!(
            rounds = checkpoint.rounds,
            positive = checkpoint.positive.entries.len(),
            negative = checkpoint.negative.entries.len(),
            pairs = checkpoint.pairs.len(),
            "resuming from checkpoint"
        );
        let pairs = checkpoint.pairs().collect();
        Ok(RunState {
            positive: checkpoint.positive.into_builder(SIDE_POSITIVE),
            negative: checkpoint.negative.into_builder(SIDE_NEGATIVE),
            rounds: checkpoint.rounds,
            rng: DeterministicRng::from_state(checkpoint.rng_state),
            pairs,
        })
    }

    fn save(&self, state: &RunState) -> Result<(), SamplerError> {
        let Some(store) = self.checkpoints.as_ref() else {
            return Ok(());
        };
        let checkpoint = Checkpoint {
            config_fingerprint: self.config.fingerprint(),
            rounds: state.rounds,
            rng_state: state.rng.state(),
            positive: PersistedSide::capture(&state.positive),
            negative: PersistedSide::capture(&state.negative),
            pairs: state
                .pairs
                .iter()
                .map(|pair| (pair.positive.clone(), pair.negative.clone()))
                .collect(),
            saved_at: Utc::now().timestamp(),
        };
        store.store_checkpoint(&checkpoint)?;
        debug!(rounds = state.rounds, "checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::taxonomy::InMemoryTaxonomy;

    fn two_root_taxonomy() -> InMemoryTaxonomy {
        let mut taxonomy = InMemoryTaxonomy::new();
        for root in ["P", "N"] {
            let children: Vec<String> = (0..4).map(|idx| format!("{root}/{idx}")).collect();
            taxonomy = taxonomy.with_topic(root, format!("{root}-id"));
            taxonomy = taxonomy.with_children(root, children.clone());
            for (idx, child) in children.iter().enumerate() {
                taxonomy = taxonomy
                    .with_topic(child.clone(), format!("{root}{idx}"))
                    .with_links(
                        child.clone(),
                        (0..3).map(|n| format!("http://{child}/{n}")),
                    );
            }
        }
        taxonomy
    }

    fn small_config() -> SamplerConfig {
        SamplerConfig {
            positive_root: "P".into(),
            negative_root: "N".into(),
            depth_prob: 0.3,
            pool_size: 3,
            pair_count: 5,
            links_per_topic: 2,
            min_link_proportion: 1.0,
            seed: 17,
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn run_fills_pools_and_pairs() {
        let sampler = TopicPairSampler::new(small_config(), Arc::new(two_root_taxonomy())).unwrap();
        let plan = sampler.run().unwrap();
        assert_eq!(plan.positive.len(), 3);
        assert_eq!(plan.negative.len(), 3);
        assert_eq!(plan.pairs.len(), 5);
        for pair in &plan.pairs {
            assert!(plan.positive.contains(&pair.positive));
            assert!(plan.negative.contains(&pair.negative));
        }
        for (_, entry) in plan.positive.iter().chain(plan.negative.iter()) {
            assert_eq!(entry.links.len(), 2);
            assert!(!entry.stable_id.is_empty());
        }
    }

    #[test]
    fn same_seed_same_plan() {
        let run = || {
            TopicPairSampler::new(small_config(), Arc::new(two_root_taxonomy()))
                .unwrap()
                .run()
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn checkpoint_from_other_config_is_rejected() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        TopicPairSampler::new(small_config(), Arc::new(two_root_taxonomy()))
            .unwrap()
            .with_checkpoint_store(store.clone())
            .run()
            .unwrap();
        let other = SamplerConfig {
            seed: 18,
            ..small_config()
        };
        let result = TopicPairSampler::new(other, Arc::new(two_root_taxonomy()))
            .unwrap()
            .with_checkpoint_store(store)
            .run();
        assert!(matches!(result, Err(SamplerError::Checkpoint(msg)) if msg.contains("fingerprint")));
    }

    #[test]
    fn smaller_pool_size_on_resume_trims_restored_pools() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let larger = SamplerConfig {
            pool_size: 4,
            ..small_config()
        };
        let first = TopicPairSampler::new(larger, Arc::new(two_root_taxonomy()))
            .unwrap()
            .with_checkpoint_store(store.clone())
            .run()
            .unwrap();
        assert_eq!(first.positive.len(), 4);

        let resumed = TopicPairSampler::new(small_config(), Arc::new(two_root_taxonomy()))
            .unwrap()
            .with_checkpoint_store(store)
            .run()
            .unwrap();
        assert_eq!(resumed.positive.topics(), first.positive.topics()[..3]);
        assert_eq!(resumed.negative.topics(), first.negative.topics()[..3]);
        assert_eq!(resumed.pairs.len(), 5);
        for pair in &resumed.pairs {
            assert!(resumed.positive.contains(&pair.positive));
            assert!(resumed.negative.contains(&pair.negative));
        }
    }

    #[test]
    fn exhausted_subtree_hits_round_ceiling() {
        let config = SamplerConfig {
            pool_size: 5,
            pair_count: 5,
            max_rounds: 3,
            ..small_config()
        };
        let result = TopicPairSampler::new(config, Arc::new(two_root_taxonomy()))
            .unwrap()
            .run();
        assert!(matches!(
            result,
            Err(SamplerError::QuotaUnreachable { requested: 5, available: 4, .. })
        ));
    }
}
