use indexmap::{IndexMap, IndexSet};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collect::{AttemptBudget, choice_collect_links, collect_links_bfs};
use crate::config::{LinkStrategy, SamplerConfig};
use crate::errors::SamplerError;
use crate::hash::topic_round_seed;
use crate::rng::DeterministicRng;
use crate::types::{Link, StableId, Topic};
use crate::walker::CategoryWalker;

/// Stable id and collected links of one pooled topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    /// Catalog id used to name downstream artifacts.
    pub stable_id: StableId,
    /// Distinct links in collection order.
    pub links: IndexSet<Link>,
}

/// Insertion-ordered mapping of topic to (stable id, links).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicPool {
    entries: IndexMap<Topic, PoolEntry>,
}

impl TopicPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `topic` or union `links` into its existing entry.
    pub fn insert<I>(&mut self, topic: Topic, stable_id: StableId, links: I)
    where
        I: IntoIterator<Item = Link>,
    {
        let entry = self.entries.entry(topic).or_insert_with(|| PoolEntry {
            stable_id,
            links: IndexSet::new(),
        });
        entry.links.extend(links);
    }

    /// Drop every topic holding fewer than `min_links` links, returning the dropped topics.
    pub fn retain_min_links(&mut self, min_links: usize) -> Vec<Topic> {
        let mut dropped = Vec::new();
        self.entries.retain(|topic, entry| {
            let keep = entry.links.len() >= min_links;
            if !keep {
                dropped.push(topic.clone());
            }
            keep
        });
        dropped
    }

    /// Keep the first `len` topics in insertion order, returning the removed ones.
    pub fn truncate(&mut self, len: usize) -> Vec<Topic> {
        if self.entries.len() <= len {
            return Vec::new();
        }
        self.entries.drain(len..).map(|(topic, _)| topic).collect()
    }

    /// Entry for `topic`, if pooled.
    pub fn get(&self, topic: &str) -> Option<&PoolEntry> {
        self.entries.get(topic)
    }

    /// True when `topic` is pooled.
    pub fn contains(&self, topic: &str) -> bool {
        self.entries.contains_key(topic)
    }

    /// Pooled topics in insertion order.
    pub fn topics(&self) -> Vec<Topic> {
        self.entries.keys().cloned().collect()
    }

    /// Iterate `(topic, entry)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Topic, &PoolEntry)> {
        self.entries.iter()
    }

    /// Number of pooled topics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no topic is pooled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of resolving one round of pending candidates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Candidates drawn this round.
    pub drawn: usize,
    /// Topics that passed the link filter.
    pub accepted: usize,
    /// Topics dropped for holding too few links.
    pub rejected: usize,
}

/// Builds one side's topic pool under a fixed root.
#[derive(Clone, Debug)]
pub struct PoolBuilder {
    side: &'static str,
    root: Topic,
    pool: TopicPool,
    pending: IndexSet<Topic>,
    rejected: IndexSet<Topic>,
}

impl PoolBuilder {
    /// Start an empty builder for `side` rooted at `root`.
    pub fn new(side: &'static str, root: impl Into<Topic>) -> Self {
        Self {
            side,
            root: root.into(),
            pool: TopicPool::new(),
            pending: IndexSet::new(),
            rejected: IndexSet::new(),
        }
    }

    /// Resume from a previously accumulated pool and rejected set.
    pub fn restore(
        side: &'static str,
        root: impl Into<Topic>,
        pool: TopicPool,
        rejected: impl IntoIterator<Item = Topic>,
    ) -> Self {
        Self {
            side,
            root: root.into(),
            pool,
            pending: IndexSet::new(),
            rejected: rejected.into_iter().collect(),
        }
    }

    /// Side label (`positive` / `negative`).
    pub fn side(&self) -> &'static str {
        self.side
    }

    /// Root topic candidates are drawn beneath.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Topics accepted so far.
    pub fn pool(&self) -> &TopicPool {
        &self.pool
    }

    /// Topics dropped by the link filter so far.
    pub fn rejected(&self) -> &IndexSet<Topic> {
        &self.rejected
    }

    /// True once at least `target` topics are pooled.
    pub fn is_satisfied(&self, target: usize) -> bool {
        self.pool.len() >= target
    }

    /// Drop pooled topics beyond `target`, keeping the earliest accepted.
    pub fn truncate_pool(&mut self, target: usize) -> usize {
        let surplus = self.pool.truncate(target);
        for topic in &surplus {
            debug!(side = self.side, topic = %topic, target, "surplus topic dropped");
        }
        surplus.len()
    }

    /// Apply the minimum-link filter, moving dropped topics to the rejected set.
    pub fn apply_filter(&mut self, min_links: usize) -> usize {
        let dropped = self.pool.retain_min_links(min_links);
        let count = dropped.len();
        for topic in dropped {
            debug!(
                side = self.side,
                topic = %topic,
                min_links,
                "insufficient links, topic dropped"
            );
            self.rejected.insert(topic);
        }
        count
    }

    /// Draw new candidates below the root until pooled plus pending reaches `target`.
    ///
    /// At most `max_draws` walks are spent. Topics already pooled or pending
    /// are skipped, and so are rejected ones when `skip_rejected` is set.
    pub fn grow_candidates<R: Rng + ?Sized>(
        &mut self,
        walker: &CategoryWalker<'_>,
        target: usize,
        max_draws: usize,
        skip_rejected: bool,
        rng: &mut R,
    ) -> Result<usize, SamplerError> {
        let mut added = 0usize;
        let mut draws = 0usize;
        while self.pool.len() + self.pending.len() < target && draws < max_draws {
            draws += 1;
            let Some(topic) = walker.choose_subtopic(&self.root, rng)? else {
                return Err(SamplerError::QuotaUnreachable {
                    requested: target,
                    available: 0,
                    details: format!("{} root '{}' has no subtopics", self.side, self.root),
                });
            };
            if self.pool.contains(&topic)
                || self.pending.contains(&topic)
                || (skip_rejected && self.rejected.contains(&topic))
            {
                continue;
            }
            self.pending.insert(topic);
            added += 1;
        }
        if self.pool.len() + self.pending.len() < target {
            warn!(
                side = self.side,
                root = %self.root,
                draws,
                pooled = self.pool.len(),
                pending = self.pending.len(),
                target,
                "candidate growth stalled"
            );
        }
        Ok(added)
    }

    /// Resolve stable ids and links of all pending candidates, then filter.
    ///
    /// Link collection runs in parallel; randomized collection seeds a fresh
    /// RNG per (side, topic, round) so results do not depend on scheduling.
    pub fn resolve_pending(
        &mut self,
        walker: &CategoryWalker<'_>,
        config: &SamplerConfig,
        round: u64,
    ) -> Result<RoundOutcome, SamplerError> {
        let pending: Vec<Topic> = self.pending.drain(..).collect();
        let drawn = pending.len();
        let side = self.side;
        let resolved: Vec<(Topic, StableId, Vec<Link>)> = pending
            .into_par_iter()
            .map(|topic| {
                let stable_id = walker.taxonomy().stable_id(&topic)?;
                let links = match config.strategy {
                    LinkStrategy::Bfs => {
                        collect_links_bfs(walker.taxonomy(), &topic, config.links_per_topic)?
                    }
                    LinkStrategy::Randomized => {
                        let mut rng = DeterministicRng::new(topic_round_seed(
                            config.seed,
                            side,
                            &topic,
                            round,
                        ));
                        choice_collect_links(
                            walker,
                            &topic,
                            config.links_per_topic,
                            AttemptBudget::Limited(config.random_attempts()),
                            &mut rng,
                        )?
                        .into_iter()
                        .collect()
                    }
                };
                Ok((topic, stable_id, links))
            })
            .collect::<Result<_, SamplerError>>()?;
        for (topic, stable_id, links) in resolved {
            self.pool.insert(topic, stable_id, links);
        }
        let rejected = self.apply_filter(config.min_links());
        Ok(RoundOutcome {
            drawn,
            accepted: drawn.saturating_sub(rejected),
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationTags;
    use crate::taxonomy::{InMemoryTaxonomy, Taxonomy};
    use std::sync::Arc;

    fn pool_with(counts: &[(&str, usize)]) -> TopicPool {
        let mut pool = TopicPool::new();
        for (idx, (topic, count)) in counts.iter().enumerate() {
            pool.insert(
                topic.to_string(),
                idx.to_string(),
                (0..*count).map(|n| format!("http://{topic}/{n}")),
            );
        }
        pool
    }

    #[test]
    fn insert_unions_links_and_keeps_first_id() {
        let mut pool = TopicPool::new();
        pool.insert("T".into(), "1".into(), ["a".to_string(), "b".to_string()]);
        pool.insert("T".into(), "2".into(), ["b".to_string(), "c".to_string()]);
        let entry = pool.get("T").unwrap();
        assert_eq!(entry.stable_id, "1");
        assert_eq!(entry.links.len(), 3);
    }

    #[test]
    fn truncate_keeps_insertion_prefix() {
        let mut pool = pool_with(&[("a", 1), ("b", 1), ("c", 1)]);
        assert!(pool.truncate(5).is_empty());
        assert_eq!(pool.truncate(1), ["b", "c"]);
        assert_eq!(pool.topics(), ["a"]);
    }

    #[test]
    fn filter_is_idempotent() {
        let mut once = pool_with(&[("a", 3), ("b", 1), ("c", 2), ("d", 0)]);
        let dropped = once.retain_min_links(2);
        assert_eq!(dropped, ["b", "d"]);
        let mut twice = once.clone();
        assert!(twice.retain_min_links(2).is_empty());
        assert_eq!(once, twice);
        assert_eq!(once.topics(), ["a", "c"]);
    }

    #[test]
    fn resolve_pending_rejects_thin_topics() {
        let source = InMemoryTaxonomy::new()
            .with_children("A", ["A/1", "A/2"])
            .with_topic("A/1", "11")
            .with_topic("A/2", "12")
            .with_links("A/1", ["l1", "l2", "l3"])
            .with_links("A/2", ["m1"]);
        let taxonomy = Taxonomy::new(Arc::new(source), RelationTags::default(), 64);
        let walker = CategoryWalker::new(&taxonomy, 0.0, 8);
        let config = SamplerConfig {
            positive_root: "A".into(),
            links_per_topic: 2,
            min_link_proportion: 1.0,
            ..SamplerConfig::default()
        };
        let mut builder = PoolBuilder::new("positive", "A");
        let mut rng = DeterministicRng::new(1);
        let added = builder
            .grow_candidates(&walker, 2, 100, true, &mut rng)
            .unwrap();
        assert_eq!(added, 2);
        let outcome = builder.resolve_pending(&walker, &config, 0).unwrap();
        assert_eq!(outcome.drawn, 2);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(builder.pool().topics(), ["A/1"]);
        assert_eq!(builder.pool().get("A/1").unwrap().links.len(), 2);
        assert!(builder.rejected().contains("A/2"));

        let regrown = builder
            .grow_candidates(&walker, 2, 50, true, &mut rng)
            .unwrap();
        assert_eq!(regrown, 0);
    }

    #[test]
    fn missing_stable_id_is_fatal() {
        let source = InMemoryTaxonomy::new()
            .with_children("A", ["A/1"])
            .with_links("A/1", ["l1"]);
        let taxonomy = Taxonomy::new(Arc::new(source), RelationTags::default(), 64);
        let walker = CategoryWalker::new(&taxonomy, 0.0, 8);
        let config = SamplerConfig {
            links_per_topic: 1,
            ..SamplerConfig::default()
        };
        let mut builder = PoolBuilder::new("positive", "A");
        let mut rng = DeterministicRng::new(2);
        builder
            .grow_candidates(&walker, 1, 10, true, &mut rng)
            .unwrap();
        assert!(matches!(
            builder.resolve_pending(&walker, &config, 0),
            Err(SamplerError::TopicNotFound { topic, .. }) if topic == "A/1"
        ));
    }

    #[test]
    fn childless_root_is_unreachable() {
        let source = InMemoryTaxonomy::new().with_topic("A", "1");
        let taxonomy = Taxonomy::new(Arc::new(source), RelationTags::default(), 64);
        let walker = CategoryWalker::new(&taxonomy, 0.5, 8);
        let mut builder = PoolBuilder::new("negative", "A");
        let mut rng = DeterministicRng::new(3);
        assert!(matches!(
            builder.grow_candidates(&walker, 1, 10, true, &mut rng),
            Err(SamplerError::QuotaUnreachable { .. })
        ));
    }
}
