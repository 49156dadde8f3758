use crate::pool::TopicPool;
use crate::types::Topic;

/// Aggregate link-count metrics for one topic pool.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolSummary {
    /// Pooled topics.
    pub topics: usize,
    /// Links summed over all topics.
    pub total_links: usize,
    /// Smallest per-topic link count.
    pub min_links: usize,
    /// Largest per-topic link count.
    pub max_links: usize,
    /// Mean per-topic link count.
    pub mean_links: f64,
    /// Topics ordered by link count, richest first.
    pub per_topic: Vec<TopicLinks>,
}

/// Link count of a single pooled topic.
#[derive(Clone, Debug, PartialEq)]
pub struct TopicLinks {
    /// Pooled topic.
    pub topic: Topic,
    /// Links collected for it.
    pub links: usize,
}

/// Compute link-count metrics for `pool`, or `None` when it is empty.
pub fn pool_summary(pool: &TopicPool) -> Option<PoolSummary> {
    if pool.is_empty() {
        return None;
    }
    let mut per_topic: Vec<TopicLinks> = pool
        .iter()
        .map(|(topic, entry)| TopicLinks {
            topic: topic.clone(),
            links: entry.links.len(),
        })
        .collect();
    per_topic.sort_by(|a, b| b.links.cmp(&a.links).then_with(|| a.topic.cmp(&b.topic)));
    let total_links: usize = per_topic.iter().map(|entry| entry.links).sum();
    let max_links = per_topic.first().map_or(0, |entry| entry.links);
    let min_links = per_topic.last().map_or(0, |entry| entry.links);
    let topics = per_topic.len();
    Some(PoolSummary {
        topics,
        total_links,
        min_links,
        max_links,
        mean_links: total_links as f64 / topics as f64,
        per_topic,
    })
}
