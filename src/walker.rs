use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;

use crate::config::SamplerConfig;
use crate::errors::SamplerError;
use crate::taxonomy::Taxonomy;
use crate::types::Topic;

/// Biased random descent through the taxonomy.
///
/// Each step picks a uniformly random child and, with probability
/// `depth_prob`, keeps descending from it. Depth is capped at
/// `max_depth` and topics already on the current path are never chosen
/// again, so symbolic cross-links cannot loop.
pub struct CategoryWalker<'a> {
    taxonomy: &'a Taxonomy,
    depth_prob: f64,
    max_depth: usize,
}

impl<'a> CategoryWalker<'a> {
    /// Create a walker with an explicit continue probability and depth cap.
    pub fn new(taxonomy: &'a Taxonomy, depth_prob: f64, max_depth: usize) -> Self {
        Self {
            taxonomy,
            depth_prob,
            max_depth,
        }
    }

    /// Create a walker using `depth_prob` and `max_descent_depth` from `config`.
    pub fn from_config(taxonomy: &'a Taxonomy, config: &SamplerConfig) -> Self {
        Self::new(taxonomy, config.depth_prob, config.max_descent_depth)
    }

    /// Taxonomy this walker descends through.
    pub fn taxonomy(&self) -> &'a Taxonomy {
        self.taxonomy
    }

    /// Pick a topic strictly below `topic`, or `None` when it has no subtopics.
    pub fn choose_subtopic<R: Rng + ?Sized>(
        &self,
        topic: &str,
        rng: &mut R,
    ) -> Result<Option<Topic>, SamplerError> {
        let mut path = HashSet::from([topic.to_string()]);
        self.descend(topic, 0, &mut path, rng)
    }

    /// Return `topic` itself or, with probability `depth_prob`, something beneath it.
    pub fn choose_category<R: Rng + ?Sized>(
        &self,
        topic: &str,
        rng: &mut R,
    ) -> Result<Topic, SamplerError> {
        if self.continues(rng) {
            if let Some(chosen) = self.choose_subtopic(topic, rng)? {
                return Ok(chosen);
            }
        }
        Ok(topic.to_string())
    }

    fn descend<R: Rng + ?Sized>(
        &self,
        topic: &str,
        depth: usize,
        path: &mut HashSet<Topic>,
        rng: &mut R,
    ) -> Result<Option<Topic>, SamplerError> {
        let children = self.taxonomy.subtopics(topic)?;
        let candidates: Vec<&Topic> = children
            .iter()
            .filter(|child| !path.contains(child.as_str()))
            .collect();
        let Some(chosen) = candidates.choose(rng).map(|child| (*child).clone()) else {
            return Ok(None);
        };
        if depth + 1 < self.max_depth && self.continues(rng) {
            path.insert(chosen.clone());
            let deeper = self.descend(&chosen, depth + 1, path, rng)?;
            path.remove(&chosen);
            if let Some(deeper) = deeper {
                return Ok(Some(deeper));
            }
        }
        Ok(Some(chosen))
    }

    fn continues<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.random::<f64>() < self.depth_prob
    }
}
