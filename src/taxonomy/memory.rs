use indexmap::IndexMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Relation, StructureNode, TaxonomySource};
use crate::errors::SamplerError;
use crate::types::{Link, StableId, Topic};

#[derive(Clone, Debug, Default)]
struct TopicNode {
    stable_id: Option<StableId>,
    relations: Vec<Relation>,
    links: Vec<Link>,
}

/// Taxonomy held entirely in memory, built with chained `with_*` calls.
///
/// Counts every lookup as one scan so tests can assert how often the
/// backing store was traversed.
#[derive(Debug, Default)]
pub struct InMemoryTaxonomy {
    nodes: IndexMap<Topic, TopicNode>,
    scans: AtomicUsize,
}

impl InMemoryTaxonomy {
    /// Create an empty taxonomy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `topic` with its stable id.
    pub fn with_topic(mut self, topic: impl Into<Topic>, stable_id: impl Into<StableId>) -> Self {
        self.nodes.entry(topic.into()).or_default().stable_id = Some(stable_id.into());
        self
    }

    /// Add a child edge `topic -[tag]-> target`.
    pub fn with_relation(
        mut self,
        topic: impl Into<Topic>,
        tag: &str,
        target: impl Into<Topic>,
    ) -> Self {
        self.nodes
            .entry(topic.into())
            .or_default()
            .relations
            .push(Relation::new(tag, target));
        self
    }

    /// Add `narrow` edges from `topic` to each of `children`.
    pub fn with_children<I, S>(mut self, topic: &str, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        for child in children {
            self = self.with_relation(topic, crate::constants::taxonomy::RELATION_NARROW, child);
        }
        self
    }

    /// Attach `links` to `topic`.
    pub fn with_links<I, S>(mut self, topic: impl Into<Topic>, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Link>,
    {
        self.nodes
            .entry(topic.into())
            .or_default()
            .links
            .extend(links.into_iter().map(Into::into));
        self
    }

    /// Number of lookups served so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    fn node(&self, topic: &str) -> Option<&TopicNode> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.nodes.get(topic)
    }
}

impl TaxonomySource for InMemoryTaxonomy {
    fn structure(&self, topic: &str) -> Result<Option<StructureNode>, SamplerError> {
        Ok(self.node(topic).map(|node| StructureNode {
            stable_id: node.stable_id.clone(),
            relations: node.relations.clone(),
        }))
    }

    fn links(&self, topic: &str) -> Result<Option<Vec<Link>>, SamplerError> {
        Ok(self.node(topic).map(|node| node.links.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_nodes_and_counts_scans() {
        let taxonomy = InMemoryTaxonomy::new()
            .with_topic("A", "10")
            .with_children("A", ["A/1", "A/2"])
            .with_links("A/1", ["l1"])
            .with_links("A/1", ["l2"]);
        assert_eq!(taxonomy.scan_count(), 0);
        let root = taxonomy.structure("A").unwrap().unwrap();
        assert_eq!(root.relations.len(), 2);
        assert_eq!(root.stable_id.as_deref(), Some("10"));
        assert_eq!(
            taxonomy.links("A/1").unwrap().unwrap(),
            vec!["l1".to_string(), "l2".to_string()]
        );
        assert_eq!(taxonomy.structure("A/1").unwrap().unwrap().stable_id, None);
        assert!(taxonomy.links("missing").unwrap().is_none());
        assert_eq!(taxonomy.scan_count(), 4);
    }
}
