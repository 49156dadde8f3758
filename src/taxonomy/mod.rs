//! Taxonomy sources and the memoizing accessor over them.
//!
//! Ownership model:
//! - `TaxonomySource` answers raw per-topic questions by scanning some backing
//!   store (a DMOZ RDF dump, an in-memory fixture).
//! - `Taxonomy` owns the caches, applies relation-tag filtering and alias
//!   resolution, and is the only handle the walker, collectors, and pool
//!   builder use.

use indexmap::IndexSet;
use std::sync::Arc;

use crate::cache::{CacheStats, MemoCache};
use crate::config::{RelationTags, SamplerConfig};
use crate::constants::taxonomy::ALIAS_SEPARATOR;
use crate::errors::SamplerError;
use crate::types::{Link, RelationTag, StableId, Topic};

/// In-memory taxonomy fixture.
pub mod memory;
/// Streaming reader over DMOZ RDF dumps.
pub mod rdf;

pub use memory::InMemoryTaxonomy;
pub use rdf::RdfDumpSource;

/// One child edge of a topic node as stored in the taxonomy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    /// Element name of the edge (for example `narrow1` or `symbolic`).
    pub tag: RelationTag,
    /// Raw target reference, possibly alias-qualified.
    pub target: Topic,
}

impl Relation {
    /// Build a relation edge.
    pub fn new(tag: impl Into<RelationTag>, target: impl Into<Topic>) -> Self {
        Self {
            tag: tag.into(),
            target: target.into(),
        }
    }
}

/// Structure-side facts about one topic node, read together in one lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructureNode {
    /// Stable catalog id, when the node records one.
    pub stable_id: Option<StableId>,
    /// Child edges in source order.
    pub relations: Vec<Relation>,
}

/// Read-only taxonomy backend.
///
/// Every method returns `Ok(None)` when no node matches `topic`. A single call
/// may scan the whole backing store; callers go through `Taxonomy` for caching.
pub trait TaxonomySource: Send + Sync {
    /// Stable id and child edges of `topic`.
    fn structure(&self, topic: &str) -> Result<Option<StructureNode>, SamplerError>;
    /// Links attached to `topic`, in source order.
    fn links(&self, topic: &str) -> Result<Option<Vec<Link>>, SamplerError>;
}

/// True when element `name` is `tag` optionally followed by a numeric suffix.
pub(crate) fn tag_matches(name: &str, tag: &str) -> bool {
    name.strip_prefix(tag)
        .is_some_and(|rest| rest.chars().all(|ch| ch.is_ascii_digit()))
}

/// Strip an alias-namespace prefix (`Alias:Top/Canonical`) from a symbolic reference.
pub fn resolve_alias(reference: &str) -> &str {
    match reference.rsplit_once(ALIAS_SEPARATOR) {
        Some((_, canonical)) => canonical,
        None => reference,
    }
}

/// Cached structure lookup: filtered children plus the stable id.
#[derive(Debug, Default)]
struct ResolvedNode {
    stable_id: Option<StableId>,
    subtopics: Arc<Vec<Topic>>,
}

/// Memoizing accessor over a `TaxonomySource`.
///
/// Subtopics and stable ids share one structure cache, so a topic the walker
/// already descended through costs no further scan when its id is resolved.
pub struct Taxonomy {
    source: Arc<dyn TaxonomySource>,
    tags: RelationTags,
    structure: MemoCache<Topic, Arc<ResolvedNode>>,
    links: MemoCache<Topic, Arc<Vec<Link>>>,
}

impl Taxonomy {
    /// Wrap `source` with caches of at most `cache_capacity` entries each.
    pub fn new(source: Arc<dyn TaxonomySource>, tags: RelationTags, cache_capacity: usize) -> Self {
        Self {
            source,
            tags,
            structure: MemoCache::new(cache_capacity),
            links: MemoCache::new(cache_capacity),
        }
    }

    /// Build an accessor using the relation tags and cache capacity of `config`.
    pub fn from_config(source: Arc<dyn TaxonomySource>, config: &SamplerConfig) -> Self {
        Self::new(source, config.relation_tags.clone(), config.cache_capacity)
    }

    /// Direct subtopics of `topic` through the recognized relation tags.
    ///
    /// Alias-qualified targets are resolved to their canonical topic. Unknown
    /// topics yield an empty list.
    pub fn subtopics(&self, topic: &str) -> Result<Arc<Vec<Topic>>, SamplerError> {
        Ok(Arc::clone(&self.node(topic)?.subtopics))
    }

    fn node(&self, topic: &str) -> Result<Arc<ResolvedNode>, SamplerError> {
        self.structure.get_or_try_insert_with(topic, || {
            let Some(node) = self.source.structure(topic)? else {
                return Ok(Arc::new(ResolvedNode::default()));
            };
            let mut children: IndexSet<Topic> = IndexSet::new();
            for relation in node.relations {
                if !self
                    .tags
                    .subtopic_tags
                    .iter()
                    .any(|tag| tag_matches(&relation.tag, tag))
                {
                    continue;
                }
                let is_alias = self
                    .tags
                    .alias_tags
                    .iter()
                    .any(|tag| tag_matches(&relation.tag, tag));
                let child = if is_alias {
                    resolve_alias(&relation.target).to_string()
                } else {
                    relation.target
                };
                if !child.is_empty() && child != topic {
                    children.insert(child);
                }
            }
            Ok(Arc::new(ResolvedNode {
                stable_id: node.stable_id,
                subtopics: Arc::new(children.into_iter().collect()),
            }))
        })
    }

    /// Links attached to `topic`; unknown topics yield an empty list.
    pub fn links(&self, topic: &str) -> Result<Arc<Vec<Link>>, SamplerError> {
        self.links.get_or_try_insert_with(topic, || {
            Ok(Arc::new(self.source.links(topic)?.unwrap_or_default()))
        })
    }

    /// Stable id of `topic`, failing with `TopicNotFound` when absent or blank.
    pub fn stable_id(&self, topic: &str) -> Result<StableId, SamplerError> {
        match self.node(topic)?.stable_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
            Some(_) => Err(SamplerError::TopicNotFound {
                topic: topic.to_string(),
                details: "stable id is empty".to_string(),
            }),
            None => Err(SamplerError::TopicNotFound {
                topic: topic.to_string(),
                details: "no stable id recorded for topic".to_string(),
            }),
        }
    }

    /// Counters of the structure cache behind `subtopics` and `stable_id`.
    pub fn structure_cache_stats(&self) -> CacheStats {
        self.structure.stats()
    }

    /// Counters of the link cache.
    pub fn link_cache_stats(&self) -> CacheStats {
        self.links.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Arc<InMemoryTaxonomy> {
        Arc::new(
            InMemoryTaxonomy::new()
                .with_topic("Top/Arts", "1")
                .with_relation("Top/Arts", "narrow", "Top/Arts/Music")
                .with_relation("Top/Arts", "narrow2", "Top/Arts/Dance")
                .with_relation("Top/Arts", "symbolic", "Crafts:Top/Shopping/Crafts")
                .with_relation("Top/Arts", "related", "Top/Science")
                .with_relation("Top/Arts", "narrow", "Top/Arts/Music")
                .with_topic("Top/Arts/Music", "2")
                .with_links("Top/Arts/Music", ["http://a.example/", "http://b.example/"]),
        )
    }

    #[test]
    fn subtopics_filter_tags_and_strip_aliases() {
        let taxonomy = Taxonomy::new(fixture(), RelationTags::default(), 16);
        let children = taxonomy.subtopics("Top/Arts").unwrap();
        assert_eq!(
            children.as_slice(),
            ["Top/Arts/Music", "Top/Arts/Dance", "Top/Shopping/Crafts"]
        );
    }

    #[test]
    fn subtopics_twice_is_a_cache_hit() {
        let source = fixture();
        let taxonomy = Taxonomy::new(source.clone(), RelationTags::default(), 16);
        let first = taxonomy.subtopics("Top/Arts").unwrap();
        let scans = source.scan_count();
        let second = taxonomy.subtopics("Top/Arts").unwrap();
        assert_eq!(first, second);
        assert_eq!(source.scan_count(), scans);
        let stats = taxonomy.structure_cache_stats();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits(), 1);
    }

    #[test]
    fn stable_id_reuses_the_structure_lookup() {
        let source = fixture();
        let taxonomy = Taxonomy::new(source.clone(), RelationTags::default(), 16);
        taxonomy.subtopics("Top/Arts").unwrap();
        let scans = source.scan_count();
        assert_eq!(taxonomy.stable_id("Top/Arts").unwrap(), "1");
        assert_eq!(source.scan_count(), scans);

        assert_eq!(taxonomy.stable_id("Top/Arts/Music").unwrap(), "2");
        let scans = source.scan_count();
        assert!(taxonomy.subtopics("Top/Arts/Music").unwrap().is_empty());
        assert_eq!(source.scan_count(), scans);
    }

    #[test]
    fn unknown_topics_are_empty_not_errors() {
        let taxonomy = Taxonomy::new(fixture(), RelationTags::default(), 16);
        assert!(taxonomy.subtopics("Top/Nowhere").unwrap().is_empty());
        assert!(taxonomy.links("Top/Nowhere").unwrap().is_empty());
        assert!(matches!(
            taxonomy.stable_id("Top/Nowhere"),
            Err(SamplerError::TopicNotFound { topic, .. }) if topic == "Top/Nowhere"
        ));
    }

    #[test]
    fn custom_tags_restrict_relations() {
        let tags = RelationTags {
            subtopic_tags: vec!["narrow".to_string()],
            alias_tags: Vec::new(),
        };
        let taxonomy = Taxonomy::new(fixture(), tags, 16);
        let children = taxonomy.subtopics("Top/Arts").unwrap();
        assert_eq!(children.as_slice(), ["Top/Arts/Music", "Top/Arts/Dance"]);
    }

    #[test]
    fn tag_matching_accepts_numeric_suffixes_only() {
        assert!(tag_matches("narrow", "narrow"));
        assert!(tag_matches("narrow12", "narrow"));
        assert!(!tag_matches("narrowly", "narrow"));
        assert!(!tag_matches("symbolic", "narrow"));
        assert_eq!(resolve_alias("Crafts:Top/Shopping/Crafts"), "Top/Shopping/Crafts");
        assert_eq!(resolve_alias("Top/Arts"), "Top/Arts");
    }
}
