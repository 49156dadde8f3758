#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Bounded memoizing cache used by the taxonomy accessor.
pub mod cache;
/// Checkpoint snapshots and their stores.
pub mod checkpoint;
/// Command-line front end shared by the `build_techtc` binary.
pub mod cli;
/// Breadth-first and randomized link collectors.
pub mod collect;
/// Sampling configuration types.
pub mod config;
/// Centralized constants used across taxonomy, sampler, checkpoint, and corpus code.
pub mod constants;
/// Document pipeline collaborators and the filesystem corpus writer.
pub mod corpus;
mod hash;
/// Pool link-count metrics.
pub mod metrics;
/// Unique topic-pair sampling.
pub mod pairs;
/// Topic pools and per-side pool builders.
pub mod pool;
mod rng;
/// Convergence loop and public sampling API.
pub mod sampler;
/// Taxonomy sources and the memoizing accessor.
pub mod taxonomy;
/// Shared type aliases.
pub mod types;
/// Randomized category descent.
pub mod walker;

mod errors;

pub use cache::{CacheStats, MemoCache};
pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
pub use collect::{AttemptBudget, choice_collect_links, collect_links_bfs};
pub use config::{LinkStrategy, RelationTags, SamplerConfig};
pub use corpus::{
    CorpusWriter, DocumentPipeline, FsCorpusWriter, LinkFetcher, PipelineReport, TextExtractor,
};
pub use errors::SamplerError;
pub use pairs::{Pair, sample_pairs};
pub use pool::{PoolBuilder, PoolEntry, TopicPool};
pub use sampler::{CorpusPlan, TopicPairSampler};
pub use taxonomy::{
    InMemoryTaxonomy, RdfDumpSource, Relation, StructureNode, Taxonomy, TaxonomySource,
};
pub use types::{HashPart, Link, PairDirName, RelationTag, StableId, Topic};
pub use walker::CategoryWalker;
