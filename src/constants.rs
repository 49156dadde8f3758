/// Constants describing the DMOZ RDF dump layout.
pub mod taxonomy {
    /// Element local name of a topic block.
    pub const TOPIC_ELEMENT: &[u8] = b"Topic";
    /// Attribute local name carrying the topic identifier (`r:id`).
    pub const TOPIC_ID_ATTR: &[u8] = b"id";
    /// Attribute local name carrying relation and link targets (`r:resource`).
    pub const RESOURCE_ATTR: &[u8] = b"resource";
    /// Element local name holding the stable catalog id.
    pub const CATID_ELEMENT: &[u8] = b"catid";
    /// Element local-name prefix used for link entries (`link`, `link1`).
    pub const LINK_ELEMENT_PREFIX: &str = "link";
    /// Separator between an alias namespace and the canonical topic in symbolic references.
    pub const ALIAS_SEPARATOR: char = ':';
    /// Relation tag for direct subcategories.
    pub const RELATION_NARROW: &str = "narrow";
    /// Relation tag for symbolic (aliased) subcategories.
    pub const RELATION_SYMBOLIC: &str = "symbolic";
    /// Default conventional file name of the DMOZ structure dump.
    pub const DEFAULT_STRUCTURE_FILE: &str = "structure.rdf.u8";
    /// Default conventional file name of the DMOZ content dump.
    pub const DEFAULT_CONTENT_FILE: &str = "content.rdf.u8";
}

/// Constants used by sampler runtime behavior and labeling.
pub mod sampler {
    /// Label used for the positive side in logs, seeds, and checkpoints.
    pub const SIDE_POSITIVE: &str = "positive";
    /// Label used for the negative side in logs, seeds, and checkpoints.
    pub const SIDE_NEGATIVE: &str = "negative";
    /// Consecutive fruitless descents, per requested link, before an unlimited random collection gives up.
    pub const STALL_ATTEMPTS_PER_LINK: usize = 200;
    /// Above this share of the combination space the pair sampler shuffles instead of drawing.
    pub const PAIR_EXHAUSTIVE_SHARE: f64 = 0.5;
}

/// Default values for `SamplerConfig`.
pub mod config {
    /// Default positive category root.
    pub const DEFAULT_POSITIVE_ROOT: &str = "Top/Arts";
    /// Default negative category root.
    pub const DEFAULT_NEGATIVE_ROOT: &str = "Top/Science";
    /// Default probability of descending one more level.
    pub const DEFAULT_DEPTH_PROB: f64 = 0.5;
    /// Default number of topics per side (the TechTC-300 size).
    pub const DEFAULT_POOL_SIZE: usize = 300;
    /// Default number of distinct pairs requested.
    pub const DEFAULT_PAIR_COUNT: usize = 300;
    /// Default target links (documents) per topic.
    pub const DEFAULT_LINKS_PER_TOPIC: usize = 200;
    /// Default minimum share of the target links a topic must reach.
    pub const DEFAULT_MIN_LINK_PROPORTION: f64 = 0.5;
    /// Default RNG seed.
    pub const DEFAULT_SEED: u64 = 42;
    /// Default capacity of each taxonomy cache.
    pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;
    /// Default bound on randomized descent depth.
    pub const DEFAULT_MAX_DESCENT_DEPTH: usize = 64;
    /// Randomized-collector attempts per requested link.
    pub const DEFAULT_RANDOM_ATTEMPTS_FACTOR: usize = 20;
    /// Candidate draws per missing pool slot within one round.
    pub const DEFAULT_DRAW_ATTEMPTS_FACTOR: usize = 20;
    /// Hard ceiling on convergence rounds.
    pub const DEFAULT_MAX_ROUNDS: usize = 50;
}

/// Constants used by checkpoint persistence and wire encoding.
pub mod checkpoint {
    /// Version tag for persisted checkpoint records.
    pub const CHECKPOINT_RECORD_VERSION: u8 = 1;
    /// Prefix marker for bitcode-encoded payloads.
    pub const BITCODE_PREFIX: u8 = b'B';
    /// Default directory for persisted checkpoints.
    pub const DEFAULT_CHECKPOINT_DIR: &str = ".techtc_store";
    /// Default filename for persisted checkpoints.
    pub const DEFAULT_CHECKPOINT_FILENAME: &str = "checkpoint.bin";
}

/// Constants describing the exported corpus layout.
pub mod corpus {
    /// Extension of per-document files.
    pub const DOCUMENT_EXTENSION: &str = "txt";
    /// Prefix of per-pair export directories.
    pub const PAIR_DIR_PREFIX: &str = "Exp";
    /// File holding all positive documents of a pair.
    pub const POSITIVE_BUNDLE: &str = "all_pos.txt";
    /// File holding all negative documents of a pair.
    pub const NEGATIVE_BUNDLE: &str = "all_neg.txt";
    /// Opening tag wrapping each document in a bundle.
    pub const DOC_OPEN_TAG: &str = "<dmoz_doc>";
    /// Closing tag wrapping each document in a bundle.
    pub const DOC_CLOSE_TAG: &str = "</dmoz_doc>";
    /// Default file name of the JSON plan manifest written by the CLI.
    pub const PLAN_MANIFEST_FILENAME: &str = "techtc_plan.json";
}
