use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tempfile::NamedTempFile;

use crate::constants::checkpoint::{
    BITCODE_PREFIX, CHECKPOINT_RECORD_VERSION, DEFAULT_CHECKPOINT_DIR, DEFAULT_CHECKPOINT_FILENAME,
};
use crate::errors::SamplerError;
use crate::pairs::Pair;
use crate::pool::{PoolBuilder, TopicPool};
use crate::types::{Link, StableId, Topic};

/// Persisted pool entry for one topic.
#[derive(Clone, Debug, PartialEq, Eq, bitcode::Encode, bitcode::Decode)]
pub struct PersistedPoolEntry {
    /// Pooled topic.
    pub topic: Topic,
    /// Resolved stable id.
    pub stable_id: StableId,
    /// Collected links in order.
    pub links: Vec<Link>,
}

/// Persisted state of one side's pool builder.
#[derive(Clone, Debug, Default, PartialEq, Eq, bitcode::Encode, bitcode::Decode)]
pub struct PersistedSide {
    /// Root the side was sampled under.
    pub root: Topic,
    /// Accepted topics in insertion order.
    pub entries: Vec<PersistedPoolEntry>,
    /// Topics dropped by the link filter.
    pub rejected: Vec<Topic>,
}

impl PersistedSide {
    /// Snapshot a builder.
    pub fn capture(builder: &PoolBuilder) -> Self {
        Self {
            root: builder.root().to_string(),
            entries: builder
                .pool()
                .iter()
                .map(|(topic, entry)| PersistedPoolEntry {
                    topic: topic.clone(),
                    stable_id: entry.stable_id.clone(),
                    links: entry.links.iter().cloned().collect(),
                })
                .collect(),
            rejected: builder.rejected().iter().cloned().collect(),
        }
    }

    /// Rebuild the builder for `side` from this snapshot.
    pub fn into_builder(self, side: &'static str) -> PoolBuilder {
        let mut pool = TopicPool::new();
        for entry in self.entries {
            pool.insert(entry.topic, entry.stable_id, entry.links);
        }
        PoolBuilder::restore(side, self.root, pool, self.rejected)
    }
}

/// Resumable snapshot of a sampling run.
#[derive(Clone, Debug, PartialEq, Eq, bitcode::Encode, bitcode::Decode)]
pub struct Checkpoint {
    /// Fingerprint of the configuration the run was started with.
    pub config_fingerprint: u64,
    /// Convergence rounds completed.
    pub rounds: u64,
    /// Deterministic RNG internal state.
    pub rng_state: u64,
    /// Positive side state.
    pub positive: PersistedSide,
    /// Negative side state.
    pub negative: PersistedSide,
    /// Pairs sampled so far as (positive, negative).
    pub pairs: Vec<(Topic, Topic)>,
    /// Unix timestamp (seconds) of the save.
    pub saved_at: i64,
}

impl Checkpoint {
    /// Pairs as `Pair` values.
    pub fn pairs(&self) -> impl Iterator<Item = Pair> + '_ {
        self.pairs
            .iter()
            .map(|(positive, negative)| Pair::new(positive.clone(), negative.clone()))
    }
}

/// Persistence backend for run checkpoints.
pub trait CheckpointStore: Send + Sync {
    /// Load the last checkpoint, if any. Corrupt data is an error, never `None`.
    fn load_checkpoint(&self) -> Result<Option<Checkpoint>, SamplerError>;
    /// Persist `checkpoint`, replacing any previous one.
    fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), SamplerError>;
}

/// Checkpoint store kept in process memory.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoint: RwLock<Option<Checkpoint>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with `checkpoint`.
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint: RwLock::new(Some(checkpoint)),
        }
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load_checkpoint(&self) -> Result<Option<Checkpoint>, SamplerError> {
        self.checkpoint
            .read()
            .map_err(|_| SamplerError::Checkpoint("checkpoint lock poisoned".into()))
            .map(|guard| guard.clone())
    }

    fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), SamplerError> {
        *self
            .checkpoint
            .write()
            .map_err(|_| SamplerError::Checkpoint("checkpoint lock poisoned".into()))? =
            Some(checkpoint.clone());
        Ok(())
    }
}

/// File-backed checkpoint store.
///
/// Writes go to a temporary file in the target directory which is then
/// renamed over the checkpoint, so an interrupted save never leaves a
/// partial file behind.
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl fmt::Debug for FileCheckpointStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCheckpointStore")
            .field("path", &self.path)
            .finish()
    }
}

impl FileCheckpointStore {
    /// Use the checkpoint file at `path` (or the default file name when `path` is a directory).
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, SamplerError> {
        let path = coerce_checkpoint_path(path.into());
        ensure_parent_dir(&path)?;
        Ok(Self { path })
    }

    /// Default checkpoint path under the crate's default store directory.
    pub fn default_path() -> PathBuf {
        Self::default_path_in_dir(DEFAULT_CHECKPOINT_DIR)
    }

    /// Default checkpoint path inside a custom directory.
    pub fn default_path_in_dir<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join(DEFAULT_CHECKPOINT_FILENAME)
    }

    /// Path of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the checkpoint so the next run starts from scratch.
    pub fn discard(&self) -> Result<bool, SamplerError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load_checkpoint(&self) -> Result<Option<Checkpoint>, SamplerError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        decode_checkpoint(&bytes).map(Some)
    }

    fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), SamplerError> {
        let payload = encode_checkpoint(checkpoint);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&payload)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| SamplerError::Io(err.error))?;
        Ok(())
    }
}

fn encode_checkpoint(checkpoint: &Checkpoint) -> Vec<u8> {
    let payload = encode_bitcode_payload(&bitcode::encode(checkpoint));
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(CHECKPOINT_RECORD_VERSION);
    buf.extend_from_slice(&payload);
    buf
}

fn decode_checkpoint(bytes: &[u8]) -> Result<Checkpoint, SamplerError> {
    let Some((&version, rest)) = bytes.split_first() else {
        return Err(SamplerError::Checkpoint("checkpoint file is empty".into()));
    };
    if version != CHECKPOINT_RECORD_VERSION {
        return Err(SamplerError::Checkpoint(format!(
            "checkpoint record version mismatch (expected {CHECKPOINT_RECORD_VERSION}, found {version})"
        )));
    }
    let raw = decode_bitcode_payload(rest)?;
    bitcode::decode(raw)
        .map_err(|err| SamplerError::Checkpoint(format!("corrupt checkpoint record: {err}")))
}

fn encode_bitcode_payload(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(BITCODE_PREFIX);
    out.extend_from_slice(bytes);
    out
}

fn decode_bitcode_payload(bytes: &[u8]) -> Result<&[u8], SamplerError> {
    match bytes.split_first() {
        Some((&BITCODE_PREFIX, rest)) => Ok(rest),
        _ => Err(SamplerError::Checkpoint(
            "bitcode payload missing expected prefix".into(),
        )),
    }
}

fn coerce_checkpoint_path(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        return path.join(DEFAULT_CHECKPOINT_FILENAME);
    }
    path
}

fn ensure_parent_dir(path: &Path) -> Result<(), SamplerError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
