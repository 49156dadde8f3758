//! Document pipeline: turns a converged `CorpusPlan` into on-disk documents.
//!
//! Fetching and text extraction are collaborator traits; the filesystem
//! writer produces one directory per topic plus one directory per pair.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::constants::corpus::{
    DOC_CLOSE_TAG, DOC_OPEN_TAG, DOCUMENT_EXTENSION, NEGATIVE_BUNDLE, PAIR_DIR_PREFIX,
    POSITIVE_BUNDLE,
};
use crate::errors::SamplerError;
use crate::pool::TopicPool;
use crate::sampler::CorpusPlan;
use crate::types::{Link, PairDirName, StableId, Topic};

/// Retrieves the raw document behind a link.
pub trait LinkFetcher: Send + Sync {
    /// Fetch `link`. Failures are tolerated by the pipeline.
    fn fetch(&self, link: &str) -> Result<Vec<u8>, SamplerError>;
}

/// Converts a raw document into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract plain text from `raw`.
    fn extract(&self, raw: &[u8]) -> String;
}

/// Persists extracted documents.
pub trait CorpusWriter: Send + Sync {
    /// Store document `index` of the topic identified by `stable_id`.
    fn write_document(
        &self,
        stable_id: &str,
        index: usize,
        text: &str,
    ) -> Result<(), SamplerError>;
    /// Store the positive and negative document bundles of one pair.
    fn write_pair(
        &self,
        pair_dir: &str,
        positive: &[String],
        negative: &[String],
    ) -> Result<(), SamplerError>;
}

/// Directory name of the pair built from two stable ids.
pub fn pair_dir_name(positive_id: &str, negative_id: &str) -> PairDirName {
    format!("{PAIR_DIR_PREFIX}_{positive_id}_{negative_id}")
}

/// Counters reported after a pipeline run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Topics whose documents were fetched.
    pub topics: usize,
    /// Documents fetched and written.
    pub documents: usize,
    /// Links whose fetch failed.
    pub failed: usize,
    /// Pair bundles written.
    pub pairs: usize,
}

struct TopicDocuments {
    topic: Topic,
    stable_id: StableId,
    documents: Vec<String>,
    failed: usize,
}

/// Walks a plan through fetcher, extractor and writer.
pub struct DocumentPipeline<'a> {
    fetcher: &'a dyn LinkFetcher,
    extractor: &'a dyn TextExtractor,
    writer: &'a dyn CorpusWriter,
}

impl<'a> DocumentPipeline<'a> {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        fetcher: &'a dyn LinkFetcher,
        extractor: &'a dyn TextExtractor,
        writer: &'a dyn CorpusWriter,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            writer,
        }
    }

    /// Fetch every topic that appears in a pair, write its documents, then
    /// write one bundle per pair.
    pub fn run(&self, plan: &CorpusPlan) -> Result<PipelineReport, SamplerError> {
        let mut report = PipelineReport::default();
        let positive = self.fetch_side(&plan.positive, plan.pairs.iter().map(|p| &p.positive))?;
        let negative = self.fetch_side(&plan.negative, plan.pairs.iter().map(|p| &p.negative))?;

        for fetched in positive.iter().chain(negative.iter()) {
            for (index, text) in fetched.documents.iter().enumerate() {
                self.writer.write_document(&fetched.stable_id, index, text)?;
            }
            debug!(
                topic = %fetched.topic,
                documents = fetched.documents.len(),
                failed = fetched.failed,
                "topic documents written"
            );
            report.topics += 1;
            report.documents += fetched.documents.len();
            report.failed += fetched.failed;
        }

        for pair in &plan.pairs {
            let (Some(pos), Some(neg)) = (
                positive.iter().find(|t| t.topic == pair.positive),
                negative.iter().find(|t| t.topic == pair.negative),
            ) else {
                continue;
            };
            let dir = pair_dir_name(&pos.stable_id, &neg.stable_id);
            self.writer.write_pair(&dir, &pos.documents, &neg.documents)?;
            report.pairs += 1;
        }
        info!(
            topics = report.topics,
            documents = report.documents,
            failed = report.failed,
            pairs = report.pairs,
            "document pipeline finished"
        );
        Ok(report)
    }

    fn fetch_side<'t>(
        &self,
        pool: &TopicPool,
        topics: impl Iterator<Item = &'t Topic>,
    ) -> Result<Vec<TopicDocuments>, SamplerError> {
        let mut wanted: Vec<&Topic> = Vec::new();
        for topic in topics {
            if !wanted.contains(&topic) {
                wanted.push(topic);
            }
        }
        wanted
            .into_par_iter()
            .map(|topic| {
                let entry = pool.get(topic).ok_or_else(|| SamplerError::TopicNotFound {
                    topic: topic.clone(),
                    details: "paired topic is missing from its pool".to_string(),
                })?;
                let mut documents = Vec::new();
                let mut failed = 0usize;
                for link in &entry.links {
                    match self.fetch_text(link) {
                        Ok(text) => documents.push(text),
                        Err(err) => {
                            warn!(topic = %topic, link = %link, error = %err, "fetch failed, link skipped");
                            failed += 1;
                        }
                    }
                }
                Ok(TopicDocuments {
                    topic: topic.clone(),
                    stable_id: entry.stable_id.clone(),
                    documents,
                    failed,
                })
            })
            .collect()
    }

    fn fetch_text(&self, link: &Link) -> Result<String, SamplerError> {
        let raw = self.fetcher.fetch(link)?;
        Ok(self.extractor.extract(&raw))
    }
}

/// Writes the TechTC layout under a root directory.
#[derive(Clone, Debug)]
pub struct FsCorpusWriter {
    root: PathBuf,
}

impl FsCorpusWriter {
    /// Writer rooted at `root`; directories are created on demand.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of document `index` for `stable_id`.
    pub fn document_path(&self, stable_id: &str, index: usize) -> PathBuf {
        self.root
            .join(stable_id)
            .join(format!("{index}.{DOCUMENT_EXTENSION}"))
    }
}

fn bundle(documents: &[String]) -> String {
    let mut out = String::new();
    for text in documents {
        out.push_str(DOC_OPEN_TAG);
        out.push('\n');
        out.push_str(text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(DOC_CLOSE_TAG);
        out.push('\n');
    }
    out
}

impl CorpusWriter for FsCorpusWriter {
    fn write_document(
        &self,
        stable_id: &str,
        index: usize,
        text: &str,
    ) -> Result<(), SamplerError> {
        let path = self.document_path(stable_id, index);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        Ok(())
    }

    fn write_pair(
        &self,
        pair_dir: &str,
        positive: &[String],
        negative: &[String],
    ) -> Result<(), SamplerError> {
        let dir = self.root.join(pair_dir);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(POSITIVE_BUNDLE), bundle(positive))?;
        fs::write(dir.join(NEGATIVE_BUNDLE), bundle(negative))?;
        Ok(())
    }
}
