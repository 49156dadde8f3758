use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::{Relation, StructureNode, TaxonomySource, tag_matches};
use crate::constants::taxonomy::{
    CATID_ELEMENT, DEFAULT_CONTENT_FILE, DEFAULT_STRUCTURE_FILE, LINK_ELEMENT_PREFIX,
    RESOURCE_ATTR, TOPIC_ELEMENT, TOPIC_ID_ATTR,
};
use crate::errors::SamplerError;
use crate::types::{Link, StableId};

/// Child elements of one `<Topic>` block that matter to sampling.
#[derive(Debug, Default)]
struct TopicBlock {
    catid: Option<StableId>,
    /// (element local name, `resource` attribute) in document order.
    edges: Vec<(String, String)>,
}

/// Streaming reader over a DMOZ `structure.rdf.u8` / `content.rdf.u8` pair.
///
/// Every lookup re-reads the relevant dump from the start and stops at the
/// first matching `<Topic r:id="...">` block, so memory use stays flat no
/// matter how large the dump is. Wrap it in `Taxonomy` to memoize results.
#[derive(Debug)]
pub struct RdfDumpSource {
    structure_path: PathBuf,
    content_path: PathBuf,
    scans: AtomicUsize,
}

impl RdfDumpSource {
    /// Use explicit structure and content dump paths.
    pub fn new(structure_path: impl Into<PathBuf>, content_path: impl Into<PathBuf>) -> Self {
        Self {
            structure_path: structure_path.into(),
            content_path: content_path.into(),
            scans: AtomicUsize::new(0),
        }
    }

    /// Use the conventional dump file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dir.join(DEFAULT_STRUCTURE_FILE),
            dir.join(DEFAULT_CONTENT_FILE),
        )
    }

    /// Verify both dump files exist before a long run starts.
    pub fn check_readable(&self) -> Result<(), SamplerError> {
        for path in [&self.structure_path, &self.content_path] {
            File::open(path).map_err(|err| taxonomy_error(path, err))?;
        }
        Ok(())
    }

    /// Number of full or partial dump scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    fn read_topic_block(&self, path: &Path, topic: &str) -> Result<Option<TopicBlock>, SamplerError> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let file = File::open(path).map_err(|err| taxonomy_error(path, err))?;
        let mut reader = Reader::from_reader(BufReader::new(file));
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut block: Option<TopicBlock> = None;
        let mut depth = 0usize;
        let mut in_catid = false;
        loop {
            let event = reader.read_event_into(&mut buf).map_err(|err| {
                taxonomy_error(path, format!("at byte {}: {err}", reader.buffer_position()))
            })?;
            match event {
                Event::Eof => break,
                Event::Start(element) => {
                    if let Some(block) = block.as_mut() {
                        depth += 1;
                        in_catid = element.local_name().as_ref() == CATID_ELEMENT;
                        push_edge(path, block, &element)?;
                    } else if is_topic_start(path, &element, topic)? {
                        block = Some(TopicBlock::default());
                        depth = 0;
                    }
                }
                Event::Empty(element) => {
                    if let Some(block) = block.as_mut() {
                        push_edge(path, block, &element)?;
                    } else if is_topic_start(path, &element, topic)? {
                        return Ok(Some(TopicBlock::default()));
                    }
                }
                Event::Text(text) => {
                    if in_catid && let Some(block) = block.as_mut() {
                        let value = text.unescape().map_err(|err| taxonomy_error(path, err))?;
                        block.catid = Some(value.trim().to_string());
                    }
                }
                Event::End(_) => {
                    if block.is_some() {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                        in_catid = false;
                    }
                }
                _ => {}
            }
            buf.clear();
        }
        if block.is_none() {
            debug!(topic, path = %path.display(), "topic not present in dump");
        }
        Ok(block)
    }
}

impl TaxonomySource for RdfDumpSource {
    fn structure(&self, topic: &str) -> Result<Option<StructureNode>, SamplerError> {
        Ok(self
            .read_topic_block(&self.structure_path, topic)?
            .map(|block| StructureNode {
                stable_id: block.catid,
                relations: block
                    .edges
                    .into_iter()
                    .filter(|(name, _)| !tag_matches(name, LINK_ELEMENT_PREFIX))
                    .map(|(name, target)| Relation::new(name, target))
                    .collect(),
            }))
    }

    fn links(&self, topic: &str) -> Result<Option<Vec<Link>>, SamplerError> {
        Ok(self.read_topic_block(&self.content_path, topic)?.map(|block| {
            block
                .edges
                .into_iter()
                .filter(|(name, _)| tag_matches(name, LINK_ELEMENT_PREFIX))
                .map(|(_, link)| link)
                .collect()
        }))
    }
}

fn is_topic_start(path: &Path, element: &BytesStart<'_>, topic: &str) -> Result<bool, SamplerError> {
    if element.local_name().as_ref() != TOPIC_ELEMENT {
        return Ok(false);
    }
    Ok(attribute_value(path, element, TOPIC_ID_ATTR)?.as_deref() == Some(topic))
}

fn push_edge(path: &Path, block: &mut TopicBlock, element: &BytesStart<'_>) -> Result<(), SamplerError> {
    if let Some(resource) = attribute_value(path, element, RESOURCE_ATTR)? {
        let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
        block.edges.push((name, resource));
    }
    Ok(())
}

fn attribute_value(
    path: &Path,
    element: &BytesStart<'_>,
    local_name: &[u8],
) -> Result<Option<String>, SamplerError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|err| taxonomy_error(path, err))?;
        if attribute.key.local_name().as_ref() == local_name {
            let value = attribute
                .unescape_value()
                .map_err(|err| taxonomy_error(path, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn taxonomy_error(path: &Path, reason: impl Display) -> SamplerError {
    SamplerError::Taxonomy {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
