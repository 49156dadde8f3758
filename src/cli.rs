use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::checkpoint::FileCheckpointStore;
use crate::config::{LinkStrategy, RelationTags, SamplerConfig};
use crate::constants::config::{
    DEFAULT_DEPTH_PROB, DEFAULT_LINKS_PER_TOPIC, DEFAULT_MIN_LINK_PROPORTION,
    DEFAULT_NEGATIVE_ROOT, DEFAULT_PAIR_COUNT, DEFAULT_POOL_SIZE, DEFAULT_POSITIVE_ROOT,
    DEFAULT_SEED,
};
use crate::constants::corpus::PLAN_MANIFEST_FILENAME;
use crate::metrics::pool_summary;
use crate::pool::TopicPool;
use crate::sampler::TopicPairSampler;
use crate::taxonomy::RdfDumpSource;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Bfs,
    Randomized,
}

impl From<StrategyArg> for LinkStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Bfs => LinkStrategy::Bfs,
            StrategyArg::Randomized => LinkStrategy::Randomized,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "build_techtc",
    disable_help_subcommand = true,
    about = "Sample a TechTC-style topic-pair collection from a DMOZ dump",
    long_about = "Sample positive and negative topic pools from a DMOZ RDF dump, collect links for each topic, and write the converged plan as a JSON manifest.",
    after_help = "Dump files are given either as CONTENT_RDF_FILE STRUCTURE_RDF_FILE or with --dump-dir. Progress is checkpointed and resumed automatically."
)]
/// CLI for `build_techtc`.
///
/// Common usage:
/// - Explicit dump files: `build_techtc content.rdf.u8 structure.rdf.u8`
/// - Dump directory with default filenames: `--dump-dir /data/dmoz`
/// - Start over instead of resuming: `--discard-checkpoint`
struct BuildTechTcCli {
    #[arg(
        value_name = "CONTENT_RDF_FILE",
        required_unless_present = "dump_dir",
        requires = "structure_file"
    )]
    content_file: Option<PathBuf>,
    #[arg(value_name = "STRUCTURE_RDF_FILE", required_unless_present = "dump_dir")]
    structure_file: Option<PathBuf>,
    #[arg(
        long = "dump-dir",
        value_name = "DIR",
        conflicts_with_all = ["content_file", "structure_file"],
        help = "Directory holding structure.rdf.u8 and content.rdf.u8"
    )]
    dump_dir: Option<PathBuf>,
    #[arg(
        short = 'p',
        long = "positive-category-root",
        default_value = DEFAULT_POSITIVE_ROOT,
        help = "Category root of the sub-categories used for positive documents"
    )]
    positive_root: String,
    #[arg(
        short = 'n',
        long = "negative-category-root",
        default_value = DEFAULT_NEGATIVE_ROOT,
        help = "Category root of the sub-categories used for negative documents"
    )]
    negative_root: String,
    #[arg(
        short = 'r',
        long = "recursive-probability",
        default_value_t = DEFAULT_DEPTH_PROB,
        value_parser = parse_probability,
        help = "Probability of descending one more level below a chosen category"
    )]
    depth_prob: f64,
    #[arg(
        short = 's',
        long = "techtc-size",
        default_value_t = DEFAULT_POOL_SIZE,
        value_parser = parse_positive_usize,
        help = "Number of topics pooled per side"
    )]
    pool_size: usize,
    #[arg(
        long = "pair-count",
        default_value_t = DEFAULT_PAIR_COUNT,
        value_parser = parse_positive_usize,
        help = "Number of distinct topic pairs to sample"
    )]
    pair_count: usize,
    #[arg(
        long = "links-per-topic",
        default_value_t = DEFAULT_LINKS_PER_TOPIC,
        value_parser = parse_positive_usize,
        help = "Links collected per topic"
    )]
    links_per_topic: usize,
    #[arg(
        long = "min-link-proportion",
        default_value_t = DEFAULT_MIN_LINK_PROPORTION,
        value_parser = parse_probability,
        help = "Share of --links-per-topic a topic must reach to be kept"
    )]
    min_link_proportion: f64,
    #[arg(long, value_enum, default_value = "bfs", help = "Link collection strategy")]
    strategy: StrategyArg,
    #[arg(
        long = "relation-tag",
        value_name = "TAG",
        help = "Relation tag treated as a subtopic edge, repeat as needed (default: narrow, symbolic)"
    )]
    relation_tags: Vec<String>,
    #[arg(
        long = "alias-tag",
        value_name = "TAG",
        help = "Relation tag whose targets carry an alias prefix, repeat as needed (default: symbolic)"
    )]
    alias_tags: Vec<String>,
    #[arg(long, default_value_t = DEFAULT_SEED, help = "Deterministic sampling seed")]
    seed: u64,
    #[arg(
        long = "checkpoint-path",
        value_name = "PATH",
        help = "Optional path for the persisted checkpoint file"
    )]
    checkpoint_path: Option<PathBuf>,
    #[arg(
        long = "checkpoint-dir",
        value_name = "DIR",
        conflicts_with = "checkpoint_path",
        help = "Optional directory for the persisted checkpoint file (uses checkpoint.bin filename)"
    )]
    checkpoint_dir: Option<PathBuf>,
    #[arg(
        long = "discard-checkpoint",
        help = "Delete any existing checkpoint before sampling"
    )]
    discard_checkpoint: bool,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory the plan manifest is written to"
    )]
    output_dir: PathBuf,
}

impl BuildTechTcCli {
    fn sampler_config(&self) -> SamplerConfig {
        let defaults = RelationTags::default();
        let relation_tags = RelationTags {
            subtopic_tags: if self.relation_tags.is_empty() {
                defaults.subtopic_tags
            } else {
                self.relation_tags.clone()
            },
            alias_tags: if self.alias_tags.is_empty() {
                defaults.alias_tags
            } else {
                self.alias_tags.clone()
            },
        };
        SamplerConfig {
            positive_root: self.positive_root.clone(),
            negative_root: self.negative_root.clone(),
            depth_prob: self.depth_prob,
            pool_size: self.pool_size,
            pair_count: self.pair_count,
            links_per_topic: self.links_per_topic,
            min_link_proportion: self.min_link_proportion,
            strategy: self.strategy.into(),
            relation_tags,
            seed: self.seed,
            ..SamplerConfig::default()
        }
    }

    fn dump_source(&self) -> Result<RdfDumpSource, Box<dyn Error>> {
        match (&self.dump_dir, &self.content_file, &self.structure_file) {
            (Some(dir), _, _) => Ok(RdfDumpSource::in_dir(dir)),
            (None, Some(content), Some(structure)) => Ok(RdfDumpSource::new(structure, content)),
            _ => Err("both CONTENT_RDF_FILE and STRUCTURE_RDF_FILE are required".into()),
        }
    }

    fn checkpoint_path(&self) -> PathBuf {
        if let Some(path) = &self.checkpoint_path {
            path.clone()
        } else if let Some(dir) = &self.checkpoint_dir {
            FileCheckpointStore::default_path_in_dir(dir)
        } else {
            FileCheckpointStore::default_path()
        }
    }
}

/// Run the `build_techtc` command with the given arguments (program name excluded).
pub fn run_build_techtc<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) = parse_cli::<BuildTechTcCli, _>(
        std::iter::once("build_techtc".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let config = cli.sampler_config();
    config.validate()?;
    let source = cli.dump_source()?;
    source.check_readable()?;

    let store = FileCheckpointStore::open(cli.checkpoint_path())?;
    if cli.discard_checkpoint && store.discard()? {
        println!("discarded checkpoint: {}", store.path().display());
    }
    println!("checkpoint: {}", store.path().display());

    let sampler = TopicPairSampler::new(config, Arc::new(source))?
        .with_checkpoint_store(Arc::new(store));
    let plan = sampler.run()?;

    println!("=== techtc plan ===");
    println!("rounds: {}", plan.rounds);
    print_pool("positive", &sampler.config().positive_root, &plan.positive);
    print_pool("negative", &sampler.config().negative_root, &plan.negative);
    println!("pairs: {}", plan.pairs.len());
    let subtopics = sampler.taxonomy().structure_cache_stats();
    let links = sampler.taxonomy().link_cache_stats();
    println!(
        "taxonomy cache: subtopics {} hits / {} misses, links {} hits / {} misses",
        subtopics.hits(),
        subtopics.misses,
        links.hits(),
        links.misses
    );

    fs::create_dir_all(&cli.output_dir)?;
    let manifest_path = cli.output_dir.join(PLAN_MANIFEST_FILENAME);
    let writer = BufWriter::new(File::create(&manifest_path)?);
    serde_json::to_writer_pretty(writer, &plan)?;
    println!("manifest: {}", manifest_path.display());
    Ok(())
}

fn print_pool(side: &str, root: &str, pool: &TopicPool) {
    match pool_summary(pool) {
        Some(summary) => println!(
            "{side} ({root}): {} topics, links min={} max={} mean={:.1}",
            summary.topics, summary.min_links, summary.max_links, summary.mean_links
        ),
        None => println!("{side} ({root}): empty"),
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let parsed = raw
        .parse::<f64>()
        .map_err(|_| format!("Could not parse '{}' as a number", raw))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(format!("{} is outside [0, 1]", parsed));
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
