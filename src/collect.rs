use indexmap::IndexSet;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use tracing::debug;

use crate::constants::sampler::STALL_ATTEMPTS_PER_LINK;
use crate::errors::SamplerError;
use crate::taxonomy::Taxonomy;
use crate::types::{Link, Topic};
use crate::walker::CategoryWalker;

/// How many random descents the randomized collector may spend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptBudget {
    /// At most this many descents (duplicates and empty landings included).
    Limited(usize),
    /// Keep going until `n` links are found; checked for reachability first.
    Unlimited,
}

/// Collect up to `n` distinct links from `topic`'s subtree, level by level.
///
/// Output order is the order topics are visited and links are returned by the
/// taxonomy, so any result is a prefix of the result for a larger `n`. Each
/// topic is visited at most once.
pub fn collect_links_bfs(
    taxonomy: &Taxonomy,
    topic: &str,
    n: usize,
) -> Result<Vec<Link>, SamplerError> {
    let mut collected: IndexSet<Link> = IndexSet::new();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut visited: HashSet<Topic> = HashSet::from([topic.to_string()]);
    let mut frontier: Vec<Topic> = vec![topic.to_string()];
    let mut level = 0usize;
    while !frontier.is_empty() {
        for current in &frontier {
            for link in taxonomy.links(current)?.iter() {
                collected.insert(link.clone());
                if collected.len() >= n {
                    return Ok(collected.into_iter().collect());
                }
            }
        }
        let mut next = Vec::new();
        for current in &frontier {
            for child in taxonomy.subtopics(current)?.iter() {
                if visited.insert(child.clone()) {
                    next.push(child.clone());
                }
            }
        }
        frontier = next;
        level += 1;
    }
    debug!(
        topic,
        requested = n,
        found = collected.len(),
        levels = level,
        "subtree exhausted before link target"
    );
    Ok(collected.into_iter().collect())
}

/// Collect up to `n` distinct links by repeatedly walking below `topic` and
/// sampling one link from each landing topic.
///
/// Every descent consumes one attempt, whether or not it yields a new link.
/// An `Unlimited` budget still fails with `QuotaUnreachable` once
/// `n × STALL_ATTEMPTS_PER_LINK` descents in a row add nothing new.
pub fn choice_collect_links<R: Rng + ?Sized>(
    walker: &CategoryWalker<'_>,
    topic: &str,
    n: usize,
    budget: AttemptBudget,
    rng: &mut R,
) -> Result<IndexSet<Link>, SamplerError> {
    let mut collected: IndexSet<Link> = IndexSet::new();
    let limit = match budget {
        AttemptBudget::Limited(limit) => Some(limit),
        AttemptBudget::Unlimited => {
            let reachable = collect_links_bfs(walker.taxonomy(), topic, n)?.len();
            if reachable < n {
                return Err(SamplerError::QuotaUnreachable {
                    requested: n,
                    available: reachable,
                    details: format!("subtree of '{topic}' holds too few distinct links"),
                });
            }
            None
        }
    };
    let stall_limit = n.saturating_mul(STALL_ATTEMPTS_PER_LINK);
    let mut attempts = 0usize;
    let mut since_new = 0usize;
    while collected.len() < n && limit.is_none_or(|limit| attempts < limit) {
        if limit.is_none() && since_new >= stall_limit {
            return Err(SamplerError::QuotaUnreachable {
                requested: n,
                available: collected.len(),
                details: format!(
                    "random walk below '{topic}' found no new link in {since_new} attempts"
                ),
            });
        }
        attempts += 1;
        since_new += 1;
        let landing = walker.choose_category(topic, rng)?;
        let links = walker.taxonomy().links(&landing)?;
        if let Some(link) = links.choose(rng)
            && collected.insert(link.clone())
        {
            since_new = 0;
        }
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationTags;
    use crate::taxonomy::InMemoryTaxonomy;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    fn tree() -> Taxonomy {
        let source = InMemoryTaxonomy::new()
            .with_children("R", ["R/a", "R/b"])
            .with_children("R/a", ["R/a/x"])
            .with_links("R", ["r1"])
            .with_links("R/a", ["a1", "a2"])
            .with_links("R/b", ["b1", "r1"])
            .with_links("R/a/x", ["x1", "x2", "x3"]);
        Taxonomy::new(Arc::new(source), RelationTags::default(), 64)
    }

    #[test]
    fn bfs_visits_levels_in_order_and_dedupes() {
        let taxonomy = tree();
        let all = collect_links_bfs(&taxonomy, "R", 100).unwrap();
        assert_eq!(all, ["r1", "a1", "a2", "b1", "x1", "x2", "x3"]);
    }

    #[test]
    fn bfs_results_are_prefixes_of_the_unbounded_order() {
        let taxonomy = tree();
        let all = collect_links_bfs(&taxonomy, "R", usize::MAX).unwrap();
        for n in 0..=all.len() + 2 {
            let partial = collect_links_bfs(&taxonomy, "R", n).unwrap();
            assert!(partial.len() <= n);
            assert_eq!(partial.as_slice(), &all[..partial.len()]);
            assert_eq!(partial, collect_links_bfs(&taxonomy, "R", n).unwrap());
        }
    }

    #[test]
    fn bfs_handles_symbolic_cycles() {
        let source = InMemoryTaxonomy::new()
            .with_children("A", ["A/B"])
            .with_relation("A/B", "symbolic", "Alias:A")
            .with_links("A/B", ["l"]);
        let taxonomy = Taxonomy::new(Arc::new(source), RelationTags::default(), 64);
        assert_eq!(collect_links_bfs(&taxonomy, "A", 10).unwrap(), ["l"]);
    }

    #[test]
    fn randomized_never_exceeds_n_or_duplicates() {
        let taxonomy = tree();
        let walker = CategoryWalker::new(&taxonomy, 0.7, 16);
        let mut rng = StdRng::seed_from_u64(21);
        for n in 0..6 {
            let links =
                choice_collect_links(&walker, "R", n, AttemptBudget::Limited(500), &mut rng)
                    .unwrap();
            assert!(links.len() <= n);
            let distinct: HashSet<&Link> = links.iter().collect();
            assert_eq!(distinct.len(), links.len());
        }
    }

    #[test]
    fn randomized_with_zero_attempts_is_empty() {
        let taxonomy = tree();
        let walker = CategoryWalker::new(&taxonomy, 0.5, 16);
        let mut rng = StdRng::seed_from_u64(0);
        let links =
            choice_collect_links(&walker, "R", 3, AttemptBudget::Limited(0), &mut rng).unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn randomized_unlimited_rejects_unreachable_targets() {
        let taxonomy = tree();
        let walker = CategoryWalker::new(&taxonomy, 0.5, 16);
        let mut rng = StdRng::seed_from_u64(0);
        let result = choice_collect_links(&walker, "R/b", 5, AttemptBudget::Unlimited, &mut rng);
        assert!(matches!(
            result,
            Err(SamplerError::QuotaUnreachable { requested: 5, available: 2, .. })
        ));
    }

    #[test]
    fn randomized_unlimited_completes_when_reachable() {
        let taxonomy = tree();
        let walker = CategoryWalker::new(&taxonomy, 0.0, 16);
        let mut rng = StdRng::seed_from_u64(4);
        let links =
            choice_collect_links(&walker, "R/b", 2, AttemptBudget::Unlimited, &mut rng).unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn randomized_unlimited_stops_when_the_walk_cannot_reach_enough_links() {
        let source = InMemoryTaxonomy::new()
            .with_children("T", ["T/c"])
            .with_links("T", ["t1"])
            .with_links("T/c", ["c1", "c2", "c3", "c4", "c5"]);
        let taxonomy = Taxonomy::new(Arc::new(source), RelationTags::default(), 64);
        let mut rng = StdRng::seed_from_u64(9);

        let stays_put = CategoryWalker::new(&taxonomy, 0.0, 16);
        assert!(matches!(
            choice_collect_links(&stays_put, "T", 3, AttemptBudget::Unlimited, &mut rng),
            Err(SamplerError::QuotaUnreachable { requested: 3, available: 1, .. })
        ));

        let always_descends = CategoryWalker::new(&taxonomy, 1.0, 16);
        assert!(matches!(
            choice_collect_links(&always_descends, "T", 6, AttemptBudget::Unlimited, &mut rng),
            Err(SamplerError::QuotaUnreachable { requested: 6, available: 5, .. })
        ));
        let links =
            choice_collect_links(&always_descends, "T", 3, AttemptBudget::Unlimited, &mut rng)
                .unwrap();
        assert!(links.iter().all(|link| link.starts_with('c')));
    }
}
