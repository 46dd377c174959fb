//! Best-first search over track orderings.
//!
//! A state is an ordered prefix of tracks. Its priority is the sum of the
//! transition scores along the prefix plus an optimistic estimate for the
//! positions still open: the best incoming edge of each remaining track,
//! taking the highest few. That estimate never undershoots, so with an
//! unbounded frontier the first complete ordering popped is optimal.
//! `SearchConfig` bounds the frontier width and the number of expansions
//! to keep large pools tractable.

pub mod frontier;
pub mod pairs;

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::config::{EngineConfig, SearchConfig};
use crate::mixpoints::{MixPlan, plan};
use crate::session::{Session, assemble};
use crate::track::Track;

use frontier::{Frontier, SequenceNode};
use pairs::PairTable;

/// Requests that cannot produce any session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("no tracks supplied")]
    NoTracks,

    #[error("target length must be at least 1 (got {0})")]
    InvalidTargetLength(usize),

    #[error("start track not in pool: {0}")]
    UnknownStartTrack(String),
}

/// Validate the request, then search. Tracks without an entry in `plans`
/// are planned here. Timing data should be in ascending order, as
/// `Track::normalize` leaves it.
pub fn find_optimal_sequence(
    tracks: &[Track],
    plans: &HashMap<String, MixPlan>,
    target_length: usize,
    start_track_id: Option<&str>,
    cfg: &EngineConfig,
) -> Result<Session, InputError> {
    if tracks.is_empty() {
        return Err(InputError::NoTracks);
    }
    if target_length == 0 {
        return Err(InputError::InvalidTargetLength(target_length));
    }
    if let Some(id) = start_track_id {
        if !tracks.iter().any(|t| t.id == id) {
            return Err(InputError::UnknownStartTrack(id.to_string()));
        }
    }

    Ok(search(tracks, plans, target_length, start_track_id, cfg))
}

/// Order up to `target_length` tracks from the pool for the best total
/// transition score. Degraded input yields warnings rather than errors: an
/// empty pool gives an empty session, and an unknown start id is ignored.
pub fn search(
    tracks: &[Track],
    plans: &HashMap<String, MixPlan>,
    target_length: usize,
    start_track_id: Option<&str>,
    cfg: &EngineConfig,
) -> Session {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    let mut pool: Vec<&Track> = Vec::with_capacity(tracks.len());
    for track in tracks {
        if seen.insert(track.id.as_str()) {
            pool.push(track);
        } else {
            let msg = format!("duplicate track id {} ignored", track.id);
            log::warn!("{}", msg);
            warnings.push(msg);
        }
    }

    if pool.is_empty() {
        let msg = "no tracks in pool; session is empty".to_string();
        log::warn!("{}", msg);
        warnings.push(msg);
        return Session::empty(warnings);
    }
    if target_length == 0 {
        let msg = "target length 0 requested; session is empty".to_string();
        log::warn!("{}", msg);
        warnings.push(msg);
        return Session::empty(warnings);
    }

    let mut target = target_length;
    if target > pool.len() {
        let msg = format!(
            "requested {} tracks but only {} distinct tracks available; session shortened",
            target,
            pool.len()
        );
        log::warn!("{}", msg);
        warnings.push(msg);
        target = pool.len();
    }

    let start = match start_track_id {
        Some(id) => match pool.iter().position(|t| t.id == id) {
            Some(idx) => Some(idx),
            None => {
                let msg = format!("start track {id} not in pool; ignoring start constraint");
                log::warn!("{}", msg);
                warnings.push(msg);
                None
            }
        },
        None => None,
    };

    let resolved = resolve_plans(&pool, plans, cfg);
    let pairs = PairTable::build(&pool, &resolved, &cfg.scoring);
    let outcome = run(&pairs, target, start, cfg.scoring.min_viable_score, &cfg.search);

    log::info!(
        "Search finished: {} tracks from a pool of {}, {} expansions, {} states pruned",
        outcome.order.len(),
        pool.len(),
        outcome.expansions,
        outcome.pruned
    );
    if outcome.budget_exhausted {
        let msg = format!(
            "search budget of {} expansions exhausted; completed greedily, result may be sub-optimal",
            cfg.search.max_expansions
        );
        log::warn!("{}", msg);
        warnings.push(msg);
    }

    assemble(&pool, &outcome.order, &pairs, warnings)
}

/// Supplied plans in pool order. Missing or empty plans are recomputed so
/// every pair has at least one candidate.
fn resolve_plans(pool: &[&Track], plans: &HashMap<String, MixPlan>, cfg: &EngineConfig) -> Vec<MixPlan> {
    pool.iter()
        .map(|track| match plans.get(&track.id) {
            Some(p) if !p.exits.is_empty() && !p.entries.is_empty() => p.clone(),
            Some(_) => {
                log::debug!("Plan for {} has no exits or entries, replanning", track.id);
                plan(track, &cfg.planner)
            }
            None => {
                log::debug!("No plan supplied for {}, planning", track.id);
                plan(track, &cfg.planner)
            }
        })
        .collect()
}

struct SearchOutcome {
    order: Vec<usize>,
    expansions: usize,
    pruned: usize,
    budget_exhausted: bool,
}

fn run(
    pairs: &PairTable,
    target: usize,
    start: Option<usize>,
    min_viable: f64,
    cfg: &SearchConfig,
) -> SearchOutcome {
    let n = pairs.len();
    let mut frontier = Frontier::new(cfg.frontier_width);

    let seeds: Vec<usize> = match start {
        Some(s) => vec![s],
        None => (0..n).collect(),
    };
    for &seed in &seeds {
        let mut root = SequenceNode::root(seed, n);
        root.priority = estimate(&root, pairs, target);
        frontier.push(root);
    }
    frontier.prune();

    let mut expansions = 0usize;
    while let Some(node) = frontier.pop() {
        if node.order.len() >= target {
            return SearchOutcome {
                order: node.order,
                expansions,
                pruned: frontier.pruned(),
                budget_exhausted: false,
            };
        }

        if expansions >= cfg.max_expansions {
            return SearchOutcome {
                order: complete_greedily(node, pairs, target, min_viable),
                expansions,
                pruned: frontier.pruned(),
                budget_exhausted: true,
            };
        }
        expansions += 1;

        for (next, edge) in successors(&node, pairs, min_viable) {
            let mut child = node.child(next, edge);
            child.priority = estimate(&child, pairs, target);
            frontier.push(child);
        }
        frontier.prune();
    }

    // Every non-goal state has at least one child while target <= n, so the
    // frontier only drains if that invariant is broken. Fall back to a greedy
    // walk from the first seed rather than return nothing.
    log::warn!("Search frontier drained before reaching a full ordering");
    let root = SequenceNode::root(seeds.first().copied().unwrap_or(0), n);
    SearchOutcome {
        order: complete_greedily(root, pairs, target, min_viable),
        expansions,
        pruned: frontier.pruned(),
        budget_exhausted: false,
    }
}

/// Accumulated score plus the sum of the best incoming edges of the
/// highest-valued remaining tracks, one per open position.
fn estimate(node: &SequenceNode, pairs: &PairTable, target: usize) -> f64 {
    let open = target.saturating_sub(node.order.len());
    if open == 0 {
        return node.score;
    }
    let mut bounds: Vec<f64> = node.remaining.iter().map(|&j| pairs.best_incoming(j)).collect();
    bounds.sort_unstable_by(|a, b| b.total_cmp(a));
    node.score + bounds.iter().take(open).sum::<f64>()
}

/// Viable continuations of `node`. If none clear the threshold, the single
/// least-bad continuation so the search always makes progress.
fn successors(node: &SequenceNode, pairs: &PairTable, min_viable: f64) -> Vec<(usize, f64)> {
    let last = node.last();
    let scored: Vec<(usize, f64)> = node
        .remaining
        .iter()
        .map(|&j| (j, pairs.score(last, j)))
        .collect();

    let viable: Vec<(usize, f64)> = scored
        .iter()
        .copied()
        .filter(|&(_, s)| s >= min_viable)
        .collect();
    if !viable.is_empty() {
        return viable;
    }

    best_of(&scored).into_iter().collect()
}

/// Highest score, lowest index on ties.
fn best_of(scored: &[(usize, f64)]) -> Option<(usize, f64)> {
    scored.iter().copied().fold(None, |best, cur| match best {
        Some(b) if b.1 >= cur.1 => Some(b),
        _ => Some(cur),
    })
}

fn complete_greedily(mut node: SequenceNode, pairs: &PairTable, target: usize, min_viable: f64) -> Vec<usize> {
    while node.order.len() < target {
        let Some((next, edge)) = best_of(&successors(&node, pairs, min_viable)) else {
            break;
        };
        node = node.child(next, edge);
    }
    node.order
}
