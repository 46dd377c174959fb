use rayon::prelude::*;

use crate::config::ScoringConfig;
use crate::mixpoints::MixPlan;
use crate::scoring::{TransitionCandidate, best_transition};
use crate::track::Track;

/// Best transition for every ordered pair of tracks in the pool, computed
/// once up front so the search and the session assembler share it.
pub struct PairTable {
    n: usize,
    /// Row-major `n * n`; the diagonal is always None.
    edges: Vec<Option<TransitionCandidate>>,
    /// Highest score of any edge into each track.
    best_incoming: Vec<f64>,
}

impl PairTable {
    /// Score all ordered pairs in parallel. `plans[i]` belongs to `tracks[i]`.
    pub fn build(tracks: &[&Track], plans: &[MixPlan], cfg: &ScoringConfig) -> Self {
        let n = tracks.len();
        debug_assert_eq!(n, plans.len());

        let edges: Vec<Option<TransitionCandidate>> = (0..n * n)
            .into_par_iter()
            .map(|idx| {
                let (from, to) = (idx / n, idx % n);
                if from == to {
                    None
                } else {
                    best_transition(tracks[from], &plans[from], tracks[to], &plans[to], cfg)
                }
            })
            .collect();

        let best_incoming = (0..n)
            .map(|to| {
                (0..n)
                    .filter_map(|from| edges[from * n + to].as_ref().map(|c| c.score))
                    .fold(0.0_f64, f64::max)
            })
            .collect();

        log::debug!("Scored {} track pairs", n * n.saturating_sub(1));

        Self {
            n,
            edges,
            best_incoming,
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, from: usize, to: usize) -> Option<&TransitionCandidate> {
        if from >= self.n || to >= self.n {
            return None;
        }
        self.edges[from * self.n + to].as_ref()
    }

    /// Score of the best `from → to` transition, 0 when the pair has no
    /// candidate at all.
    pub fn score(&self, from: usize, to: usize) -> f64 {
        self.get(from, to).map_or(0.0, |c| c.score)
    }

    /// Upper bound on what placing `to` after any track can contribute.
    pub fn best_incoming(&self, to: usize) -> f64 {
        self.best_incoming.get(to).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::mixpoints::plan;
    use crate::track::fixtures::track;

    fn table(tracks: &[Track]) -> PairTable {
        let refs: Vec<&Track> = tracks.iter().collect();
        let plans: Vec<MixPlan> = tracks
            .iter()
            .map(|t| plan(t, &PlannerConfig::default()))
            .collect();
        PairTable::build(&refs, &plans, &ScoringConfig::default())
    }

    #[test]
    fn test_diagonal_empty_and_pairs_filled() {
        let tracks = vec![
            track("a", 128.0, "8A", 200_000),
            track("b", 129.0, "9A", 210_000),
            track("c", 95.0, "3B", 180_000),
        ];
        let t = table(&tracks);
        assert_eq!(t.len(), 3);
        for i in 0..3 {
            assert!(t.get(i, i).is_none());
            for j in 0..3 {
                if i != j {
                    assert!(t.get(i, j).is_some());
                }
            }
        }
        assert!(t.score(0, 1) > t.score(0, 2));
        assert_eq!(t.score(1, 1), 0.0);
        assert!(t.get(5, 0).is_none());
    }

    #[test]
    fn test_best_incoming_is_column_max() {
        let tracks = vec![
            track("a", 128.0, "8A", 200_000),
            track("b", 128.0, "8A", 200_000),
            track("c", 100.0, "2B", 200_000),
        ];
        let t = table(&tracks);
        for to in 0..3 {
            let max = (0..3)
                .filter(|&from| from != to)
                .map(|from| t.score(from, to))
                .fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(t.best_incoming(to), max);
        }
    }

    #[test]
    fn test_empty_pool() {
        let t = table(&[]);
        assert!(t.is_empty());
        assert_eq!(t.best_incoming(0), 0.0);
    }
}
