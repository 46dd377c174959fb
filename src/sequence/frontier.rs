use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A partial ordering of tracks during the search. Indices refer to the
/// deduplicated pool.
#[derive(Debug, Clone)]
pub struct SequenceNode {
    pub order: Vec<usize>,
    /// Sum of transition scores along `order`.
    pub score: f64,
    /// Tracks not yet placed, ascending.
    pub remaining: Vec<usize>,
    /// `score` plus the heuristic estimate for the open positions.
    pub priority: f64,
}

impl SequenceNode {
    pub fn root(start: usize, pool_size: usize) -> Self {
        Self {
            order: vec![start],
            score: 0.0,
            remaining: (0..pool_size).filter(|&i| i != start).collect(),
            priority: 0.0,
        }
    }

    pub fn last(&self) -> usize {
        // order is never empty: every node starts from a root
        self.order[self.order.len() - 1]
    }

    /// Append `next` via an edge worth `edge_score`. Priority is left for
    /// the caller to set.
    pub fn child(&self, next: usize, edge_score: f64) -> Self {
        let mut order = Vec::with_capacity(self.order.len() + 1);
        order.extend_from_slice(&self.order);
        order.push(next);
        Self {
            order,
            score: self.score + edge_score,
            remaining: self.remaining.iter().copied().filter(|&i| i != next).collect(),
            priority: 0.0,
        }
    }
}

impl Ord for SequenceNode {
    /// Highest priority first; among equals, deeper nodes first, then the
    /// lexicographically smaller order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.order.len().cmp(&other.order.len()))
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for SequenceNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SequenceNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SequenceNode {}

/// Open states ordered by priority, optionally capped to a fixed width.
pub struct Frontier {
    heap: BinaryHeap<SequenceNode>,
    width: Option<usize>,
    pruned: usize,
}

impl Frontier {
    /// `width == 0` means unbounded.
    pub fn new(width: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            width: (width > 0).then_some(width),
            pruned: 0,
        }
    }

    pub fn push(&mut self, node: SequenceNode) {
        self.heap.push(node);
    }

    pub fn pop(&mut self) -> Option<SequenceNode> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// States dropped by pruning so far.
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    /// Drop the lowest-priority states beyond the width limit.
    pub fn prune(&mut self) {
        let Some(width) = self.width else {
            return;
        };
        if self.heap.len() <= width {
            return;
        }
        let mut nodes = std::mem::take(&mut self.heap).into_sorted_vec();
        let excess = nodes.len() - width;
        nodes.drain(..excess);
        self.pruned += excess;
        self.heap = BinaryHeap::from(nodes);
    }
}
