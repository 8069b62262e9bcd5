use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<N> {
    pub id: N,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath<N> {
    /// Source to target inclusive; empty when the target is unreachable.
    pub nodes: Vec<N>,
    pub distance: Option<f64>,
}

/// Queue entry. `BinaryHeap` is a max-heap, so the ordering is reversed:
/// lower cost is higher priority, then lower node id.
struct QueueEntry<N> {
    cost: f64,
    node: N,
}

impl<N: Ord> PartialEq for QueueEntry<N> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<N: Ord> Eq for QueueEntry<N> {}

impl<N: Ord> Ord for QueueEntry<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl<N: Ord> PartialOrd for QueueEntry<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn shortest_path<N>(
    adjacency: &HashMap<N, Vec<Neighbor<N>>>,
    source: N,
    target: N,
) -> ShortestPath<N>
where
    N: Copy + Eq + Hash + Ord,
{
    shortest_path_observed(adjacency, source, target, |_, _| {})
}

/// Dijkstra from `source` to `target`, calling `on_settle` for every node
/// in the order its final distance is fixed.
///
/// Improved distances are pushed as new queue entries rather than updated in
/// place. Older entries for the same node come out later with a larger cost
/// and are skipped.
pub fn shortest_path_observed<N, F>(
    adjacency: &HashMap<N, Vec<Neighbor<N>>>,
    source: N,
    target: N,
    mut on_settle: F,
) -> ShortestPath<N>
where
    N: Copy + Eq + Hash + Ord,
    F: FnMut(N, f64),
{
    let mut distances: HashMap<N, f64> = HashMap::with_capacity(adjacency.len());
    let mut previous: HashMap<N, N> = HashMap::with_capacity(adjacency.len());
    let mut queue = BinaryHeap::new();

    distances.insert(source, 0.0);
    queue.push(QueueEntry {
        cost: 0.0,
        node: source,
    });

    while let Some(QueueEntry { cost, node }) = queue.pop() {
        let best = distances.get(&node).copied().unwrap_or(f64::INFINITY);
        if cost > best {
            continue;
        }
        on_settle(node, cost);

        if node == target {
            break;
        }

        let Some(neighbors) = adjacency.get(&node) else {
            continue;
        };
        for neighbor in neighbors {
            let candidate = cost + neighbor.weight;
            let known = distances
                .get(&neighbor.id)
                .copied()
                .unwrap_or(f64::INFINITY);
            if candidate < known {
                distances.insert(neighbor.id, candidate);
                previous.insert(neighbor.id, node);
                queue.push(QueueEntry {
                    cost: candidate,
                    node: neighbor.id,
                });
            }
        }
    }

    let nodes = reconstruct(&previous, source, target);
    let distance = if nodes.is_empty() {
        None
    } else {
        distances.get(&target).copied()
    };
    ShortestPath { nodes, distance }
}

/// Walk predecessors back from `target`. Anything that does not end at
/// `source` is treated as unreachable.
fn reconstruct<N>(previous: &HashMap<N, N>, source: N, target: N) -> Vec<N>
where
    N: Copy + Eq + Hash,
{
    let mut path = vec![target];
    let mut current = target;
    while let Some(&prev) = previous.get(&current) {
        // A well-formed chain is acyclic; bail out rather than spin.
        if path.len() > previous.len() + 1 {
            return Vec::new();
        }
        path.push(prev);
        current = prev;
    }

    if current != source {
        return Vec::new();
    }
    path.reverse();
    path
}
