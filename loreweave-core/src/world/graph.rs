//! Location graph and depth-capped reachability.
//!
//! Edges are stored as given by the campaign but always treated as symmetric:
//! if A lists B as a neighbor, B is also a neighbor of A.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::LocationId;

/// A location as read from the campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationNode {
    /// Location id.
    pub id: LocationId,
    /// Display name, matched case-insensitively for location sync.
    pub name: String,
    /// Neighbors as stored; may be one-directional.
    #[serde(default)]
    pub neighbors: Vec<LocationId>,
}

/// Set of locations reachable from an origin.
pub type ReachableSet = Arc<HashSet<LocationId>>;

/// The campaign's location graph with a cache of reachable sets.
pub struct LocationGraph {
    nodes: Vec<LocationNode>,
    index: HashMap<LocationId, usize>,
    adjacency: HashMap<LocationId, BTreeSet<LocationId>>,
    cache: Mutex<LruCache<(LocationId, u32), ReachableSet>>,
}

impl std::fmt::Debug for LocationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationGraph")
            .field("nodes", &self.nodes.len())
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

impl LocationGraph {
    /// Build the graph, symmetrizing every stored edge.
    #[must_use]
    pub fn new(nodes: Vec<LocationNode>, cache_size: usize) -> Self {
        let mut adjacency: HashMap<LocationId, BTreeSet<LocationId>> = HashMap::new();
        for node in &nodes {
            adjacency.entry(node.id.clone()).or_default();
            for neighbor in &node.neighbors {
                if *neighbor == node.id {
                    continue;
                }
                adjacency
                    .entry(node.id.clone())
                    .or_default()
                    .insert(neighbor.clone());
                adjacency
                    .entry(neighbor.clone())
                    .or_default()
                    .insert(node.id.clone());
            }
        }
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            nodes,
            index,
            adjacency,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// All nodes in campaign order.
    #[must_use]
    pub fn nodes(&self) -> &[LocationNode] {
        &self.nodes
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &LocationId) -> Option<&LocationNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Find a node by case-insensitive name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&LocationNode> {
        let wanted = name.trim().to_lowercase();
        self.nodes.iter().find(|n| n.name.to_lowercase() == wanted)
    }

    /// Symmetric neighbors of a location.
    pub fn neighbors(&self, id: &LocationId) -> impl Iterator<Item = &LocationId> {
        self.adjacency.get(id).into_iter().flatten()
    }

    /// Whether two locations share an edge (in either stored direction).
    #[must_use]
    pub fn are_adjacent(&self, a: &LocationId, b: &LocationId) -> bool {
        self.adjacency.get(a).is_some_and(|set| set.contains(b))
    }

    /// Locations within `radius` hops of `origin`, origin included.
    ///
    /// Results are cached per `(origin, radius)`.
    #[must_use]
    pub fn reachable_within(&self, origin: &LocationId, radius: u32) -> ReachableSet {
        let key = (origin.clone(), radius);
        if let Some(hit) = self.cache.lock().get(&key) {
            return Arc::clone(hit);
        }
        let set = Arc::new(bfs(&self.adjacency, origin, radius));
        self.cache.lock().put(key, Arc::clone(&set));
        set
    }
}

/// Breadth-first search capped at `radius`. Each node is visited once and
/// neighbors are only expanded while the current depth is below the cap.
fn bfs(
    adjacency: &HashMap<LocationId, BTreeSet<LocationId>>,
    origin: &LocationId,
    radius: u32,
) -> HashSet<LocationId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(origin.clone());
    queue.push_back((origin.clone(), 0u32));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= radius {
            continue;
        }
        let Some(neighbors) = adjacency.get(&current) else {
            continue;
        };
        for next in neighbors {
            if visited.insert(next.clone()) {
                queue.push_back((next.clone(), depth + 1));
            }
        }
    }
    visited
}
