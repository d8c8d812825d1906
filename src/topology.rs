//! Follower adjacency in CSR format.
//!
//! A diffusion tick visits every node once and, for each relaying node, every
//! follower once. [`Topology`] captures that visiting order up front in
//! Compressed Sparse Row form so the per-tick loop does no link scans and no
//! allocation.
//!
//! ## Determinism
//!
//! Node order is the graph's arena order and follower order is link arena
//! order. Both are fixed for a given graph (and preserved by cloning and
//! serialization), so the sequence of PRNG draws made during a tick is fixed
//! too. The topology depends only on the graph's structure, never on queues
//! or display states, so one topology serves every tick of a run.

use slotmap::SecondaryMap;

use crate::graph::{Graph, LinkKey, NodeKey};

/// Snapshot of a graph's node order and follower lists.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Nodes in processing order.
    order: Vec<NodeKey>,
    /// Maps a node key to its position in `order`.
    position: SecondaryMap<NodeKey, usize>,
    /// CSR offsets. Followers of `order[i]` are `edges[offsets[i]..offsets[i + 1]]`.
    offsets: Vec<usize>,
    /// CSR payload: follower key and the link leading to it.
    edges: Vec<(NodeKey, LinkKey)>,
}

impl Topology {
    /// Build the follower table of `graph`.
    ///
    /// Links whose endpoints are missing are skipped.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        let order: Vec<NodeKey> = graph.nodes.keys().collect();

        let mut position = SecondaryMap::with_capacity(order.len());
        for (idx, &key) in order.iter().enumerate() {
            position.insert(key, idx);
        }

        let mut counts = vec![0usize; order.len()];
        for link in graph.links.values() {
            if let (Some(&from), true) = (
                position.get(link.source()),
                position.contains_key(link.target()),
            ) {
                counts[from] += 1;
            }
        }

        let mut offsets = Vec::with_capacity(order.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for &count in &counts {
            total += count;
            offsets.push(total);
        }

        let mut edges = vec![(NodeKey::default(), LinkKey::default()); total];
        let mut write_pos = offsets[..order.len()].to_vec();
        for (link_key, link) in &graph.links {
            if let (Some(&from), true) = (
                position.get(link.source()),
                position.contains_key(link.target()),
            ) {
                edges[write_pos[from]] = (link.target(), link_key);
                write_pos[from] += 1;
            }
        }

        Self {
            order,
            position,
            offsets,
            edges,
        }
    }

    /// Number of nodes.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Nodes in processing order.
    #[inline]
    #[must_use]
    pub fn order(&self) -> &[NodeKey] {
        &self.order
    }

    /// Position of `key` in processing order.
    #[inline]
    #[must_use]
    pub fn position(&self, key: NodeKey) -> Option<usize> {
        self.position.get(key).copied()
    }

    /// Followers of the node at position `idx`, with the connecting links.
    #[inline]
    #[must_use]
    pub fn followers(&self, idx: usize) -> &[(NodeKey, LinkKey)] {
        &self.edges[self.offsets[idx]..self.offsets[idx + 1]]
    }

    /// Followers of the node stored under `key`.
    #[must_use]
    pub fn followers_of(&self, key: NodeKey) -> &[(NodeKey, LinkKey)] {
        match self.position(key) {
            Some(idx) => self.followers(idx),
            None => &[],
        }
    }

    /// Number of nodes reachable from `key` along links, excluding `key` itself.
    #[must_use]
    pub fn reach(&self, key: NodeKey) -> usize {
        let Some(start) = self.position(key) else {
            return 0;
        };

        let mut visited = vec![false; self.order.len()];
        let mut stack = vec![start];
        visited[start] = true;
        let mut count = 0;

        while let Some(current) = stack.pop() {
            for &(follower, _) in self.followers(current) {
                if let Some(next) = self.position(follower) {
                    if !visited[next] {
                        visited[next] = true;
                        count += 1;
                        stack.push(next);
                    }
                }
            }
        }

        count
    }
}
