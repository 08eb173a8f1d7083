//! The Riemannian neighborhood graph built while gathering tangent-plane neighborhoods.
//!
//! An undirected graph over sample indices: an edge `(i, j)` means `i` and `j` were co-visited
//! during tangent-plane construction, i.e. `j` showed up in `i`'s nearest-neighbor gather (or
//! vice versa). It exists only to drive orientation propagation and is discarded once that
//! finishes.

use crate::{new_map, MapType};

/// Adjacency-list graph over sample indices `0..n_samples`, plus any pseudo-nodes temporarily
/// appended during orientation propagation.
#[derive(Clone, Debug, Default)]
pub struct NeighborhoodGraph {
    adjacency: MapType<u32, Vec<u32>>,
}

impl NeighborhoodGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(n: usize) -> Self {
        let mut adjacency = new_map();
        for i in 0..n as u32 {
            adjacency.insert(i, Vec::new());
        }
        Self { adjacency }
    }

    /// Inserts the undirected edge `(a, b)` if not already present. No-op for `a == b`.
    pub fn insert_edge(&mut self, a: u32, b: u32) {
        if a == b {
            return;
        }
        let neighbors_a = self.adjacency.entry(a).or_insert_with(Vec::new);
        if !neighbors_a.contains(&b) {
            neighbors_a.push(b);
        }
        let neighbors_b = self.adjacency.entry(b).or_insert_with(Vec::new);
        if !neighbors_b.contains(&a) {
            neighbors_b.push(a);
        }
    }

    pub fn neighbors(&self, node: u32) -> &[u32] {
        self.adjacency.get(&node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn nodes(&self) -> impl Iterator<Item = u32> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Appends a fresh node with no edges and returns its id, one past the current maximum
    /// node id. Used to attach the exterior pseudo-node during orientation propagation.
    pub fn push_node(&mut self) -> u32 {
        let id = self
            .adjacency
            .keys()
            .copied()
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);
        self.adjacency.insert(id, Vec::new());
        id
    }

    /// Removes a node and all edges referencing it. Used to detach the exterior pseudo-node
    /// again once a component's propagation has completed.
    pub fn remove_node(&mut self, node: u32) {
        if let Some(neighbors) = self.adjacency.remove(&node) {
            for n in neighbors {
                if let Some(list) = self.adjacency.get_mut(&n) {
                    list.retain(|&x| x != node);
                }
            }
        }
    }

    /// Splits the graph into connected components via breadth-first search, returning each
    /// component as a sorted vector of node ids. Pseudo-nodes, if any remain attached, are
    /// included in whichever component they belong to.
    pub fn connected_components(&self) -> Vec<Vec<u32>> {
        let mut visited = std::collections::HashSet::new();
        let mut components = Vec::new();

        let mut node_ids: Vec<u32> = self.adjacency.keys().copied().collect();
        node_ids.sort_unstable();

        for &start in &node_ids {
            if visited.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = std::collections::VecDeque::new();
            queue.push_back(start);
            visited.insert(start);
            while let Some(node) = queue.pop_front() {
                component.push(node);
                for &neighbor in self.neighbors(node) {
                    if visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_split_disjoint_groups() {
        let mut g = NeighborhoodGraph::with_nodes(6);
        g.insert_edge(0, 1);
        g.insert_edge(1, 2);
        g.insert_edge(3, 4);
        let components = g.connected_components();
        assert_eq!(components.len(), 3);
        assert!(components.contains(&vec![0, 1, 2]));
        assert!(components.contains(&vec![3, 4]));
        assert!(components.contains(&vec![5]));
    }

    #[test]
    fn pseudo_node_push_and_remove_round_trips() {
        let mut g = NeighborhoodGraph::with_nodes(3);
        let pseudo = g.push_node();
        assert_eq!(pseudo, 3);
        g.insert_edge(0, pseudo);
        assert!(g.neighbors(0).contains(&pseudo));
        g.remove_node(pseudo);
        assert!(!g.neighbors(0).contains(&pseudo));
        assert_eq!(g.node_count(), 3);
    }
}
