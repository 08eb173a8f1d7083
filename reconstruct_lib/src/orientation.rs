//! Consistent orientation propagation across the neighborhood graph.
//!
//! Each connected component of the neighborhood graph is anchored with a synthetic exterior
//! pseudo-node connected to its highest sample, spanned with a minimum spanning tree weighted
//! by normal disagreement, and walked outward from the pseudo-node to flip every tangent
//! normal into a single consistent orientation.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::info;
use thiserror::Error;

use crate::graph::NeighborhoodGraph;
use crate::numeric_types::Real;
use crate::tangent_plane::TangentFrame;

#[derive(Debug, Error)]
pub enum OrientationError {
    #[error("orientation propagation left sample {0} unoriented")]
    UnorientedAfterPropagation(u32),
}

/// Per-sample progress through orientation propagation, forward-only. Purely a diagnostic
/// overlay on top of the `oriented: Vec<bool>` array that actually drives the algorithm's
/// post-condition check — every transition is asserted via [`OrientationState::advance_to`]
/// so a regression in component discovery, MST construction, or DFS traversal that revisits
/// or skips a sample trips a `debug_assert!` instead of silently producing a wrong mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OrientationState {
    Unseen,
    InComponent,
    TreeNode,
    Oriented,
}

impl OrientationState {
    fn advance_to(&mut self, next: OrientationState) {
        use OrientationState::*;
        debug_assert!(
            matches!(
                (*self, next),
                (Unseen, InComponent) | (InComponent, TreeNode) | (TreeNode, Oriented)
            ),
            "invalid orientation state transition: {:?} -> {:?}",
            self,
            next
        );
        *self = next;
    }
}

/// Orients every tangent frame in place so that normals are consistent across each connected
/// component of `graph`. Returns an error naming the first sample left unoriented, which would
/// indicate a bug in how the neighborhood graph was constructed (every node discovered by BFS
/// is expected to be spanned by the component's minimum spanning tree).
pub fn propagate_orientation<R: Real>(
    graph: &mut NeighborhoodGraph,
    frames: &mut [TangentFrame<R>],
) -> Result<(), OrientationError> {
    let mut oriented = vec![false; frames.len()];
    let mut states = vec![OrientationState::Unseen; frames.len()];
    let components = graph.connected_components();

    for component in components {
        if component.is_empty() {
            continue;
        }
        for &node in &component {
            states[node as usize].advance_to(OrientationState::InComponent);
        }
        orient_component(graph, frames, &component, &mut oriented, &mut states);
    }

    for (i, &is_oriented) in oriented.iter().enumerate() {
        if !is_oriented {
            return Err(OrientationError::UnorientedAfterPropagation(i as u32));
        }
        debug_assert_eq!(states[i], OrientationState::Oriented);
    }

    Ok(())
}

fn corr<R: Real>(a_normal: Option<&nalgebra::Vector3<R>>, b_normal: &nalgebra::Vector3<R>) -> R {
    match a_normal {
        None => R::one(),
        Some(a) => R::from(2.0).unwrap() - a.dot(b_normal).abs(),
    }
}

fn orient_component<R: Real>(
    graph: &mut NeighborhoodGraph,
    frames: &mut [TangentFrame<R>],
    component: &[u32],
    oriented: &mut [bool],
    states: &mut [OrientationState],
) {
    let anchor = *component
        .iter()
        .max_by(|&&a, &&b| {
            frames[a as usize]
                .origin
                .z
                .partial_cmp(&frames[b as usize].origin.z)
                .unwrap_or(Ordering::Equal)
        })
        .expect("component is non-empty");

    let pseudo = graph.push_node();
    graph.insert_edge(anchor, pseudo);

    let tree_children = prim_mst(graph, frames, component, pseudo, states);

    // Explicit-stack depth-first traversal rooted at the pseudo-node: an unbounded component
    // must not be walked recursively.
    let mut pseudo_out_degree = 0usize;
    let mut stack: Vec<(Option<u32>, u32)> = Vec::new();
    if let Some(children) = tree_children.get(&pseudo) {
        pseudo_out_degree = children.len();
        for &child in children {
            stack.push((None, child));
        }
    }
    if pseudo_out_degree > 1 {
        info!(
            "orientation propagation: exterior pseudo-node has {} tree children, expected 1",
            pseudo_out_degree
        );
    }

    while let Some((parent, node)) = stack.pop() {
        match parent {
            None => {
                // Direct child of the pseudo-node: orient so that its z component is
                // non-negative, i.e. "outward" relative to the anchor chosen above.
                if frames[node as usize].normal.z < R::zero() {
                    frames[node as usize].normal = -frames[node as usize].normal;
                }
            }
            Some(parent) => {
                let d = frames[parent as usize].normal.dot(&frames[node as usize].normal);
                if d < R::zero() {
                    frames[node as usize].normal = -frames[node as usize].normal;
                }
            }
        }
        oriented[node as usize] = true;
        states[node as usize].advance_to(OrientationState::Oriented);

        if let Some(children) = tree_children.get(&node) {
            for &child in children {
                stack.push((Some(node), child));
            }
        }
    }

    graph.remove_node(pseudo);
}

struct HeapEdge<R: Real> {
    weight: R,
    from: u32,
    to: u32,
}

impl<R: Real> PartialEq for HeapEdge<R> {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight && self.key_pair() == other.key_pair()
    }
}
impl<R: Real> Eq for HeapEdge<R> {}

impl<R: Real> HeapEdge<R> {
    fn key_pair(&self) -> (u32, u32) {
        (self.from.min(self.to), self.from.max(self.to))
    }
}

impl<R: Real> PartialOrd for HeapEdge<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R: Real> Ord for HeapEdge<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both comparisons so the smallest weight (and, on
        // ties, the smallest (min-index, max-index) pair) pops first.
        match other.weight.partial_cmp(&self.weight) {
            Some(Ordering::Equal) | None => other.key_pair().cmp(&self.key_pair()),
            Some(ord) => ord,
        }
    }
}

/// Runs Prim's algorithm, seeded at `pseudo`, over the induced subgraph on `component ∪
/// {pseudo}`, weighting edges by [`corr`]. Returns the resulting tree as a parent-to-children
/// adjacency map.
fn prim_mst<R: Real>(
    graph: &NeighborhoodGraph,
    frames: &[TangentFrame<R>],
    component: &[u32],
    pseudo: u32,
    states: &mut [OrientationState],
) -> crate::MapType<u32, Vec<u32>> {
    let mut in_tree = std::collections::HashSet::new();
    let mut children: crate::MapType<u32, Vec<u32>> = crate::new_map();
    let mut heap: BinaryHeap<HeapEdge<R>> = BinaryHeap::new();

    in_tree.insert(pseudo);
    for &n in graph.neighbors(pseudo) {
        heap.push(HeapEdge {
            weight: corr::<R>(None, &frames[n as usize].normal),
            from: pseudo,
            to: n,
        });
    }

    let total_nodes = component.len() + 1;
    while in_tree.len() < total_nodes {
        let edge = match heap.pop() {
            Some(e) => e,
            None => break,
        };
        if in_tree.contains(&edge.to) {
            continue;
        }
        in_tree.insert(edge.to);
        // `edge.to` is always a real component member here, never the pseudo-node: `pseudo` is
        // seeded into `in_tree` before the loop starts, so it can only ever appear as `edge.from`.
        states[edge.to as usize].advance_to(OrientationState::TreeNode);
        children.entry(edge.from).or_insert_with(Vec::new).push(edge.to);

        for &n in graph.neighbors(edge.to) {
            if in_tree.contains(&n) {
                continue;
            }
            let weight = corr::<R>(Some(&frames[edge.to as usize].normal), &frames[n as usize].normal);
            heap.push(HeapEdge {
                weight,
                from: edge.to,
                to: n,
            });
        }
    }

    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn frame(x: f64, y: f64, z: f64, nz: f64) -> TangentFrame<f64> {
        TangentFrame {
            origin: Vector3::new(x, y, z),
            e0: Vector3::x(),
            e1: Vector3::y(),
            normal: Vector3::new(0.0, 0.0, nz),
        }
    }

    #[test]
    fn flat_patch_all_normals_end_up_same_sign() {
        let mut frames = vec![
            frame(0.0, 0.0, 0.0, 1.0),
            frame(1.0, 0.0, 0.0, -1.0),
            frame(0.0, 1.0, 0.0, 1.0),
            frame(1.0, 1.0, 0.0, -1.0),
        ];
        let mut graph = NeighborhoodGraph::with_nodes(4);
        graph.insert_edge(0, 1);
        graph.insert_edge(1, 2);
        graph.insert_edge(2, 3);

        propagate_orientation(&mut graph, &mut frames).unwrap();

        let signs: Vec<bool> = frames.iter().map(|f| f.normal.z > 0.0).collect();
        assert!(signs.iter().all(|&s| s == signs[0]));
    }

    #[test]
    fn disjoint_components_are_each_oriented_independently() {
        let mut frames = vec![
            frame(0.0, 0.0, 0.0, 1.0),
            frame(1.0, 0.0, 0.0, -1.0),
            frame(10.0, 10.0, 0.0, 1.0),
            frame(11.0, 10.0, 0.0, -1.0),
        ];
        let mut graph = NeighborhoodGraph::with_nodes(4);
        graph.insert_edge(0, 1);
        graph.insert_edge(2, 3);

        propagate_orientation(&mut graph, &mut frames).unwrap();

        assert!(frames[0].normal.z > 0.0 && frames[1].normal.z > 0.0);
        assert!(frames[2].normal.z > 0.0 && frames[3].normal.z > 0.0);
    }
}
