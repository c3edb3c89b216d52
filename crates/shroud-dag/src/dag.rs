//! The metadata DAG and its history queries.
//!
//! [`Dag`] stores vertices in a [`HashMap`] keyed by id, keeps the
//! insertion order (always a topological order), a forward-edge index
//! (`children`) and the current tips.
//!
//! # Invariants
//!
//! - The graph is acyclic: a vertex can only reference vertices that
//!   already exist.
//! - Vertex ids are unique; inserting an existing id is a no-op.
//! - `tips` is exactly the set of vertices without children.

use std::collections::{BTreeSet, HashMap, HashSet};

use shroud_types::VertexId;
use tracing::debug;

use crate::error::{DagError, DagResult};
use crate::vertex::{DagEdge, DagVertex};

/// Outcome of inserting a vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// The vertex was new and is now part of the DAG.
    Added(VertexId),
    /// A vertex with the same id already existed; nothing changed.
    Duplicate(VertexId),
}

impl Insertion {
    pub fn id(&self) -> VertexId {
        match self {
            Insertion::Added(id) | Insertion::Duplicate(id) => *id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Insertion::Duplicate(_))
    }
}

/// Append-only, content-addressed graph of change-set vertices.
#[derive(Clone, Debug, Default)]
pub struct Dag {
    /// Vertex ids in insertion order.
    order: Vec<VertexId>,
    vertices: HashMap<VertexId, DagVertex>,
    /// Forward-edge index: parent -> children.
    children: HashMap<VertexId, Vec<VertexId>>,
    tips: BTreeSet<VertexId>,
}

impl PartialEq for Dag {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices
    }
}

impl Eq for Dag {}

impl Dag {
    /// Create an empty DAG.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &VertexId) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn get(&self, id: &VertexId) -> Option<&DagVertex> {
        self.vertices.get(id)
    }

    /// Current frontier: vertices with no children.
    pub fn tips(&self) -> &BTreeSet<VertexId> {
        &self.tips
    }

    /// All vertices in insertion order. Parents always precede children.
    pub fn vertices(&self) -> impl Iterator<Item = &DagVertex> {
        self.order.iter().filter_map(|id| self.vertices.get(id))
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Append a payload as a child of every current tip.
    ///
    /// Any parents already on `vertex` are replaced by the current tips.
    /// If the resulting id already exists the DAG is left unchanged.
    /// Otherwise the new vertex becomes the only tip.
    pub fn add_reduced(&mut self, vertex: DagVertex) -> Insertion {
        let reduced = DagVertex::with_parents(vertex.payload().to_vec(), self.tips.clone());
        if self.vertices.contains_key(&reduced.id()) {
            return Insertion::Duplicate(reduced.id());
        }
        self.attach(reduced)
    }

    /// Insert a vertex with explicit parents.
    ///
    /// Every parent must already be present. Re-inserting an existing id is
    /// reported as [`Insertion::Duplicate`] and changes nothing.
    pub fn insert(&mut self, vertex: DagVertex) -> DagResult<Insertion> {
        let id = vertex.id();
        if self.vertices.contains_key(&id) {
            return Ok(Insertion::Duplicate(id));
        }

        for parent in vertex.parents() {
            if !self.vertices.contains_key(parent) {
                return Err(DagError::DanglingParent {
                    vertex: id,
                    parent: *parent,
                });
            }
        }

        Ok(self.attach(vertex))
    }

    /// Link a new vertex whose parents are known to exist.
    fn attach(&mut self, vertex: DagVertex) -> Insertion {
        let id = vertex.id();
        for parent in vertex.parents() {
            self.children.entry(*parent).or_default().push(id);
            self.tips.remove(parent);
        }
        self.tips.insert(id);

        debug!(
            vertex = %id.short_hex(),
            parents = vertex.parents().len(),
            bytes = vertex.payload().len(),
            "added DAG vertex"
        );
        self.order.push(id);
        self.vertices.insert(id, vertex);
        Insertion::Added(id)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Edges from each recorded parent of `id` to `id`.
    ///
    /// For a vertex appended with [`add_reduced`](Self::add_reduced) these
    /// are the tips at the moment it was inserted.
    pub fn parent_edges(&self, id: &VertexId) -> DagResult<Vec<DagEdge>> {
        let vertex = self
            .vertices
            .get(id)
            .ok_or(DagError::VertexNotFound(*id))?;
        Ok(vertex
            .parents()
            .iter()
            .map(|parent| DagEdge {
                parent: *parent,
                child: *id,
            })
            .collect())
    }

    /// Every edge of the graph, in insertion order of the children.
    pub fn edges(&self) -> Vec<DagEdge> {
        self.vertices()
            .flat_map(|v| {
                v.parents().iter().map(move |parent| DagEdge {
                    parent: *parent,
                    child: v.id(),
                })
            })
            .collect()
    }

    /// `id` and all of its ancestors.
    pub fn ancestors_inclusive(&self, id: &VertexId) -> DagResult<HashSet<VertexId>> {
        if !self.vertices.contains_key(id) {
            return Err(DagError::VertexNotFound(*id));
        }
        let mut seen = HashSet::new();
        let mut stack = vec![*id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(v) = self.vertices.get(&current) {
                stack.extend(v.parents().iter().copied());
            }
        }
        Ok(seen)
    }

    /// Deterministic topological order of a closed-under-parents subset.
    ///
    /// Kahn's algorithm; among ready vertices the smallest id goes first, so
    /// two DAGs holding the same vertices always agree on the order.
    fn canonical_order(&self, subset: &HashSet<VertexId>) -> Vec<VertexId> {
        let mut in_degree: HashMap<VertexId, usize> = HashMap::new();
        let mut ready = BTreeSet::new();
        for id in subset {
            let degree = self.vertices.get(id).map_or(0, |v| v.parents().len());
            if degree == 0 {
                ready.insert(*id);
            }
            in_degree.insert(*id, degree);
        }

        let mut result = Vec::with_capacity(subset.len());
        while let Some(current) = ready.pop_first() {
            result.push(current);
            if let Some(children) = self.children.get(&current) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(*child);
                        }
                    }
                }
            }
        }
        result
    }

    /// Hash chain over the history of `id`.
    ///
    /// Folds `acc = hash(acc ‖ vertex_id)` over `id` and its ancestors in
    /// canonical topological order, starting from 32 zero bytes. This is the
    /// value a write signs: the same vertex at a different position in the
    /// history yields a different digest.
    pub fn digest<H>(&self, id: &VertexId, hash: H) -> DagResult<[u8; 32]>
    where
        H: Fn(&[u8]) -> [u8; 32],
    {
        let ancestors = self.ancestors_inclusive(id)?;
        let mut acc = [0u8; 32];
        let mut buf = [0u8; 64];
        for vertex in self.canonical_order(&ancestors) {
            buf[..32].copy_from_slice(&acc);
            buf[32..].copy_from_slice(vertex.as_bytes());
            acc = hash(&buf);
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_crypto::sha256;

    fn payload(n: u8) -> DagVertex {
        DagVertex::new(vec![n; 4])
    }

    fn linear(n: u8) -> (Dag, Vec<VertexId>) {
        let mut dag = Dag::new();
        let ids = (0..n).map(|i| dag.add_reduced(payload(i)).id()).collect();
        (dag, ids)
    }

    #[test]
    fn add_reduced_moves_the_tip() {
        let (dag, ids) = linear(3);
        assert_eq!(dag.len(), 3);
        assert_eq!(dag.tips().iter().copied().collect::<Vec<_>>(), vec![ids[2]]);
        assert!(dag.get(&ids[0]).unwrap().is_root());
        assert_eq!(
            dag.get(&ids[2]).unwrap().parents().iter().copied().collect::<Vec<_>>(),
            vec![ids[1]]
        );
    }

    #[test]
    fn reinserting_existing_vertex_is_duplicate() {
        let mut dag = Dag::new();
        let first = dag.add_reduced(payload(1));
        assert!(!first.is_duplicate());
        // Same payload on top of a different tip set is a different vertex.
        let second = dag.add_reduced(payload(1));
        assert_ne!(first.id(), second.id());

        let mut other = dag.clone();
        let v = dag.get(&second.id()).unwrap().clone();
        assert_eq!(other.insert(v).unwrap(), Insertion::Duplicate(second.id()));
        assert_eq!(other.len(), 2);
    }

    #[test]
    fn payload_ending_in_a_parent_id_is_a_new_vertex() {
        let mut dag = Dag::new();
        let root = dag.add_reduced(DagVertex::new(b"p".to_vec())).id();
        let mut flat_payload = b"p".to_vec();
        flat_payload.extend_from_slice(root.as_bytes());

        let child = dag.insert(DagVertex::with_parents(b"p".to_vec(), [root].into())).unwrap();
        let flat = dag.insert(DagVertex::new(flat_payload)).unwrap();
        assert!(!child.is_duplicate());
        assert!(!flat.is_duplicate());
        assert_eq!(dag.len(), 3);
    }

    #[test]
    fn insert_rejects_dangling_parent() {
        let mut dag = Dag::new();
        let missing = VertexId::from_hash([9; 32]);
        let v = DagVertex::with_parents(vec![1], [missing].into());
        let err = dag.insert(v).unwrap_err();
        assert!(matches!(err, DagError::DanglingParent { parent, .. } if parent == missing));
        assert!(dag.is_empty());
    }

    #[test]
    fn concurrent_branches_produce_multiple_tips() {
        let mut dag = Dag::new();
        let root = dag.add_reduced(payload(0)).id();
        let a = dag
            .insert(DagVertex::with_parents(vec![1], [root].into()))
            .unwrap()
            .id();
        let b = dag
            .insert(DagVertex::with_parents(vec![2], [root].into()))
            .unwrap()
            .id();
        assert_eq!(dag.tips().len(), 2);

        let merged = dag.add_reduced(payload(3)).id();
        let parents: Vec<_> = dag.get(&merged).unwrap().parents().iter().copied().collect();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(parents, expected);
        assert_eq!(dag.tips().len(), 1);
    }

    #[test]
    fn parent_edges_are_tips_at_insertion() {
        let (mut dag, ids) = linear(2);
        let edges = dag.parent_edges(&ids[1]).unwrap();
        assert_eq!(
            edges,
            vec![DagEdge {
                parent: ids[0],
                child: ids[1]
            }]
        );
        assert!(dag.parent_edges(&ids[0]).unwrap().is_empty());
        let third = dag.add_reduced(payload(7)).id();
        assert_eq!(dag.parent_edges(&third).unwrap()[0].parent, ids[1]);
        assert_eq!(dag.edges().len(), 2);
    }

    #[test]
    fn parent_edges_of_unknown_vertex() {
        let dag = Dag::new();
        let id = VertexId::from_hash([1; 32]);
        assert_eq!(dag.parent_edges(&id), Err(DagError::VertexNotFound(id)));
    }

    #[test]
    fn digest_binds_history_position() {
        let (dag, ids) = linear(3);
        let d1 = dag.digest(&ids[1], sha256).unwrap();
        let d2 = dag.digest(&ids[2], sha256).unwrap();
        assert_ne!(d1, d2);

        // The same payload appended to a different history digests differently.
        let mut other = Dag::new();
        other.add_reduced(payload(9));
        let moved = other.add_reduced(payload(0)).id();
        assert_ne!(other.digest(&moved, sha256).unwrap(), dag.digest(&ids[0], sha256).unwrap());
    }

    #[test]
    fn digest_is_a_hash_chain_from_zero() {
        let (dag, ids) = linear(2);
        let mut acc = [0u8; 32];
        for id in &ids {
            let mut buf = acc.to_vec();
            buf.extend_from_slice(id.as_bytes());
            acc = sha256(&buf);
        }
        assert_eq!(dag.digest(&ids[1], sha256).unwrap(), acc);
    }

    #[test]
    fn digest_ignores_unrelated_branches() {
        let mut dag = Dag::new();
        let root = dag.add_reduced(payload(0)).id();
        let a = dag
            .insert(DagVertex::with_parents(vec![1], [root].into()))
            .unwrap()
            .id();
        let before = dag.digest(&a, sha256).unwrap();
        dag.insert(DagVertex::with_parents(vec![2], [root].into()))
            .unwrap();
        assert_eq!(dag.digest(&a, sha256).unwrap(), before);
    }

    #[test]
    fn vertices_iterate_in_insertion_order() {
        let (dag, ids) = linear(4);
        let order: Vec<_> = dag.vertices().map(|v| v.id()).collect();
        assert_eq!(order, ids);
    }
}
