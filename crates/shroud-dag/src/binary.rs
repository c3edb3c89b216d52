//! Compact binary form of a whole DAG.
//!
//! ```text
//! "SDAG" | version: u8 | count: u32
//! per vertex: payload_len: u32 | payload | parent_count: u32 | parent_index: u32 ...
//! ```
//!
//! Vertices are written in insertion order and parents are referenced by
//! index. Every parent index must be smaller than the index of the vertex
//! that refers to it, which makes the format acyclic by construction.

use std::collections::{BTreeSet, HashMap};

use shroud_types::codec::{put_frame, put_u32, ByteReader};

use crate::dag::{Dag, Insertion};
use crate::error::{DagError, DagResult};
use crate::vertex::DagVertex;

const MAGIC: &[u8; 4] = b"SDAG";
const VERSION: u8 = 1;

impl Dag {
    /// Serialize every vertex with parent back-references by index.
    pub fn to_binary(&self) -> DagResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        put_u32(&mut buf, self.len() as u32);

        let mut index = HashMap::with_capacity(self.len());
        for (i, vertex) in self.vertices().enumerate() {
            put_frame(&mut buf, vertex.payload())?;
            put_u32(&mut buf, vertex.parents().len() as u32);
            for parent in vertex.parents() {
                let parent_index = index
                    .get(parent)
                    .copied()
                    .ok_or(DagError::VertexNotFound(*parent))?;
                put_u32(&mut buf, parent_index);
            }
            index.insert(vertex.id(), i as u32);
        }
        Ok(buf)
    }

    /// Parse a DAG written by [`to_binary`](Self::to_binary).
    ///
    /// Any malformation (truncation, unknown magic or version, forward
    /// parent references, repeated vertices, trailing bytes) is a
    /// [`DagError::Parse`].
    pub fn from_binary(data: &[u8]) -> DagResult<Dag> {
        let mut r = ByteReader::new(data);
        if r.take(MAGIC.len())? != MAGIC {
            return Err(DagError::Parse("bad magic".into()));
        }
        let version = r.u8()?;
        if version != VERSION {
            return Err(DagError::Parse(format!("unsupported version {version}")));
        }

        let count = r.u32()? as usize;
        let mut dag = Dag::new();
        let mut ids = Vec::new();
        for i in 0..count {
            let payload = r.frame()?.to_vec();
            let parent_count = r.u32()? as usize;
            let mut parents = BTreeSet::new();
            for _ in 0..parent_count {
                let parent_index = r.u32()? as usize;
                if parent_index >= i {
                    return Err(DagError::Parse(format!(
                        "vertex {i} references parent {parent_index} that does not precede it"
                    )));
                }
                parents.insert(ids[parent_index]);
            }
            match dag.insert(DagVertex::with_parents(payload, parents))? {
                Insertion::Added(id) => ids.push(id),
                Insertion::Duplicate(id) => {
                    return Err(DagError::Parse(format!("vertex {id:?} appears twice")));
                }
            }
        }
        r.finish()?;
        Ok(dag)
    }
}
