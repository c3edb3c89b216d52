use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use shroud_crypto::ContentHasher;
use shroud_types::codec::{put_frame, put_u32, ByteReader};
use shroud_types::VertexId;

use crate::error::{DagError, DagResult};

/// An immutable, content-addressed DAG vertex holding one encrypted
/// change-set.
///
/// The id is computed from the payload and the sorted parent ids at
/// construction, so a vertex can never carry an id that does not match its
/// contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagVertex {
    id: VertexId,
    payload: Vec<u8>,
    parents: BTreeSet<VertexId>,
}

impl DagVertex {
    /// A vertex with no parents yet; [`Dag::add_reduced`](crate::Dag::add_reduced)
    /// attaches it to the current tips.
    pub fn new(payload: Vec<u8>) -> Self {
        Self::with_parents(payload, BTreeSet::new())
    }

    pub fn with_parents(payload: Vec<u8>, parents: BTreeSet<VertexId>) -> Self {
        let id = compute_id(&payload, &parents);
        Self {
            id,
            payload,
            parents,
        }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn parents(&self) -> &BTreeSet<VertexId> {
        &self.parents
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Standalone wire form: `u32 len ‖ payload ‖ u32 count ‖ parent ids`.
    pub fn to_binary(&self) -> DagResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(8 + self.payload.len() + self.parents.len() * VertexId::SIZE);
        put_frame(&mut buf, &self.payload)?;
        put_u32(&mut buf, self.parents.len() as u32);
        for parent in &self.parents {
            buf.extend_from_slice(parent.as_bytes());
        }
        Ok(buf)
    }

    pub fn from_binary(data: &[u8]) -> DagResult<Self> {
        let mut r = ByteReader::new(data);
        let payload = r.frame()?.to_vec();
        let count = r.u32()? as usize;
        let mut parents = BTreeSet::new();
        for _ in 0..count {
            let id = VertexId::from_slice(r.take(VertexId::SIZE)?)?;
            if !parents.insert(id) {
                return Err(DagError::Parse(format!("repeated parent {id:?}")));
            }
        }
        r.finish()?;
        Ok(Self::with_parents(payload, parents))
    }
}

/// Vertex id: domain-separated hash over `u64 payload_len ‖ payload ‖
/// u64 parent_count ‖ parent ids` with parents in ascending order. The
/// length prefixes keep payload bytes from passing as a parent id.
fn compute_id(payload: &[u8], parents: &BTreeSet<VertexId>) -> VertexId {
    let payload_len = (payload.len() as u64).to_be_bytes();
    let parent_count = (parents.len() as u64).to_be_bytes();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(3 + parents.len());
    parts.push(&payload_len);
    parts.push(payload);
    parts.push(&parent_count);
    for parent in parents {
        parts.push(parent.as_bytes());
    }
    ContentHasher::VERTEX.hash_id(&parts)
}

/// A parent → child edge, sent to the server alongside each new vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DagEdge {
    pub parent: VertexId,
    pub child: VertexId,
}

impl DagEdge {
    pub const SIZE: usize = VertexId::SIZE * 2;

    /// `parent ‖ child`.
    pub fn to_binary(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..VertexId::SIZE].copy_from_slice(self.parent.as_bytes());
        out[VertexId::SIZE..].copy_from_slice(self.child.as_bytes());
        out
    }

    pub fn from_binary(data: &[u8]) -> DagResult<Self> {
        if data.len() != Self::SIZE {
            return Err(DagError::Parse(format!(
                "edge must be {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        }
        Ok(Self {
            parent: VertexId::from_slice(&data[..VertexId::SIZE])?,
            child: VertexId::from_slice(&data[VertexId::SIZE..])?,
        })
    }
}
