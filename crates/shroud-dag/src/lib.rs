//! Content-addressed DAG of encrypted change-sets.
//!
//! Every metadata document is stored remotely as a [`Dag`]: an append-only
//! graph whose vertices each carry one encrypted change-set. Vertex ids are
//! hashes of their payload and parents, so identical writes deduplicate. A
//! write signs [`Dag::digest`], which binds the vertex to its full history.

pub mod binary;
pub mod dag;
pub mod error;
pub mod vertex;

pub use dag::{Dag, Insertion};
pub use error::{DagError, DagResult};
pub use vertex::{DagEdge, DagVertex};
