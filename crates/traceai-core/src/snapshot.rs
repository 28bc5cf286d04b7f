//! Immutable read snapshots (§5): queries run against an `Arc<Graph>`
//! obtained once under the read lock, so a long-running traversal never
//! blocks the writer and never observes a torn graph.

use std::sync::Arc;

use crate::graph::Graph;

/// A cheaply-cloned handle to a graph at a point in time.
#[derive(Clone)]
pub struct Snapshot(Arc<Graph>);

impl Snapshot {
    pub fn new(graph: Arc<Graph>) -> Self {
        Snapshot(graph)
    }

    pub fn graph(&self) -> &Graph {
        &self.0
    }
}

impl std::ops::Deref for Snapshot {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.0
    }
}
