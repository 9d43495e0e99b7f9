//! Value-Flow Dependency Graph
//!
//! Links the sites (function, parameter position) where a value has appeared.
//! Two maps with different lifetimes: the live-sites map tracks where a value
//! currently lives and is erased when the host reclaims it; the edge map is
//! accumulated history and is never erased. Separating the two lets a reclaimed
//! value's identity be reused by an unrelated successor without linking the two.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::fingerprint::{FunctionId, RETURN_SLOT};
use crate::domain::hashing::{TraceHash, NO_TRACE_HASH};

/// Host identity of an observed value. Opaque to the engine; may be reused by
/// the host after a reclaim.
pub type ValueId = u64;

/// "This value appeared as parameter `param_pos` of `function_id`", with the
/// call's fingerprint hash optionally attached (0 = none).
///
/// Total ordering (function id, then position, then hash) keeps serialization
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyNode {
    pub function_id: FunctionId,
    pub param_pos: i32,
    pub trace_hash: TraceHash,
}

impl DependencyNode {
    pub fn new(function_id: FunctionId, param_pos: i32) -> Self {
        DependencyNode {
            function_id,
            param_pos,
            trace_hash: NO_TRACE_HASH,
        }
    }

    pub fn with_trace(function_id: FunctionId, param_pos: i32, trace_hash: TraceHash) -> Self {
        DependencyNode {
            function_id,
            param_pos,
            trace_hash,
        }
    }
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Sites currently holding a live value. Erased on reclaim.
    live_sites: HashMap<ValueId, BTreeSet<DependencyNode>>,
    /// Accumulated edges, newer observation -> prior observation. Monotonic.
    edges: BTreeMap<DependencyNode, BTreeSet<DependencyNode>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    /// Record a value appearing at a site.
    ///
    /// An edge is drawn from the new site to every site currently holding the
    /// value, before the new site joins the live set: the flow history points
    /// from each observation back to the value's prior observations.
    pub fn record_argument(&mut self, value: ValueId, node: DependencyNode) {
        let sites = self.live_sites.entry(value).or_default();
        for prior in sites.iter() {
            self.edges
                .entry(node.clone())
                .or_default()
                .insert(prior.clone());
        }
        sites.insert(node);
    }

    /// Record a value being returned from a call, with the call's fingerprint
    /// hash attached so downstream consumers can tie the flow to a call shape.
    pub fn record_return(
        &mut self,
        value: ValueId,
        function_id: FunctionId,
        trace_hash: TraceHash,
    ) {
        self.record_argument(
            value,
            DependencyNode::with_trace(function_id, RETURN_SLOT, trace_hash),
        );
    }

    /// The host reclaimed a value: drop its live sites. Accumulated edges stay,
    /// so history survives garbage collection, but a later value reusing the
    /// same identity starts from a clean slate.
    pub fn forget(&mut self, value: ValueId) {
        self.live_sites.remove(&value);
    }

    pub fn edges(&self) -> &BTreeMap<DependencyNode, BTreeSet<DependencyNode>> {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|dsts| dsts.len()).sum()
    }
}
