//! Dependency Graph Text Exporter
//!
//! One line per source node: the node, then every node it points back to.
//! A node renders as `fn_id,position` with the fingerprint hash appended when
//! one was attached (return-slot nodes carry it, argument nodes do not).

use std::fmt::Write as _;

use crate::domain::depgraph::{DependencyGraph, DependencyNode};
use crate::domain::hashing::NO_TRACE_HASH;
use crate::ports::GraphExporter;

pub struct TextGraphExporter;

impl TextGraphExporter {
    pub fn to_text(graph: &DependencyGraph) -> String {
        let mut out = String::new();
        for (source, destinations) in graph.edges() {
            Self::push_node(&mut out, source);
            out.push_str(" : ");
            let mut first = true;
            for destination in destinations {
                if !first {
                    out.push_str(" - ");
                }
                first = false;
                Self::push_node(&mut out, destination);
            }
            out.push('\n');
        }
        out
    }

    fn push_node(out: &mut String, node: &DependencyNode) {
        let _ = write!(out, "{},{}", node.function_id, node.param_pos);
        if node.trace_hash != NO_TRACE_HASH {
            let _ = write!(out, ",{}", node.trace_hash);
        }
    }
}

impl GraphExporter for TextGraphExporter {
    fn export(&self, graph: &DependencyGraph, path: &str) -> std::io::Result<()> {
        std::fs::write(path, Self::to_text(graph))
    }
}
