use crate::domain::catalogue::FingerprintCatalogue;
use crate::domain::depgraph::DependencyGraph;
use crate::domain::event::TraceEvent;

pub mod depgraph_exporter;
pub mod trace_exporter;

/// Where events come from: a recorded log, a socket, a test vector.
pub trait EventSource {
    /// Next event in order, or `None` at end of stream.
    fn next_event(&mut self) -> anyhow::Result<Option<TraceEvent>>;
}

pub trait TraceExporter {
    fn export(
        &self,
        catalogue: &FingerprintCatalogue,
        package_being_analyzed: &str,
        path: &str,
    ) -> std::io::Result<()>;
}

pub trait GraphExporter {
    fn export(&self, graph: &DependencyGraph, path: &str) -> std::io::Result<()>;
}
