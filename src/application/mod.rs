//! Use-case orchestration: drive an event source into the tracer state and
//! write every output artifact for the run.

use anyhow::{Context, Result};

use crate::domain::event::TraceEvent;
use crate::domain::tracer::{TracerConfig, TracerState};
use crate::infrastructure::OutputWriter;
use crate::ports::{EventSource, GraphExporter, TraceExporter};

/// What one replay produced, for reporting.
pub struct RunOutcome {
    pub events: u64,
    pub traces: usize,
    pub dependency_edges: usize,
    pub error_code: i32,
}

pub struct ReplayUsecase<'a> {
    pub trace_exporter: &'a dyn TraceExporter,
    pub graph_exporter: &'a dyn GraphExporter,
}

impl<'a> ReplayUsecase<'a> {
    /// Consume the source to exhaustion, finalize, and export.
    ///
    /// A log that ends without a process-exit event gets a synthetic clean one,
    /// so truncated recordings still produce complete outputs.
    pub fn run(&self, source: &mut dyn EventSource, config: TracerConfig) -> Result<RunOutcome> {
        let mut state = TracerState::new(config);
        while let Some(event) = source.next_event()? {
            state.handle(&event);
            if state.exit_code().is_some() {
                break;
            }
        }
        if state.exit_code().is_none() {
            state.handle(&TraceEvent::ProcessExit { error_code: 0 });
        }
        self.finish(&state)
    }

    /// Export everything for an already-finalized state.
    pub fn finish(&self, state: &TracerState) -> Result<RunOutcome> {
        let error_code = state.exit_code().unwrap_or(0);
        let writer = OutputWriter::new(state.config())?;
        writer.write_configuration(state.config())?;
        writer
            .write_traces(state, self.trace_exporter)
            .context("Trace catalogue export failed")?;
        writer
            .write_dependency_graph(state, self.graph_exporter)
            .context("Dependency graph export failed")?;
        writer.write_status_marker(error_code)?;

        Ok(RunOutcome {
            events: state.events_processed(),
            traces: state.catalogue().len(),
            dependency_edges: state.dependencies().edge_count(),
            error_code,
        })
    }
}
