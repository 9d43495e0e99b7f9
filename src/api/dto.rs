use serde::{Deserialize, Serialize};

use crate::domain::tracer::TracerState;

/// Summary of one ingest session, returned to clients over the wire.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummaryDto {
    pub events_processed: u64,
    pub distinct_traces: usize,
    pub dependency_edges: usize,
    pub functions_interned: usize,
    pub warnings: u64,
}

impl From<&TracerState> for SessionSummaryDto {
    fn from(state: &TracerState) -> Self {
        SessionSummaryDto {
            events_processed: state.events_processed(),
            distinct_traces: state.catalogue().len(),
            dependency_edges: state.dependencies().edge_count(),
            functions_interned: state.functions_interned(),
            warnings: state.warnings(),
        }
    }
}
