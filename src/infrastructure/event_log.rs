//! JSON-Lines Event Log
//!
//! Replay-mode event source: one JSON object per line, blank lines skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::event::TraceEvent;
use crate::ports::EventSource;

pub struct JsonLinesEventSource {
    reader: BufReader<File>,
    line_number: usize,
    buffer: String,
}

impl JsonLinesEventSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open event log: {}", path.display()))?;
        Ok(JsonLinesEventSource {
            reader: BufReader::new(file),
            line_number: 0,
            buffer: String::new(),
        })
    }
}

impl EventSource for JsonLinesEventSource {
    fn next_event(&mut self) -> Result<Option<TraceEvent>> {
        loop {
            self.buffer.clear();
            let bytes_read = self
                .reader
                .read_line(&mut self.buffer)
                .with_context(|| format!("Failed to read event log line {}", self.line_number + 1))?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = self.buffer.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event: TraceEvent = serde_json::from_str(trimmed)
                .with_context(|| format!("Malformed event at line {}", self.line_number))?;
            return Ok(Some(event));
        }
    }
}
