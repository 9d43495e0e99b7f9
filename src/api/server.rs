//! TCP event ingest: line-delimited JSON events, one ack line per event.
//!
//! Event ordering, not throughput, is the correctness requirement, so every
//! connection handler funnels through one coarse lock around the tracer state.
//! A process-exit event finalizes the session, writes every output artifact,
//! and answers with the session summary.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use serde_json::json;

use crate::api::dto::SessionSummaryDto;
use crate::application::ReplayUsecase;
use crate::domain::event::TraceEvent;
use crate::domain::tracer::{TracerConfig, TracerState};
use crate::ports::depgraph_exporter::TextGraphExporter;
use crate::ports::trace_exporter::CsvTraceExporter;

pub fn start_server(port: u16, config: TracerConfig) -> Result<()> {
    let address = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&address)
        .with_context(|| format!("Failed to bind to {}", address))?;

    println!("[thunktrace] Event ingest listening on {}", address);

    let state = Arc::new(Mutex::new(TracerState::new(config)));

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, state) {
                        eprintln!("[API] Connection error: {}", e);
                    }
                });
            }
            Err(e) => eprintln!("[API] Accept error: {}", e),
        }
    }

    Ok(())
}

fn handle_connection(mut stream: TcpStream, state: Arc<Mutex<TracerState>>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match process_line(trimmed, &state) {
            Ok(data) => json!({
                "status": "success",
                "data": data
            }),
            Err(e) => json!({
                "status": "error",
                "message": e.to_string()
            }),
        };

        let response_str = serde_json::to_string(&response)?;
        stream.write_all(response_str.as_bytes())?;
        stream.write_all(b"\n")?;
    }
    Ok(())
}

fn process_line(json_str: &str, state: &Arc<Mutex<TracerState>>) -> Result<serde_json::Value> {
    let event: TraceEvent =
        serde_json::from_str(json_str).context("Invalid event JSON")?;

    let mut guard = state
        .lock()
        .map_err(|_| anyhow::anyhow!("Tracer state lock poisoned"))?;
    if guard.exit_code().is_some() {
        anyhow::bail!("Session already finalized");
    }

    let finalizing = matches!(event, TraceEvent::ProcessExit { .. });
    guard.handle(&event);

    if finalizing {
        let usecase = ReplayUsecase {
            trace_exporter: &CsvTraceExporter,
            graph_exporter: &TextGraphExporter,
        };
        let outcome = usecase.finish(&guard)?;
        println!(
            "[API] Session finalized: {} events, {} traces, {} edges",
            outcome.events, outcome.traces, outcome.dependency_edges
        );
        return Ok(serde_json::to_value(SessionSummaryDto::from(&*guard))?);
    }
    Ok(json!("ACK"))
}
