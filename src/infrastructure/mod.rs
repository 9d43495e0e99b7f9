// Infrastructure implementations: file-backed event sources and output writing.

pub mod event_log;
pub mod output;

pub use event_log::JsonLinesEventSource;
pub use output::OutputWriter;
