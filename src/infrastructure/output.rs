//! Output Directory Writer
//!
//! Owns the layout of one run's output directory: the catalogue CSV, the
//! dependency graph, the configuration dump, and the exit-status marker.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::domain::tracer::{TracerConfig, TracerState};
use crate::ports::{GraphExporter, TraceExporter};

pub struct OutputWriter {
    directory: PathBuf,
}

impl OutputWriter {
    pub fn new(config: &TracerConfig) -> Result<Self> {
        fs::create_dir_all(&config.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                config.output_dir.display()
            )
        })?;
        Ok(OutputWriter {
            directory: config.output_dir.clone(),
        })
    }

    pub fn write_traces(
        &self,
        state: &TracerState,
        exporter: &dyn TraceExporter,
    ) -> Result<PathBuf> {
        let path = self
            .directory
            .join(format!("traces_{}.txt", state.config().analyzed_file_name));
        exporter
            .export(
                state.catalogue(),
                &state.config().package_under_analysis,
                &path.to_string_lossy(),
            )
            .with_context(|| format!("Failed to write trace catalogue: {}", path.display()))?;
        Ok(path)
    }

    pub fn write_dependency_graph(
        &self,
        state: &TracerState,
        exporter: &dyn GraphExporter,
    ) -> Result<PathBuf> {
        let path = self.directory.join(format!(
            "dependency_graph_{}.txt",
            state.config().analyzed_file_name
        ));
        exporter
            .export(state.dependencies(), &path.to_string_lossy())
            .with_context(|| format!("Failed to write dependency graph: {}", path.display()))?;
        Ok(path)
    }

    /// `key=value` dump of the run's settings.
    pub fn write_configuration(&self, config: &TracerConfig) -> Result<()> {
        let content = format!(
            "output_dir={}\n\
             package_under_analysis={}\n\
             analyzed_file_name={}\n\
             verbose={}\n\
             truncate={}\n\
             binary={}\n\
             compression_level={}\n",
            config.output_dir.display(),
            config.package_under_analysis,
            config.analyzed_file_name,
            config.verbose,
            config.truncate,
            config.binary,
            config.compression_level,
        );
        let path = self.directory.join("CONFIGURATION");
        fs::write(&path, content)
            .with_context(|| format!("Failed to write configuration dump: {}", path.display()))
    }

    /// Zero-byte `ERROR` or `NOERROR` marker, by exit status. A stale marker
    /// of the opposite kind from a previous run is removed.
    pub fn write_status_marker(&self, error_code: i32) -> Result<()> {
        let (marker, stale) = if error_code == 0 {
            ("NOERROR", "ERROR")
        } else {
            ("ERROR", "NOERROR")
        };
        let stale_path = self.directory.join(stale);
        if stale_path.exists() {
            fs::remove_file(&stale_path)
                .with_context(|| format!("Failed to remove stale marker: {}", stale_path.display()))?;
        }
        let path = self.directory.join(marker);
        fs::write(&path, b"")
            .with_context(|| format!("Failed to write status marker: {}", path.display()))
    }
}
