//! Phase-organized metrics for the processing pipeline
//!
//! Each pipeline stage owns a submodule defining its metric names and recording
//! helpers. Recording goes through the `metrics` facade and is a no-op unless a
//! recorder has been installed with [`init_metrics`]. Batch runs render the
//! recorder's state to a Prometheus textfile at the end with [`write_textfile`].

pub mod enumerator;
pub mod merge;
pub mod partition;
pub mod registry;

pub use enumerator::EnumeratorMetrics;
pub use merge::MergeMetrics;
pub use partition::PartitionMetrics;

use crate::error::{ProcessorError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and register every phase's metrics.
///
/// Idempotent. Failure to install is logged, not fatal: the pipeline runs the
/// same without metrics.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("Metrics handle was already set");
            }
            registry::register_all_metrics();
            info!("Prometheus recorder installed");
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    });
}

/// Current metrics in Prometheus text exposition format, if a recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

/// Write the rendered metrics to `path`, replacing any previous snapshot.
pub fn write_textfile(path: &Path) -> Result<()> {
    let Some(body) = render() else {
        warn!("Metrics recorder not installed; skipping {}", path.display());
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ProcessorError::write(parent, e))?;
    }
    std::fs::write(path, body).map_err(|e| ProcessorError::write(path, e))?;
    info!("Wrote metrics snapshot to {}", path.display());
    Ok(())
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Attach descriptions to this phase's metrics in the installed recorder.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Builds metric names following `epc_{phase}_{name}[_total]`.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("epc_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("epc_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("epc_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

/// Describe every metric in `docs` to the installed recorder.
pub(crate) fn describe(docs: &[MetricDoc]) {
    for doc in docs {
        match doc.metric_type {
            MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
            MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
            MetricType::Gauge => ::metrics::describe_gauge!(doc.name, doc.help),
        }
    }
}
