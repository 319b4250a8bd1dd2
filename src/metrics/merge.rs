//! Merge Phase Metrics
//!
//! Row throughput, duplicate rate and per-file duration of the merge engine.

use crate::metrics::{describe, phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::types::FileStats;

pub struct MergeMetrics;

impl MergeMetrics {
    /// Record one merged input file
    pub fn record_file(stats: &FileStats, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "merge", "files")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "merge", "rows")).increment(stats.rows);
        ::metrics::counter!(phase_metric!(counter, "merge", "records_inserted")).increment(stats.inserted);
        ::metrics::counter!(phase_metric!(counter, "merge", "duplicates")).increment(stats.duplicates);
        ::metrics::counter!(phase_metric!(counter, "merge", "blank_identifiers"))
            .increment(stats.blank_identifiers);
        ::metrics::histogram!(phase_metric!(histogram, "merge", "file_duration_seconds")).record(duration_secs);
    }

    /// Record a merge failure
    pub fn record_error(kind: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "merge", "errors"), "kind" => kind).increment(1);
    }

    pub fn record_store_size(records: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "merge", "unique_records")).set(records as f64);
    }
}

impl PhaseMetrics for MergeMetrics {
    fn register_metrics() {
        describe(&Self::metrics_documentation());
    }

    fn phase_name() -> &'static str {
        "merge"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "merge", "files"),
                metric_type: MetricType::Counter,
                help: "Input files merged",
            },
            MetricDoc {
                name: phase_metric!(counter, "merge", "rows"),
                metric_type: MetricType::Counter,
                help: "Data rows read across all input files",
            },
            MetricDoc {
                name: phase_metric!(counter, "merge", "records_inserted"),
                metric_type: MetricType::Counter,
                help: "Rows kept as the newest record for their identifier",
            },
            MetricDoc {
                name: phase_metric!(counter, "merge", "duplicates"),
                metric_type: MetricType::Counter,
                help: "Rows discarded because a newer file already held the identifier",
            },
            MetricDoc {
                name: phase_metric!(counter, "merge", "blank_identifiers"),
                metric_type: MetricType::Counter,
                help: "Rows with an empty or whitespace identifier",
            },
            MetricDoc {
                name: phase_metric!(counter, "merge", "errors"),
                metric_type: MetricType::Counter,
                help: "Merge failures by error kind",
            },
            MetricDoc {
                name: phase_metric!(histogram, "merge", "file_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time spent merging a single input file",
            },
            MetricDoc {
                name: phase_metric!(gauge, "merge", "unique_records"),
                metric_type: MetricType::Gauge,
                help: "Unique records in the finalized store",
            },
        ]
    }
}
