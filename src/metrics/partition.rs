//! Partition Phase Metrics

use crate::metrics::{describe, phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct PartitionMetrics;

impl PartitionMetrics {
    pub fn record_written(rows: usize, partitions: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "partition", "rows_written")).increment(rows as u64);
        ::metrics::gauge!(phase_metric!(gauge, "partition", "files")).set(partitions as f64);
        ::metrics::histogram!(phase_metric!(histogram, "partition", "duration_seconds")).record(duration_secs);
    }

    pub fn record_write_error() {
        ::metrics::counter!(phase_metric!(counter, "partition", "write_errors")).increment(1);
    }
}

impl PhaseMetrics for PartitionMetrics {
    fn register_metrics() {
        describe(&Self::metrics_documentation());
    }

    fn phase_name() -> &'static str {
        "partition"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "partition", "rows_written"),
                metric_type: MetricType::Counter,
                help: "Rows written to the consolidated output",
            },
            MetricDoc {
                name: phase_metric!(gauge, "partition", "files"),
                metric_type: MetricType::Gauge,
                help: "Per-jurisdiction files written in the last run",
            },
            MetricDoc {
                name: phase_metric!(histogram, "partition", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time spent writing all outputs",
            },
            MetricDoc {
                name: phase_metric!(counter, "partition", "write_errors"),
                metric_type: MetricType::Counter,
                help: "Output files that could not be written",
            },
        ]
    }
}
