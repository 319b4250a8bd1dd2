//! Enumerator Phase Metrics

use crate::metrics::{describe, phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct EnumeratorMetrics;

impl EnumeratorMetrics {
    pub fn record_enumerated(files_found: usize, unmatched_names: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "enumerator", "files_found")).set(files_found as f64);
        ::metrics::counter!(phase_metric!(counter, "enumerator", "unmatched_filenames"))
            .increment(unmatched_names as u64);
    }
}

impl PhaseMetrics for EnumeratorMetrics {
    fn register_metrics() {
        describe(&Self::metrics_documentation());
    }

    fn phase_name() -> &'static str {
        "enumerator"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(gauge, "enumerator", "files_found"),
                metric_type: MetricType::Gauge,
                help: "Input files found in the input directory",
            },
            MetricDoc {
                name: phase_metric!(counter, "enumerator", "unmatched_filenames"),
                metric_type: MetricType::Counter,
                help: "Input files whose name carries no recognizable period",
            },
        ]
    }
}
