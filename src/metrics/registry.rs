//! Metrics registry for coordinating phase-specific metrics
//!
//! Registers every phase's metrics with the installed recorder and detects
//! names defined by more than one phase.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Register all metrics from all phases
pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();
    let mut problems = 0;

    problems += register_phase_metrics::<super::enumerator::EnumeratorMetrics>(&mut all_metrics);
    problems += register_phase_metrics::<super::merge::MergeMetrics>(&mut all_metrics);
    problems += register_phase_metrics::<super::partition::PartitionMetrics>(&mut all_metrics);

    info!("Registered {} total metrics across all phases", all_metrics.len());
    if problems > 0 {
        warn!("{} metric definitions have naming problems", problems);
    }
}

/// Returns how many of the phase's metrics clash with another phase or carry
/// another phase's prefix.
fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, (&'static str, MetricDoc)>) -> usize {
    T::register_metrics();
    let phase_name = T::phase_name();
    let mut problems = 0;

    for doc in T::metrics_documentation() {
        let prefix = extract_phase_from_metric_name(doc.name);
        if prefix != phase_name {
            warn!(
                "Metric '{}' is registered by '{}' but named for '{}'",
                doc.name, phase_name, prefix
            );
            problems += 1;
        }

        if let Some((owner, _)) = all_metrics.get(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' is defined in both '{}' and '{}'",
                doc.name, owner, phase_name
            );
            problems += 1;
        } else {
            debug!("  - {} ({:?}): {}", doc.name, doc.metric_type, doc.help);
            all_metrics.insert(doc.name, (phase_name, doc));
        }
    }
    problems
}

/// Extract phase name from metric name (e.g., "epc_merge_rows_total" -> "merge")
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    if let Some(stripped) = metric_name.strip_prefix("epc_") {
        if let Some(next_underscore) = stripped.find('_') {
            return &stripped[..next_underscore];
        }
    }
    "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{EnumeratorMetrics, MergeMetrics, MetricType, PartitionMetrics};
    use std::collections::HashSet;

    #[test]
    fn test_extract_phase_from_metric_name() {
        assert_eq!(extract_phase_from_metric_name("epc_merge_rows_total"), "merge");
        assert_eq!(
            extract_phase_from_metric_name("epc_partition_duration_seconds"),
            "partition"
        );
        assert_eq!(extract_phase_from_metric_name("invalid_metric_name"), "unknown");
    }

    struct MisnamedMetrics;

    impl PhaseMetrics for MisnamedMetrics {
        fn register_metrics() {}

        fn phase_name() -> &'static str {
            "partition"
        }

        fn metrics_documentation() -> Vec<MetricDoc> {
            vec![
                MetricDoc {
                    name: "epc_merge_rows_total",
                    metric_type: MetricType::Counter,
                    help: "Borrowed from another phase",
                },
                MetricDoc {
                    name: "epc_partition_files_written_total",
                    metric_type: MetricType::Counter,
                    help: "Correctly named",
                },
            ]
        }
    }

    #[test]
    fn registration_counts_misnamed_and_conflicting_metrics() {
        let mut all_metrics = HashMap::new();
        assert_eq!(register_phase_metrics::<MisnamedMetrics>(&mut all_metrics), 1);
        assert_eq!(all_metrics.len(), 2);
        // Second registration conflicts on both names, and one is still misnamed.
        assert_eq!(register_phase_metrics::<MisnamedMetrics>(&mut all_metrics), 3);
    }

    #[test]
    fn shipped_phases_register_cleanly() {
        let mut all_metrics = HashMap::new();
        let mut problems = register_phase_metrics::<EnumeratorMetrics>(&mut all_metrics);
        problems += register_phase_metrics::<MergeMetrics>(&mut all_metrics);
        problems += register_phase_metrics::<PartitionMetrics>(&mut all_metrics);
        assert_eq!(problems, 0);
    }

    #[test]
    fn metric_names_are_unique_and_prefixed_by_their_phase() {
        let mut seen = HashSet::new();
        let phases = [
            (EnumeratorMetrics::phase_name(), EnumeratorMetrics::metrics_documentation()),
            (MergeMetrics::phase_name(), MergeMetrics::metrics_documentation()),
            (PartitionMetrics::phase_name(), PartitionMetrics::metrics_documentation()),
        ];
        for (phase, docs) in phases {
            for doc in docs {
                assert!(seen.insert(doc.name), "duplicate metric {}", doc.name);
                assert_eq!(extract_phase_from_metric_name(doc.name), phase);
            }
        }
    }
}
