use std::collections::BTreeMap;

use crate::trend::compare;
use crate::types::{Comparison, ProjectDigest, METRIC_DAU, METRIC_PAGEVIEWS};

/// Cross-project summary over the additive metrics.
///
/// Current and previous values are summed independently across projects and
/// the totals run through `compare` once; per-project percentages are never
/// averaged. WAU and MAU count distinct users per project and do not sum
/// across populations, so they stay per-project only.
pub fn aggregate(digests: &[ProjectDigest]) -> BTreeMap<String, Comparison> {
    let mut summary = BTreeMap::new();
    if digests.is_empty() {
        return summary;
    }

    for metric in [METRIC_DAU, METRIC_PAGEVIEWS] {
        let mut current_total = 0u64;
        let mut previous_total = 0u64;
        for digest in digests {
            if let Some(cmp) = digest.comparisons.get(metric) {
                current_total += cmp.current_value;
                previous_total += cmp.previous_value;
            }
        }
        summary.insert(
            metric.to_string(),
            compare(metric, current_total, previous_total),
        );
    }
    summary
}
