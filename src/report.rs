use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::aggregate::aggregate;
use crate::collector::ProjectSnapshots;
use crate::error::DigestError;
use crate::trend::compare;
use crate::types::{
    DigestReport, Project, ProjectDigest, METRIC_DAU, METRIC_MAU, METRIC_PAGEVIEWS, METRIC_WAU,
};

/// Derive one project's comparisons from its two snapshots.
pub fn build_project_digest(project: &Project, snapshots: &ProjectSnapshots) -> ProjectDigest {
    let current = &snapshots.current;
    let baseline = &snapshots.baseline;

    let mut comparisons = BTreeMap::new();
    comparisons.insert(
        METRIC_DAU.to_string(),
        compare(METRIC_DAU, current.dau, baseline.dau),
    );
    comparisons.insert(
        METRIC_WAU.to_string(),
        compare(METRIC_WAU, current.wau, baseline.wau),
    );
    comparisons.insert(
        METRIC_MAU.to_string(),
        compare(METRIC_MAU, current.mau, baseline.mau),
    );
    comparisons.insert(
        METRIC_PAGEVIEWS.to_string(),
        compare(METRIC_PAGEVIEWS, current.pageviews, baseline.pageviews),
    );

    // Events keep their discovery rank order; an event missing from the
    // baseline snapshot counts as 0 there.
    let events = current
        .custom_events
        .iter()
        .map(|(name, count)| {
            let previous = baseline
                .custom_events
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, c)| *c)
                .unwrap_or(0);
            compare(name, *count, previous)
        })
        .collect();

    ProjectDigest {
        project: project.clone(),
        snapshot_current: current.clone(),
        comparisons,
        events,
    }
}

/// Fold collector outcomes into the final report.
///
/// `outcomes` is index-aligned with `projects`; failed slots are counted as
/// omissions and the surviving projects keep discovery order.
pub fn build_report(
    projects: &[Project],
    outcomes: Vec<Result<ProjectSnapshots, DigestError>>,
    generated_at: DateTime<Utc>,
) -> DigestReport {
    let mut digests = Vec::new();
    let mut omitted = 0;
    for (project, outcome) in projects.iter().zip(outcomes) {
        match outcome {
            Ok(snapshots) => digests.push(build_project_digest(project, &snapshots)),
            Err(_) => omitted += 1,
        }
    }

    let summary = aggregate(&digests);
    DigestReport {
        generated_at,
        summary,
        projects: digests,
        omitted,
    }
}
