use criterion::{black_box, criterion_group, criterion_main, Criterion};
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

use posthog_digest::aggregate::aggregate;
use posthog_digest::format::format_digest;
use posthog_digest::trend::compare;
use posthog_digest::types::{
    DigestReport, MetricSnapshot, MetricWindow, Project, ProjectDigest, METRIC_DAU, METRIC_MAU,
    METRIC_PAGEVIEWS, METRIC_WAU,
};

fn sample_digests(count: u64) -> Vec<ProjectDigest> {
    let now = Utc.with_ymd_and_hms(2026, 8, 24, 6, 0, 0).unwrap();
    let window = MetricWindow::trailing(now, 1);
    (0..count)
        .map(|i| {
            let dau = 100 + i * 7;
            let mut comparisons = BTreeMap::new();
            comparisons.insert(METRIC_DAU.to_string(), compare(METRIC_DAU, dau, dau - 3));
            comparisons.insert(METRIC_WAU.to_string(), compare(METRIC_WAU, dau * 3, dau * 3 + 9));
            comparisons.insert(METRIC_MAU.to_string(), compare(METRIC_MAU, dau * 10, dau * 10));
            comparisons.insert(
                METRIC_PAGEVIEWS.to_string(),
                compare(METRIC_PAGEVIEWS, dau * 5, dau * 4),
            );
            let events = (0..10)
                .map(|e| compare(&format!("event-{}", e), dau + e, dau))
                .collect();
            ProjectDigest {
                project: Project {
                    id: i.to_string(),
                    display_name: format!("Project {}", i),
                },
                snapshot_current: MetricSnapshot {
                    project_id: i.to_string(),
                    window,
                    dau,
                    wau: dau * 3,
                    mau: dau * 10,
                    pageviews: dau * 5,
                    top_pages: (0..5).map(|p| (format!("/page-{}", p), dau + p)).collect(),
                    custom_events: (0..10).map(|e| (format!("event-{}", e), dau + e)).collect(),
                },
                comparisons,
                events,
            }
        })
        .collect()
}

fn bench_compare(c: &mut Criterion) {
    c.bench_function("compare_typical", |b| {
        b.iter(|| compare(black_box("dau"), black_box(1234), black_box(1100)))
    });
    c.bench_function("compare_zero_baseline", |b| {
        b.iter(|| compare(black_box("signup"), black_box(5), black_box(0)))
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let digests = sample_digests(50);
    c.bench_function("aggregate_50_projects", |b| {
        b.iter(|| aggregate(black_box(&digests)))
    });
}

fn bench_format(c: &mut Criterion) {
    let digests = sample_digests(10);
    let summary = aggregate(&digests);
    let report = DigestReport {
        generated_at: Utc.with_ymd_and_hms(2026, 8, 24, 6, 0, 0).unwrap(),
        summary,
        projects: digests,
        omitted: 0,
    };
    c.bench_function("format_10_project_digest", |b| {
        b.iter(|| format_digest(black_box(&report)))
    });
}

criterion_group!(benches, bench_compare, bench_aggregate, bench_format);
criterion_main!(benches);
