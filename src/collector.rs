use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::error::DigestError;
use crate::posthog::{ActiveUserKind, MetricsSource};
use crate::types::{MetricSnapshot, MetricWindow, Project, CUSTOM_EVENTS_CAP, TOP_PAGES_CAP};

/// Upper bound on concurrent project fetches, to respect provider rate
/// limits.
pub const MAX_CONCURRENT_FETCHES: usize = 4;

/// One week between the current window and its baseline.
const COMPARISON_OFFSET_DAYS: i64 = 7;

/// A like-for-like pair of equal-duration windows.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonWindows {
    pub current: MetricWindow,
    pub baseline: MetricWindow,
}

impl ComparisonWindows {
    fn like_for_like(now: DateTime<Utc>, span_days: i64, offset_days: i64) -> Self {
        let current = MetricWindow::trailing(now, span_days);
        Self {
            current,
            baseline: current.shift_back(offset_days),
        }
    }
}

/// All query windows for one run, derived once from the reference time.
///
/// DAU, pageviews and custom events compare the trailing day against the
/// same day one week earlier; WAU and MAU compare against the window
/// immediately preceding their own span. Custom events are discovered over
/// the trailing week (current side only) so a brand-new event still gets a
/// zero baseline.
#[derive(Debug, Clone, Copy)]
pub struct WindowPlan {
    pub dau: ComparisonWindows,
    pub wau: ComparisonWindows,
    pub mau: ComparisonWindows,
    pub pageviews: ComparisonWindows,
    pub events: ComparisonWindows,
    pub discovery: MetricWindow,
}

impl WindowPlan {
    pub fn for_run(now: DateTime<Utc>) -> Self {
        Self {
            dau: ComparisonWindows::like_for_like(now, 1, COMPARISON_OFFSET_DAYS),
            wau: ComparisonWindows::like_for_like(now, 7, 7),
            mau: ComparisonWindows::like_for_like(now, 30, 30),
            pageviews: ComparisonWindows::like_for_like(now, 1, COMPARISON_OFFSET_DAYS),
            events: ComparisonWindows::like_for_like(now, 1, COMPARISON_OFFSET_DAYS),
            discovery: MetricWindow::trailing(now, 7),
        }
    }
}

/// Both window snapshots for one project.
#[derive(Debug, Clone)]
pub struct ProjectSnapshots {
    pub current: MetricSnapshot,
    pub baseline: MetricSnapshot,
}

#[derive(Clone, Copy)]
enum Phase {
    Current,
    Baseline,
}

/// Fans fetches out across projects and windows, bounded by
/// `MAX_CONCURRENT_FETCHES`.
pub struct MetricsCollector<S> {
    source: Arc<S>,
    limit: usize,
}

impl<S: MetricsSource + 'static> MetricsCollector<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            limit: MAX_CONCURRENT_FETCHES,
        }
    }

    #[cfg(test)]
    fn with_limit(source: Arc<S>, limit: usize) -> Self {
        Self { source, limit }
    }

    /// Fetch both snapshots for every project.
    ///
    /// The returned vector is index-aligned with `projects` regardless of
    /// completion order. A failed project yields an `Err` slot; it never
    /// aborts its siblings.
    pub async fn collect(
        &self,
        projects: &[Project],
        now: DateTime<Utc>,
    ) -> Vec<Result<ProjectSnapshots, DigestError>> {
        let plan = WindowPlan::for_run(now);
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut slots: Vec<Option<Result<ProjectSnapshots, DigestError>>> =
            projects.iter().map(|_| None).collect();

        let mut set = JoinSet::new();
        for (idx, project) in projects.iter().cloned().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetch_project(&*source, &project, &plan).await,
                    Err(_) => Err(DigestError::project_fetch(
                        project.id.as_str(),
                        "concurrency limiter closed",
                    )),
                };
                (idx, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => {
                    if let Err(err) = &result {
                        warn!("dropping project from digest: {}", err);
                    }
                    slots[idx] = Some(result);
                }
                Err(join_err) => error!("project fetch task failed: {}", join_err),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    Err(DigestError::project_fetch(
                        projects[idx].id.as_str(),
                        "fetch task aborted",
                    ))
                })
            })
            .collect()
    }
}

async fn fetch_project<S: MetricsSource>(
    source: &S,
    project: &Project,
    plan: &WindowPlan,
) -> Result<ProjectSnapshots, DigestError> {
    // Discover events once, over the current side only; the same set is
    // then queried for both windows.
    let events = match source
        .top_events(&project.id, plan.discovery, CUSTOM_EVENTS_CAP)
        .await
    {
        Ok(events) => events,
        Err(err) => {
            warn!(
                "custom event discovery failed for {} ({}), continuing without: {}",
                project.display_name, project.id, err
            );
            Vec::new()
        }
    };

    let (current, baseline) = tokio::join!(
        fetch_snapshot(source, project, &events, plan, Phase::Current),
        fetch_snapshot(source, project, &events, plan, Phase::Baseline),
    );

    Ok(ProjectSnapshots {
        current: current?,
        baseline: baseline?,
    })
}

async fn fetch_snapshot<S: MetricsSource>(
    source: &S,
    project: &Project,
    events: &[String],
    plan: &WindowPlan,
    phase: Phase,
) -> Result<MetricSnapshot, DigestError> {
    let pick = |w: ComparisonWindows| match phase {
        Phase::Current => w.current,
        Phase::Baseline => w.baseline,
    };

    let dau = source
        .active_users(&project.id, ActiveUserKind::Daily, pick(plan.dau))
        .await?;
    let wau = source
        .active_users(&project.id, ActiveUserKind::Weekly, pick(plan.wau))
        .await?;
    let mau = source
        .active_users(&project.id, ActiveUserKind::Monthly, pick(plan.mau))
        .await?;
    let (pageviews, mut top_pages) = source.pageviews(&project.id, pick(plan.pageviews)).await?;
    top_pages.truncate(TOP_PAGES_CAP);

    let mut custom_events = Vec::with_capacity(events.len().min(CUSTOM_EVENTS_CAP));
    for event in events.iter().take(CUSTOM_EVENTS_CAP) {
        let count = source
            .event_count(&project.id, event, pick(plan.events))
            .await?;
        custom_events.push((event.clone(), count));
    }

    Ok(MetricSnapshot {
        project_id: project.id.clone(),
        window: pick(plan.dau),
        dau,
        wau,
        mau,
        pageviews,
        top_pages,
        custom_events,
    })
}
