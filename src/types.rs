use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Metric caps applied before any comparison happens.
pub const TOP_PAGES_CAP: usize = 5;
pub const CUSTOM_EVENTS_CAP: usize = 10;

/// Canonical metric names used as map keys across the pipeline.
pub const METRIC_DAU: &str = "dau";
pub const METRIC_WAU: &str = "wau";
pub const METRIC_MAU: &str = "mau";
pub const METRIC_PAGEVIEWS: &str = "pageviews";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Eu,
    Us,
}

impl Region {
    pub fn parse(s: &str) -> Option<Region> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eu" => Some(Region::Eu),
            "us" => Some(Region::Us),
            _ => None,
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Region::Eu => "https://eu.posthog.com",
            Region::Us => "https://us.posthog.com",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub posthog_api_key: String,
    pub region: Region,
    pub discord_bot_token: String,
    pub discord_user_id: u64,
}

/// A PostHog project reachable with the configured credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub display_name: String,
}

/// A bounded UTC interval scoping one metric query.
///
/// Comparison pairs are always built with `trailing` + `shift_back`, which
/// guarantees the current and baseline windows have identical duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MetricWindow {
    /// The trailing `days`-long window ending at `end`.
    pub fn trailing(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// The same-length window shifted back by `days`.
    pub fn shift_back(&self, days: i64) -> Self {
        Self {
            start: self.start - Duration::days(days),
            end: self.end - Duration::days(days),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Metric values measured for one project over one window.
///
/// `top_pages` and `custom_events` are ranked by count and truncated to
/// their caps at fetch time; nothing downstream reorders them.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub project_id: String,
    pub window: MetricWindow,
    pub dau: u64,
    pub wau: u64,
    pub mau: u64,
    pub pageviews: u64,
    pub top_pages: Vec<(String, u64)>,
    pub custom_events: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn indicator(&self) -> &'static str {
        match self {
            Direction::Up => "\u{2191}",
            Direction::Down => "\u{2193}",
            Direction::Flat => "\u{2194}",
        }
    }
}

/// Directional comparison of one metric across the two windows.
///
/// `delta_pct` is `None` when the baseline is zero and the current value is
/// not: the percentage is undefined, so the formatter shows the absolute
/// current value instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub metric_name: String,
    pub current_value: u64,
    pub previous_value: u64,
    pub delta_pct: Option<f64>,
    pub direction: Direction,
}

/// One project's slice of the digest.
///
/// `comparisons` covers the standard metrics (dau/wau/mau/pageviews);
/// `events` holds per-custom-event comparisons in discovery rank order.
#[derive(Debug, Clone)]
pub struct ProjectDigest {
    pub project: Project,
    pub snapshot_current: MetricSnapshot,
    pub comparisons: BTreeMap<String, Comparison>,
    pub events: Vec<Comparison>,
}

/// The terminal artifact of a run, handed to the formatter.
#[derive(Debug, Clone)]
pub struct DigestReport {
    pub generated_at: DateTime<Utc>,
    pub summary: BTreeMap<String, Comparison>,
    pub projects: Vec<ProjectDigest>,
    /// Projects dropped because their fetch failed.
    pub omitted: usize,
}
