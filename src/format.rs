use crate::types::{Comparison, DigestReport, ProjectDigest, METRIC_DAU, METRIC_MAU, METRIC_PAGEVIEWS, METRIC_WAU};

const SEPARATOR_WIDTH: usize = 30;
const URL_DISPLAY_LIMIT: usize = 40;

/// Color markers cycled per project block, keyed by report position.
const PROJECT_EMOJIS: &[&str] = &[
    "\u{1f535}", // blue
    "\u{1f7e3}", // purple
    "\u{1f7e1}", // yellow
    "\u{1f7e2}", // green
    "\u{1f7e0}", // orange
];

/// Render the digest as chat-ready text.
///
/// Pure function of the report: identical input produces byte-identical
/// output, which the golden test relies on.
pub fn format_digest(report: &DigestReport) -> String {
    let mut lines: Vec<String> = vec![
        format!(
            "\u{1f4c8} **Daily Analytics Digest** - {}",
            report.generated_at.format("%Y-%m-%d")
        ),
        "_Week-over-week comparison (vs 7 days ago)_".to_string(),
        String::new(),
    ];

    if !report.projects.is_empty() {
        lines.push("\u{1f4ca} **Summary (All Projects)**".to_string());
        if let Some(cmp) = report.summary.get(METRIC_DAU) {
            lines.push(format!("Total DAU: {}", format_change(cmp)));
        }
        if let Some(cmp) = report.summary.get(METRIC_PAGEVIEWS) {
            lines.push(format!("Total Pageviews: {}", format_change(cmp)));
        }
        lines.push(String::new());
    }

    for (idx, project) in report.projects.iter().enumerate() {
        lines.push(separator());
        push_project_section(&mut lines, idx, project);
    }

    lines.push(separator());
    if report.omitted > 0 {
        lines.push(format!(
            "_{} project(s) omitted due to fetch errors_",
            report.omitted
        ));
    }

    lines.join("\n")
}

fn separator() -> String {
    "\u{2500}".repeat(SEPARATOR_WIDTH)
}

fn push_project_section(lines: &mut Vec<String>, idx: usize, digest: &ProjectDigest) {
    let emoji = PROJECT_EMOJIS[idx % PROJECT_EMOJIS.len()];
    lines.push(format!("{} **{}**", emoji, digest.project.display_name));
    lines.push(String::new());

    push_metric_row(lines, "DAU", digest.comparisons.get(METRIC_DAU));
    push_metric_row(lines, "WAU", digest.comparisons.get(METRIC_WAU));
    push_metric_row(lines, "MAU", digest.comparisons.get(METRIC_MAU));
    lines.push(String::new());
    push_metric_row(lines, "Pageviews", digest.comparisons.get(METRIC_PAGEVIEWS));

    if !digest.snapshot_current.top_pages.is_empty() {
        lines.push(String::new());
        lines.push("Top Pages:".to_string());
        for (path, views) in &digest.snapshot_current.top_pages {
            lines.push(format!(
                "  {} \u{2192} {}",
                truncate_path(path),
                format_count(*views)
            ));
        }
    }

    if !digest.events.is_empty() {
        lines.push(String::new());
        lines.push("Custom Events:".to_string());
        for cmp in &digest.events {
            lines.push(format!("  {}: {}", cmp.metric_name, format_change(cmp)));
        }
    }
}

fn push_metric_row(lines: &mut Vec<String>, label: &str, cmp: Option<&Comparison>) {
    if let Some(cmp) = cmp {
        lines.push(format!("{}: {}", label, format_change(cmp)));
    }
}

/// "1,234 ↑ +12.5%", or "5 ↑ +5" when the baseline was zero (the
/// percentage is undefined, so the absolute change is shown instead).
fn format_change(cmp: &Comparison) -> String {
    let value = format_count(cmp.current_value);
    let arrow = cmp.direction.indicator();
    match cmp.delta_pct {
        Some(pct) if pct > 0.0 => format!("{} {} +{:.1}%", value, arrow, pct),
        Some(pct) if pct < 0.0 => format!("{} {} {:.1}%", value, arrow, pct),
        Some(_) => format!("{} {} 0.0%", value, arrow),
        None => format!("{} {} +{}", value, arrow, format_count(cmp.current_value)),
    }
}

fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn truncate_path(path: &str) -> String {
    if path.chars().count() <= URL_DISPLAY_LIMIT {
        path.to_string()
    } else {
        let head: String = path.chars().take(URL_DISPLAY_LIMIT - 3).collect();
        format!("{}...", head)
    }
}
