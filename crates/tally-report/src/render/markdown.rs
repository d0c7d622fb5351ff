//! Markdown rendering, used as the pull request comment body.

use std::fmt::Write as _;
use std::time::Duration;

use tally_core::{ErrorSummary, PhaseStatus, RunStatus, RunSummary};
use tally_hosting::{ChannelSnapshot, ExtractedUrls, PreviewChannel};

use crate::dashboard::{
    BundleSummary, ConsolidatedDashboard, DeadCodeSummary, DocQualitySummary, PerformanceSummary,
    ReportSections, Section, VulnerabilitySummary,
};
use crate::kind::ReportKind;

/// Renders the dashboard as a markdown document.
pub fn render_markdown(dashboard: &ConsolidatedDashboard) -> String {
    let mut out = String::new();

    render_header(&mut out, &dashboard.run);
    render_phases(&mut out, &dashboard.run);
    render_errors(&mut out, &dashboard.run.errors);
    render_urls(&mut out, dashboard.urls.as_ref());
    render_channels(&mut out, &dashboard.channels);
    render_reports(&mut out, &dashboard.reports);

    out
}

fn run_icon(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "⏳",
        RunStatus::Succeeded => "✅",
        RunStatus::Failed => "❌",
        RunStatus::Cancelled => "🛑",
    }
}

fn phase_icon(status: PhaseStatus) -> &'static str {
    match status {
        PhaseStatus::Pending | PhaseStatus::Running => "⏳",
        PhaseStatus::Skipped => "⏭️",
        PhaseStatus::Succeeded => "✅",
        PhaseStatus::Failed => "❌",
        PhaseStatus::Cancelled => "🛑",
    }
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1_000 {
        return format!("{millis}ms");
    }

    let secs = duration.as_secs();
    if secs < 60 {
        return format!("{:.1}s", duration.as_secs_f64());
    }
    format!("{}m {}s", secs / 60, secs % 60)
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn render_header(out: &mut String, run: &RunSummary) {
    let _ = writeln!(
        out,
        "# {} Preview deployment {}\n",
        run_icon(run.status),
        run.status
    );
    let _ = writeln!(out, "| | |\n|---|---|");
    let _ = writeln!(out, "| Started | {} |", run.started_at);
    let _ = writeln!(out, "| Duration | {} |", format_duration(run.duration));
    let _ = writeln!(
        out,
        "| Phases | {} succeeded, {} failed, {} skipped |",
        run.count(PhaseStatus::Succeeded),
        run.count(PhaseStatus::Failed),
        run.count(PhaseStatus::Skipped)
    );
    let _ = writeln!(out, "| Exit code | {} |\n", run.exit_code);
}

fn render_phases(out: &mut String, run: &RunSummary) {
    let _ = writeln!(out, "## Phases\n");
    if run.phases.is_empty() {
        let _ = writeln!(out, "_No phases were scheduled._\n");
        return;
    }

    let total = run.phases.len();
    let _ = writeln!(out, "| Step | Phase | Status | Duration | Attempts |");
    let _ = writeln!(out, "|---|---|---|---|---|");
    for (index, phase) in run.phases.iter().enumerate() {
        let mut status = format!("{} {}", phase_icon(phase.status), phase.status);
        if let Some(reason) = &phase.skip_reason {
            let _ = write!(status, " ({reason})");
        }
        let _ = writeln!(
            out,
            "| {}/{total} | `{}`{} | {status} | {} | {} |",
            index + 1,
            phase.name,
            if phase.fatal { "" } else { " (non-fatal)" },
            format_duration(phase.duration),
            phase.attempts
        );
    }
    out.push('\n');
}

fn render_errors(out: &mut String, errors: &ErrorSummary) {
    let _ = writeln!(out, "## Errors\n");
    if errors.is_empty() {
        let _ = writeln!(out, "No errors recorded.\n");
        return;
    }

    let _ = writeln!(out, "{} error(s), {} fatal.\n", errors.total, errors.fatal);
    for group in &errors.groups {
        let _ = writeln!(out, "### `{}`\n", group.phase);
        for category in &group.categories {
            let _ = writeln!(
                out,
                "- **{}** ({}{})",
                category.category.label(),
                category.count,
                if category.fatal { ", fatal" } else { "" }
            );
            for message in &category.messages {
                let _ = writeln!(out, "  - {}", message.replace('\n', " "));
            }
            let _ = writeln!(out, "  - 💡 {}", category.suggestion);
        }
        out.push('\n');
    }
}

fn render_urls(out: &mut String, urls: Option<&ExtractedUrls>) {
    let _ = writeln!(out, "## Preview URLs\n");
    let Some(urls) = urls else {
        let _ = writeln!(out, "_No preview URLs were extracted._\n");
        return;
    };

    let _ = writeln!(out, "| Site | URL |\n|---|---|");
    for (site, url) in &urls.sites {
        let _ = writeln!(out, "| {site} | {url} |");
    }
    out.push('\n');

    if !urls.overflow.is_empty() {
        let _ = writeln!(out, "Unassigned:\n");
        for url in &urls.overflow {
            let _ = writeln!(out, "- {url}");
        }
        out.push('\n');
    }
}

fn channel_line(channel: &PreviewChannel) -> String {
    let mut line = format!("`{}` created {}", channel.id, channel.created_at);
    if let Some(expires_at) = channel.expires_at {
        let _ = write!(line, ", expires {expires_at}");
    }
    if let Some(url) = channel.url() {
        let _ = write!(line, " ({url})");
    }
    line
}

fn render_channels(out: &mut String, channels: &ChannelSnapshot) {
    let _ = writeln!(out, "## Preview channels\n");
    if channels.is_empty() {
        let _ = writeln!(out, "_No channel information available._\n");
        return;
    }

    for site in &channels.sites {
        let _ = writeln!(
            out,
            "### {}\n\n{} current, {} evicted, {} failed deletion(s).\n",
            site.site,
            site.current.len(),
            site.evicted.len(),
            site.failed_deletions.len()
        );
        for channel in &site.current {
            let _ = writeln!(out, "- {}", channel_line(channel));
        }
        for channel in &site.evicted {
            let _ = writeln!(out, "- ~~{}~~ evicted", channel_line(channel));
        }
        for failed in &site.failed_deletions {
            let _ = writeln!(
                out,
                "- ⚠️ `{}` could not be deleted: {}",
                failed.channel.id, failed.message
            );
        }
        out.push('\n');
    }
}

fn section_heading(out: &mut String, kind: ReportKind) {
    let _ = writeln!(out, "### {}\n", kind.title());
}

fn render_section<T>(
    out: &mut String,
    kind: ReportKind,
    section: &Section<T>,
    body: impl FnOnce(&mut String, &T),
) {
    section_heading(out, kind);
    match section {
        Section::Available { summary } => body(out, summary),
        Section::Unavailable { reason } => {
            let _ = writeln!(out, "_unavailable_: {reason}");
        }
    }
    out.push('\n');
}

fn render_reports(out: &mut String, reports: &ReportSections) {
    let _ = writeln!(out, "## Reports\n");

    render_section(out, ReportKind::Bundle, &reports.bundle, render_bundle);
    render_section(
        out,
        ReportKind::Vulnerability,
        &reports.vulnerability,
        render_vulnerability,
    );
    render_section(out, ReportKind::DeadCode, &reports.dead_code, render_dead_code);
    render_section(
        out,
        ReportKind::DocQuality,
        &reports.doc_quality,
        render_doc_quality,
    );
    render_section(
        out,
        ReportKind::Performance,
        &reports.performance,
        render_performance,
    );
}

fn render_bundle(out: &mut String, summary: &BundleSummary) {
    let _ = writeln!(
        out,
        "{} total, {} gzipped, {} asset(s){}",
        format_bytes(summary.total_bytes),
        format_bytes(summary.gzip_bytes),
        summary.asset_count,
        if summary.over_budget { ", ❌ over budget" } else { "" }
    );
    if let Some((name, size)) = &summary.largest_asset {
        let _ = writeln!(out, "\nLargest asset: `{name}` ({})", format_bytes(*size));
    }
}

fn render_vulnerability(out: &mut String, summary: &VulnerabilitySummary) {
    let highest = summary
        .highest
        .map_or_else(|| "none".to_owned(), |severity| severity.to_string());
    let _ = writeln!(out, "{} finding(s), highest severity: {highest}\n", summary.total);
    let _ = writeln!(out, "| Severity | Count |\n|---|---|");
    for (severity, count) in summary.counts.iter().rev() {
        let _ = writeln!(out, "| {severity} | {count} |");
    }
}

fn render_dead_code(out: &mut String, summary: &DeadCodeSummary) {
    let _ = writeln!(
        out,
        "{} finding(s): {} unused file(s), {} unused export(s), {} unused dependency(ies)",
        summary.total, summary.unused_files, summary.unused_exports, summary.unused_dependencies
    );
}

fn render_doc_quality(out: &mut String, summary: &DocQualitySummary) {
    let _ = writeln!(
        out,
        "{:.1}% coverage ({} of {} item(s) documented), {} issue(s)",
        summary.coverage_percent, summary.documented, summary.total_items, summary.issue_count
    );
}

fn render_performance(out: &mut String, summary: &PerformanceSummary) {
    let _ = writeln!(out, "| Category | Score |\n|---|---|");
    for (category, score) in &summary.scores {
        let _ = writeln!(out, "| {category} | {score:.0} |");
    }
}
