use super::{BenchmarkRunReport, FlowRunReport, FlowRunStatus, ResultsByFlow};
use crate::flows::display_name;

const HEADER_TOP: &str =
    "╔══════════════════════════════════════════════════════════════════════════════╗";
const HEADER_BOTTOM: &str =
    "╚══════════════════════════════════════════════════════════════════════════════╝";
const BOX_TOP: &str =
    "┌─────────────────────────────────────────────────────────────────────────────┐";
const BOX_MID: &str =
    "├─────────────────────────────────────────────────────────────────────────────┤";
const BOX_BOTTOM: &str =
    "└─────────────────────────────────────────────────────────────────────────────┘";

/// Inner width of the section boxes.
const BOX_WIDTH: usize = 77;

/// `1h 2m 3s`, `2m 3s` or `3s`; sub-second remainders are dropped.
pub fn format_duration(ms: i64) -> String {
    let seconds = ms.max(0) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Right-aligned table cell: `-` when missing, two decimals below 10,
/// rounded integer otherwise.
pub fn format_number(value: Option<f64>, width: usize) -> String {
    let formatted = match value {
        None => "-".to_string(),
        Some(v) if v < 10.0 => format!("{:.2}", v),
        Some(v) => format!("{}", v.round() as i64),
    };
    format!("{:>width$}", formatted, width = width)
}

/// Pad with spaces to `width` chars, then cut to `width` chars.
fn cell(text: &str, width: usize) -> String {
    let padded = format!("{:<width$}", text, width = width);
    padded.chars().take(width).collect()
}

fn section_title(lines: &mut Vec<String>, title: &str) {
    let left = (BOX_WIDTH - title.chars().count()) / 2;
    let right = BOX_WIDTH - left - title.chars().count();
    lines.push(BOX_TOP.to_string());
    lines.push(format!("│{}{}{}│", " ".repeat(left), title, " ".repeat(right)));
    lines.push(BOX_BOTTOM.to_string());
}

fn per_flow_list<'a>(
    lines: &mut Vec<String>,
    title: &str,
    reports: &'a [FlowRunReport],
    entries: impl Fn(&'a FlowRunReport) -> Vec<String>,
    marker: &str,
) {
    let with_entries: Vec<(&FlowRunReport, Vec<String>)> = reports
        .iter()
        .map(|r| (r, entries(r)))
        .filter(|(_, e)| !e.is_empty())
        .collect();
    if with_entries.is_empty() {
        return;
    }
    section_title(lines, title);
    for (report, items) in with_entries {
        lines.push(format!("  {}:", report.flow_name));
        for item in items {
            lines.push(format!("    {} {}", marker, item));
        }
    }
    lines.push(String::new());
}

/// Human-readable end-of-run summary. Sections without entries are omitted.
pub fn render_summary(report: &BenchmarkRunReport, results: &ResultsByFlow) -> String {
    let summary = &report.summary;
    let mut lines: Vec<String> = Vec::new();

    lines.push(String::new());
    lines.push(HEADER_TOP.to_string());
    lines.push(format!("║{:^78}║", "BENCHMARK RUN REPORT"));
    lines.push(HEADER_BOTTOM.to_string());
    lines.push(String::new());

    let overall = if summary.failed_flows == 0 {
        "✅ SUCCESS"
    } else {
        "❌ FAILED"
    };
    lines.push(format!("Overall Result: {}", overall));
    lines.push(format!("Duration: {}", format_duration(report.duration_ms)));
    lines.push(format!(
        "Completed: {}",
        report.end_time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    ));
    lines.push(String::new());

    lines.push(BOX_TOP.to_string());
    lines.push(format!("│{:^77}│", "FLOW SUMMARY"));
    lines.push(BOX_MID.to_string());
    lines.push(format!(
        "│ Total: {:<3} │ ✅ Success: {:<3} │ ❌ Failed: {:<3} │ ⏭️  Skipped: {:<3} │",
        summary.total_flows, summary.successful_flows, summary.failed_flows, summary.skipped_flows
    ));
    lines.push(BOX_BOTTOM.to_string());
    lines.push(String::new());

    if !report.flow_reports.is_empty() {
        lines.push(
            "┌───────────────────────────────┬──────────┬─────────────┬──────────────────┐"
                .to_string(),
        );
        lines.push(
            "│ Flow                          │ Status   │ Retries     │ Iterations       │"
                .to_string(),
        );
        lines.push(
            "├───────────────────────────────┼──────────┼─────────────┼──────────────────┤"
                .to_string(),
        );
        for r in &report.flow_reports {
            lines.push(format!(
                "│ {} │ {}│ {}│ {}│",
                cell(&r.flow_name, 28),
                cell(&format!("{} {}", r.status.icon(), r.status.as_str()), 9),
                cell(&format!("{}/{}", r.retries_used, r.total_retries), 12),
                cell(
                    &format!("{}/{}", r.iterations_completed, r.iterations_requested),
                    17
                ),
            ));
        }
        lines.push(
            "└───────────────────────────────┴──────────┴─────────────┴──────────────────┘"
                .to_string(),
        );
        lines.push(String::new());
    }

    let flows = &report.flow_reports;
    per_flow_list(&mut lines, "ERRORS", flows, |r| r.errors.clone(), "❌");
    per_flow_list(&mut lines, "WARNINGS", flows, |r| r.warnings.clone(), "⚠️ ");
    per_flow_list(
        &mut lines,
        "DATA QUALITY",
        flows,
        |r| r.data_quality.iter().map(ToString::to_string).collect(),
        "🧹",
    );

    let rows: Vec<String> = flows
        .iter()
        .filter(|r| r.status == FlowRunStatus::Success)
        .filter_map(|r| {
            let result = results.get(&display_name(&r.flow_name))?;
            let mean = |key: &str| result.mean.get(key).copied();
            Some(format!(
                "│ {} │ {} │ {} │ {} │ {} │ {} │",
                cell(&r.flow_name, 28),
                format_number(mean("renderCount"), 10),
                format_number(mean("renderTime"), 10),
                format_number(mean("fcp"), 10),
                format_number(mean("tbt"), 10),
                format_number(mean("inp"), 10),
            ))
        })
        .collect();
    if !rows.is_empty() {
        section_title(&mut lines, "METRICS SUMMARY");
        lines.push(String::new());
        lines.push(
            "┌───────────────────────────────┬────────────┬────────────┬────────────┬────────────┬────────────┐"
                .to_string(),
        );
        lines.push(
            "│ Flow                          │ Renders    │ Render(ms) │ FCP(ms)    │ TBT(ms)    │ INP(ms)    │"
                .to_string(),
        );
        lines.push(
            "├───────────────────────────────┼────────────┼────────────┼────────────┼────────────┼────────────┤"
                .to_string(),
        );
        lines.extend(rows);
        lines.push(
            "└───────────────────────────────┴────────────┴────────────┴────────────┴────────────┴────────────┘"
                .to_string(),
        );
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Print the summary to stderr so STDOUT stays machine-readable.
pub fn print_summary(report: &BenchmarkRunReport, results: &ResultsByFlow) {
    eprintln!("{}", render_summary(report, results));
}
