//! Pull request comment rendering

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::coverage::{format_pct, FileCoverage, Metric, MetricRecord, Summary, ThresholdMap};

/// Hidden token used to find a previously posted coverage comment
pub const DEFAULT_MARKER: &str = "<!-- covreport-marker -->";

const MAX_PATH_LEN: usize = 40;
const MAX_UNCOVERED_LEN: usize = 30;

#[derive(Debug, Clone)]
pub struct CommentOptions {
    pub thresholds: ThresholdMap,
    pub show_file_coverage: bool,
    pub max_files: usize,
    pub marker: String,
}

impl Default for CommentOptions {
    fn default() -> Self {
        Self {
            thresholds: ThresholdMap::new(),
            show_file_coverage: true,
            max_files: 20,
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

/// Render the comment and write it to `output_path`
pub fn write_comment(summary: &Summary, options: &CommentOptions, output_path: &Path) -> Result<()> {
    let body = render_comment(summary, options);
    fs::write(output_path, body)
        .with_context(|| format!("Failed to write comment to {}", output_path.display()))?;
    Ok(())
}

/// Render the Markdown/HTML coverage comment body
pub fn render_comment(summary: &Summary, options: &CommentOptions) -> String {
    let table = build_summary_table(summary, &options.thresholds);
    let files = if options.show_file_coverage {
        build_file_section(summary, options.max_files)
    } else {
        String::new()
    };

    format!(
        "## Coverage Report\n\n{}\n\n{}\n\n{}",
        table, files, options.marker
    )
}

fn build_summary_table(summary: &Summary, thresholds: &ThresholdMap) -> String {
    let rows: String = Metric::ALL
        .iter()
        .map(|metric| {
            format!(
                "<tr>{}</tr>",
                build_table_row(summary.total.metric(*metric), *metric, thresholds.get(*metric))
            )
        })
        .collect();

    format!(
        concat!(
            "<table><thead><tr>",
            r#"<th align="center">Status</th>"#,
            r#"<th align="left">Category</th>"#,
            r#"<th align="right">Percentage</th>"#,
            r#"<th align="right">Covered / Total</th>"#,
            "</tr></thead><tbody>{}</tbody></table>"
        ),
        rows
    )
}

fn build_table_row(record: &MetricRecord, metric: Metric, threshold: Option<f64>) -> String {
    let (status, percent) = match threshold {
        Some(min) => {
            let status = if record.pct >= min { "🟢" } else { "🔴" };
            (
                status,
                format!("{}% (🎯 {}%)", format_pct(record.pct), format_pct(min)),
            )
        }
        None => ("🔵", format!("{}%", format_pct(record.pct))),
    };

    format!(
        r#"<td align="center">{}</td><td align="left">{}</td><td align="right">{}</td><td align="right">{} / {}</td>"#,
        status,
        metric.display_name(),
        percent,
        record.covered,
        record.total
    )
}

fn build_file_section(summary: &Summary, max_files: usize) -> String {
    let files: Vec<&FileCoverage> = summary.files.iter().take(max_files).collect();
    if files.is_empty() {
        return String::new();
    }

    let rows: Vec<String> = files.iter().map(|f| build_file_row(f)).collect();

    format!(
        "<details>\n<summary>📁 File Coverage ({} files)</summary>\n\n\
         | File | Lines | Statements | Functions | Branches | Uncovered Lines |\n\
         |------|-------|------------|-----------|----------|----------------|\n\
         {}\n\n</details>",
        files.len(),
        rows.join("\n")
    )
}

fn build_file_row(file: &FileCoverage) -> String {
    format!(
        "| `{}` | {} | {} | {} | {} | {} |",
        display_path(&file.path),
        format_file_pct(&file.lines),
        format_file_pct(&file.statements),
        format_file_pct(&file.functions),
        format_file_pct(&file.branches),
        format_uncovered_lines(&file.uncovered_lines)
    )
}

fn format_file_pct(record: &MetricRecord) -> String {
    let emoji = if record.pct >= 80.0 {
        "🟢"
    } else if record.pct >= 60.0 {
        "🟡"
    } else {
        "🔴"
    };
    format!("{} {}%", emoji, format_pct(record.pct))
}

/// Keep the tail of long paths: `...` + last 37 characters
fn display_path(path: &str) -> String {
    let chars: Vec<char> = path.chars().collect();
    if chars.len() > MAX_PATH_LEN {
        let tail: String = chars[chars.len() - (MAX_PATH_LEN - 3)..].iter().collect();
        format!("...{}", tail)
    } else {
        path.to_string()
    }
}

/// Collapse ascending line numbers into ranges ("1-3, 7"), cut to 30 characters
fn format_uncovered_lines(lines: &[u32]) -> String {
    let Some((&first, rest)) = lines.split_first() else {
        return "-".to_string();
    };

    let mut ranges = Vec::new();
    let (mut start, mut end) = (first, first);
    for &line in rest {
        if line == end + 1 {
            end = line;
        } else {
            ranges.push(format_range(start, end));
            start = line;
            end = line;
        }
    }
    ranges.push(format_range(start, end));

    let joined = ranges.join(", ");
    if joined.len() > MAX_UNCOVERED_LEN {
        format!("{}...", &joined[..MAX_UNCOVERED_LEN - 3])
    } else {
        joined
    }
}

fn format_range(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}
