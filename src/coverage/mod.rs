//! Coverage module
//!
//! Provides:
//! - LCOV parsing into a normalized [`Summary`]
//! - Threshold evaluation producing a [`Verdict`]

mod lcov;
mod threshold;

pub use lcov::*;
pub use threshold::*;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while loading a coverage report.
#[derive(Debug, Error)]
pub enum CoverageError {
    #[error(
        "could not read coverage report '{}' (generate it first with your test runner's lcov reporter, e.g. `cargo llvm-cov --lcov --output-path {}`)",
        path.display(),
        path.display()
    )]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The four coverage metrics reported per file and in total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Lines,
    Statements,
    Functions,
    Branches,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Lines,
        Metric::Statements,
        Metric::Functions,
        Metric::Branches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Lines => "lines",
            Metric::Statements => "statements",
            Metric::Functions => "functions",
            Metric::Branches => "branches",
        }
    }

    /// Metric key with its first character upper-cased ("lines" -> "Lines")
    pub fn display_name(&self) -> String {
        let key = self.as_str();
        let mut chars = key.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lines" => Ok(Metric::Lines),
            "statements" => Ok(Metric::Statements),
            "functions" => Ok(Metric::Functions),
            "branches" => Ok(Metric::Branches),
            other => anyhow::bail!(
                "Unknown coverage metric: {}. Supported: lines, statements, functions, branches",
                other
            ),
        }
    }
}

/// Total/covered/skipped counts for one metric, with a rounded percentage
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricRecord {
    pub total: u64,
    pub covered: u64,
    pub skipped: u64,
    pub pct: f64,
}

impl MetricRecord {
    /// Build a record. `covered` is clamped to `total`; an empty total is 0%.
    pub fn new(total: u64, covered: u64) -> Self {
        let covered = covered.min(total);
        let pct = if total == 0 {
            0.0
        } else {
            round_pct((covered as f64 / total as f64) * 100.0)
        };

        Self {
            total,
            covered,
            skipped: total - covered,
            pct,
        }
    }
}

/// Round to 2 decimal places
fn round_pct(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format a percentage without a trailing `.0` (85 -> "85", 86.67 -> "86.67")
pub fn format_pct(value: f64) -> String {
    format!("{}", value)
}

/// Aggregate coverage across every file of a report
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CoverageTotals {
    pub lines: MetricRecord,
    pub statements: MetricRecord,
    pub functions: MetricRecord,
    pub branches: MetricRecord,
}

impl CoverageTotals {
    pub fn metric(&self, metric: Metric) -> &MetricRecord {
        match metric {
            Metric::Lines => &self.lines,
            Metric::Statements => &self.statements,
            Metric::Functions => &self.functions,
            Metric::Branches => &self.branches,
        }
    }
}

/// Coverage data for a single source file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    #[serde(skip)]
    pub path: String,
    pub lines: MetricRecord,
    /// Same values as `lines`: LCOV does not distinguish statements from lines.
    pub statements: MetricRecord,
    pub functions: MetricRecord,
    pub branches: MetricRecord,
    /// Strictly ascending 1-based line numbers that were never hit
    pub uncovered_lines: Vec<u32>,
}

impl FileCoverage {
    pub fn metric(&self, metric: Metric) -> &MetricRecord {
        match metric {
            Metric::Lines => &self.lines,
            Metric::Statements => &self.statements,
            Metric::Functions => &self.functions,
            Metric::Branches => &self.branches,
        }
    }
}

/// Normalized coverage for a whole report: one entry per file plus the total
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub total: CoverageTotals,
    /// Files in the order their sections first appear in the report
    pub files: Vec<FileCoverage>,
}

impl Summary {
    /// Build a summary from per-file records, summing counts into the total.
    pub fn from_files(files: Vec<FileCoverage>) -> Self {
        let mut lines = (0u64, 0u64);
        let mut functions = (0u64, 0u64);
        let mut branches = (0u64, 0u64);

        for file in &files {
            lines.0 = lines.0.saturating_add(file.lines.total);
            lines.1 = lines.1.saturating_add(file.lines.covered);
            functions.0 = functions.0.saturating_add(file.functions.total);
            functions.1 = functions.1.saturating_add(file.functions.covered);
            branches.0 = branches.0.saturating_add(file.branches.total);
            branches.1 = branches.1.saturating_add(file.branches.covered);
        }

        let line_record = MetricRecord::new(lines.0, lines.1);
        let total = CoverageTotals {
            lines: line_record,
            statements: line_record,
            functions: MetricRecord::new(functions.0, functions.1),
            branches: MetricRecord::new(branches.0, branches.1),
        };

        Self { total, files }
    }

    pub fn file(&self, path: &str) -> Option<&FileCoverage> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Serializes as `{"total": {...}, "<path>": {...}, ...}`
impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.files.len() + 1))?;
        map.serialize_entry("total", &self.total)?;
        for file in &self.files {
            map.serialize_entry(&file.path, file)?;
        }
        map.end()
    }
}

/// Parse the LCOV report at `path` into a [`Summary`]
pub fn parse_coverage(path: &Path) -> Result<Summary, CoverageError> {
    parse_lcov(path)
}
