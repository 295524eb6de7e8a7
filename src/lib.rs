//! covreport - LCOV coverage summaries for pull requests
//!
//! A library for turning LCOV reports into coverage verdicts with:
//! - Lenient LCOV parsing into per-file and total metrics
//! - Threshold evaluation with one message per failing metric
//! - Markdown/HTML pull request comment rendering
//! - Create-or-update posting of the comment on GitHub

pub mod config;
pub mod coverage;
pub mod notifications;
pub mod report;

pub use coverage::{
    evaluate_thresholds, parse_coverage, parse_lcov_str, CoverageError, FileCoverage, Metric,
    MetricRecord, Summary, ThresholdMap, Verdict,
};
pub use report::{render_comment, CommentOptions};
