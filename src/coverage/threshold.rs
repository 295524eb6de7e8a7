//! Coverage threshold validation

use colored::Colorize;

use super::{format_pct, Metric, Summary};

/// Minimum required percentage per metric, kept in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThresholdMap {
    entries: Vec<(Metric, f64)>,
}

impl ThresholdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the threshold for `metric`. An existing entry keeps its position.
    pub fn set(&mut self, metric: Metric, min_pct: f64) {
        match self.entries.iter_mut().find(|(m, _)| *m == metric) {
            Some(entry) => entry.1 = min_pct,
            None => self.entries.push((metric, min_pct)),
        }
    }

    pub fn with(mut self, metric: Metric, min_pct: f64) -> Self {
        self.set(metric, min_pct);
        self
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.entries
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, pct)| *pct)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Metric, f64)> for ThresholdMap {
    fn from_iter<I: IntoIterator<Item = (Metric, f64)>>(iter: I) -> Self {
        let mut map = ThresholdMap::new();
        for (metric, pct) in iter {
            map.set(metric, pct);
        }
        map
    }
}

/// Result of threshold validation
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub passed: bool,
    pub failures: Vec<String>,
    pub summary: String,
}

impl Verdict {
    pub fn print_summary(&self) {
        for failure in &self.failures {
            println!("  {} {}", "✗".red(), failure);
        }

        if self.passed {
            println!("{} {}", "✓".green(), self.summary.green());
        } else {
            println!("{} {}", "✗".red(), self.summary.red().bold());
        }
    }
}

/// Validate total coverage against thresholds
pub fn evaluate_thresholds(summary: &Summary, thresholds: Option<&ThresholdMap>) -> Verdict {
    let thresholds = match thresholds {
        Some(map) if !map.is_empty() => map,
        _ => {
            return Verdict {
                passed: true,
                failures: Vec::new(),
                summary: "No thresholds defined - all checks passed".to_string(),
            }
        }
    };

    let failures: Vec<String> = thresholds
        .iter()
        .filter_map(|(metric, threshold)| {
            let pct = summary.total.metric(metric).pct;
            (pct < threshold).then(|| {
                format!(
                    "{} coverage {}% is below threshold {}%",
                    metric.display_name(),
                    format_pct(pct),
                    format_pct(threshold)
                )
            })
        })
        .collect();

    let total = thresholds.len();
    let summary = if failures.is_empty() {
        format!("All {} thresholds passed", total)
    } else {
        format!("{} of {} thresholds failed", failures.len(), total)
    };

    Verdict {
        passed: failures.is_empty(),
        failures,
        summary,
    }
}
