//! LCOV format parser

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{CoverageError, FileCoverage, MetricRecord, Summary};

/// Parse an LCOV file
pub fn parse_lcov(path: &Path) -> Result<Summary, CoverageError> {
    let bytes = fs::read(path).map_err(|source| CoverageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Read {} bytes of LCOV data from {}", bytes.len(), path.display());

    // Invalid UTF-8 (e.g. Latin-1 file names) is replaced, not rejected
    Ok(parse_lcov_str(&String::from_utf8_lossy(&bytes)))
}

/// Parse LCOV content from a string. Malformed records are skipped.
pub fn parse_lcov_str(content: &str) -> Summary {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if content.trim().is_empty() {
        return Summary::default();
    }

    let mut sections: Vec<Section> = Vec::new();
    let mut in_section = false;

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();

        if let Some(path) = line.strip_prefix("SF:") {
            sections.push(Section::new(path));
            in_section = true;
            continue;
        }

        if line == "end_of_record" {
            in_section = false;
            continue;
        }

        let section = match sections.last_mut() {
            Some(section) if in_section => section,
            _ => {
                if line.starts_with("DA:") {
                    log::debug!("Skipping DA record outside a file section at line {}", index + 1);
                }
                continue;
            }
        };

        if let Some(data) = line.strip_prefix("DA:") {
            match parse_line_hit(data) {
                Some(hit) => section.lines.push(hit),
                None => log::debug!("Skipping malformed DA record at line {}: {}", index + 1, line),
            }
        } else if let Some((tag, value)) = line.split_once(':') {
            let Some(counter) = section.counter_mut(tag) else {
                continue;
            };
            // A repeated counter within one section replaces the earlier value
            match value.trim().parse::<u64>() {
                Ok(count) => *counter = count,
                Err(_) => log::debug!("Skipping malformed {} record at line {}: {}", tag, index + 1, line),
            }
        }
    }

    let files = merge_sections(sections)
        .into_iter()
        .map(Section::into_file_coverage)
        .collect();
    Summary::from_files(files)
}

/// Fold sections that repeat a path into the first one, keeping first-appearance order
fn merge_sections(sections: Vec<Section>) -> Vec<Section> {
    let mut merged: Vec<Section> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();

    for section in sections {
        match by_path.get(&section.path) {
            Some(&slot) => merged[slot].absorb(section),
            None => {
                by_path.insert(section.path.clone(), merged.len());
                merged.push(section);
            }
        }
    }

    merged
}

/// One `DA:<line>,<hits>` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineHit {
    line: u32,
    hits: u64,
}

/// Parse the payload of a DA record; an optional third checksum field is ignored.
fn parse_line_hit(data: &str) -> Option<LineHit> {
    let mut parts = data.split(',');
    let line = parts.next()?.trim().parse::<u32>().ok()?;
    let hits = parts.next()?.trim().parse::<u64>().ok()?;
    Some(LineHit { line, hits })
}

/// Where a file's line counts come from
#[derive(Debug, Clone, PartialEq)]
enum LineSource {
    /// Counted from the section's DA records
    Exact(Vec<LineHit>),
    /// Taken from the section's LF/LH counters when it has no DA records
    Reported { found: u64, hit: u64 },
}

impl LineSource {
    /// (lines metric, uncovered line numbers)
    fn resolve(self) -> (MetricRecord, Vec<u32>) {
        match self {
            LineSource::Exact(hits) => {
                let total = hits.len() as u64;
                let covered = hits.iter().filter(|h| h.hits > 0).count() as u64;
                let mut uncovered: Vec<u32> = hits
                    .iter()
                    .filter(|h| h.hits == 0)
                    .map(|h| h.line)
                    .collect();
                uncovered.sort_unstable();
                uncovered.dedup();
                (MetricRecord::new(total, covered), uncovered)
            }
            LineSource::Reported { found, hit } => (MetricRecord::new(found, hit), Vec::new()),
        }
    }
}

/// Facts accumulated for one `SF:` section
#[derive(Debug, Default)]
struct Section {
    path: String,
    lines: Vec<LineHit>,
    lines_found: u64,
    lines_hit: u64,
    functions_found: u64,
    functions_hit: u64,
    branches_found: u64,
    branches_hit: u64,
}

impl Section {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn counter_mut(&mut self, tag: &str) -> Option<&mut u64> {
        match tag {
            "LF" => Some(&mut self.lines_found),
            "LH" => Some(&mut self.lines_hit),
            "FNF" => Some(&mut self.functions_found),
            "FNH" => Some(&mut self.functions_hit),
            "BRF" => Some(&mut self.branches_found),
            "BRH" => Some(&mut self.branches_hit),
            _ => None,
        }
    }

    fn absorb(&mut self, other: Section) {
        self.lines.extend(other.lines);
        self.lines_found = self.lines_found.saturating_add(other.lines_found);
        self.lines_hit = self.lines_hit.saturating_add(other.lines_hit);
        self.functions_found = self.functions_found.saturating_add(other.functions_found);
        self.functions_hit = self.functions_hit.saturating_add(other.functions_hit);
        self.branches_found = self.branches_found.saturating_add(other.branches_found);
        self.branches_hit = self.branches_hit.saturating_add(other.branches_hit);
    }

    fn line_source(&mut self) -> LineSource {
        if self.lines.is_empty() {
            LineSource::Reported {
                found: self.lines_found,
                hit: self.lines_hit,
            }
        } else {
            LineSource::Exact(std::mem::take(&mut self.lines))
        }
    }

    fn into_file_coverage(mut self) -> FileCoverage {
        let (lines, uncovered_lines) = self.line_source().resolve();

        FileCoverage {
            path: self.path,
            lines,
            statements: lines,
            functions: MetricRecord::new(self.functions_found, self.functions_hit),
            branches: MetricRecord::new(self.branches_found, self.branches_hit),
            uncovered_lines,
        }
    }
}
