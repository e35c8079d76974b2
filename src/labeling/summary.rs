use std::collections::BTreeMap;
use std::fmt;

use super::Record;
use crate::network::j1939::pgn_name;

/// Label statistics of a processed log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub skipped_lines: usize,
    pub labels: BTreeMap<String, usize>,
    pub rules: BTreeMap<String, usize>,
    /// Messages flagged as non-normal, per PGN
    pub flagged_pgns: BTreeMap<u32, usize>,
}

impl Summary {
    pub fn from_records(records: &[Record], skipped_lines: usize) -> Self {
        let mut summary = Summary {
            total: records.len(),
            skipped_lines,
            ..Default::default()
        };
        for record in records {
            *summary.labels.entry(record.label.clone()).or_default() += 1;
            for name in record.rule_names() {
                *summary.rules.entry(name.to_string()).or_default() += 1;
            }
            if !record.is_normal() {
                *summary.flagged_pgns.entry(record.pgn).or_default() += 1;
            }
        }
        summary
    }

    pub fn flagged(&self) -> usize {
        self.flagged_pgns.values().sum()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} messages, {} flagged, {} unparsable lines",
            self.total,
            self.flagged(),
            self.skipped_lines
        )?;
        writeln!(f, "Labels:")?;
        for (label, count) in &self.labels {
            writeln!(f, "  {:<24} {}", label, count)?;
        }
        if !self.rules.is_empty() {
            writeln!(f, "Rules fired:")?;
            for (rule, count) in &self.rules {
                writeln!(f, "  {:<24} {}", rule, count)?;
            }
        }
        if !self.flagged_pgns.is_empty() {
            writeln!(f, "Flagged PGNs:")?;
            for (pgn, count) in &self.flagged_pgns {
                let name = pgn_name(*pgn).unwrap_or("-");
                writeln!(f, "  0x{:05X} {:<8} {}", pgn, name, count)?;
            }
        }
        Ok(())
    }
}
