use std::io::BufRead;

use log::{debug, info};
use serde::Serialize;

use bw_core::error::EngineError;
use bw_core::index::RuleIndex;
use bw_core::types::CompiledItem;

use crate::parser::{parse_line_detailed, RejectReason};

/// Counts from loading one rule source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub lines: usize,
    pub rules: usize,
    pub hides: usize,
    pub blank_keywords: usize,
    pub rejected: usize,
}

impl LoadStats {
    /// Rules and hide entries accepted.
    pub fn accepted(&self) -> usize {
        self.rules + self.hides
    }

    pub fn merge(&mut self, other: &LoadStats) {
        self.lines += other.lines;
        self.rules += other.rules;
        self.hides += other.hides;
        self.blank_keywords += other.blank_keywords;
        self.rejected += other.rejected;
    }

    fn record(&mut self, line: &str, index: &mut RuleIndex) {
        self.lines += 1;
        match parse_line_detailed(line) {
            Ok(item) => {
                match &item {
                    CompiledItem::Hide(_) => self.hides += 1,
                    CompiledItem::Rule(rule) => {
                        self.rules += 1;
                        if rule.keyword.is_empty() {
                            self.blank_keywords += 1;
                        }
                    }
                }
                index.add(item);
            }
            Err(RejectReason::Comment | RejectReason::Blank) => {}
            Err(reason) => {
                debug!("skipping rule {:?}: {reason}", line.trim());
                self.rejected += 1;
            }
        }
    }
}

/// Load newline-separated rules from `reader` into `index`.
///
/// Lines that do not parse are skipped and counted; only read errors fail.
pub fn load_rules<R: BufRead>(index: &mut RuleIndex, mut reader: R) -> Result<LoadStats, EngineError> {
    let mut stats = LoadStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        stats.record(&line, index);
    }

    info!(
        "loaded {} rules and {} hide rules ({} rejected, {} without keyword)",
        stats.rules, stats.hides, stats.rejected, stats.blank_keywords
    );
    Ok(stats)
}

/// Load rules from an in-memory filter list.
pub fn load_str(index: &mut RuleIndex, text: &str) -> LoadStats {
    let mut stats = LoadStats::default();
    for line in text.lines() {
        stats.record(line, index);
    }
    stats
}

/// Compile a filter list into a fresh index.
pub fn build_index(text: &str) -> (RuleIndex, LoadStats) {
    let mut index = RuleIndex::new();
    let stats = load_str(&mut index, text);
    (index, stats)
}
