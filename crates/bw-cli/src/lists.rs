use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Instant;

use log::info;
use serde::Serialize;

use bw_compiler::{load_rules, optimize, LoadStats, OptimizeStats};
use bw_core::index::RuleIndex;
use bw_core::matcher::{EngineConfig, Matcher};

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub lists: usize,
    pub load: LoadStats,
    pub hides: Option<OptimizeStats>,
    pub total_ms: f64,
}

/// Load every rule file into one index and build a matcher over it.
///
/// Unreadable files are reported and skipped. When `status` is given, one
/// summary line per list is written to it.
pub fn load_matcher(
    inputs: &[String],
    config: EngineConfig,
    mut status: Option<&mut dyn Write>,
) -> Result<(Matcher, LoadReport), String> {
    if inputs.is_empty() {
        return Err("No rule files specified".to_string());
    }

    let start = Instant::now();
    let mut index = RuleIndex::new();
    let mut load = LoadStats::default();
    let mut lists = 0usize;

    for (list_id, path) in inputs.iter().enumerate() {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Could not open rule file '{}': {}", path, e);
                continue;
            }
        };

        let stats = load_rules(&mut index, BufReader::new(file))
            .map_err(|e| format!("Failed to read '{}': {}", path, e))?;

        if let Some(out) = status.as_deref_mut() {
            let _ = writeln!(
                out,
                "  [{}] {} - {} lines, {} rules, {} hides, {} rejected",
                list_id,
                Path::new(path).file_name().unwrap_or_default().to_string_lossy(),
                stats.lines,
                stats.rules,
                stats.hides,
                stats.rejected
            );
        }

        load.merge(&stats);
        lists += 1;
    }

    let hides = config.merge_hides_by_scope.then(|| optimize(&mut index));

    let matcher = Matcher::new(index, config).map_err(|e| format!("Invalid configuration: {}", e))?;
    let total_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!("loaded {} of {} rule lists in {:.1}ms", lists, inputs.len(), total_ms);

    Ok((
        matcher,
        LoadReport {
            lists,
            load,
            hides,
            total_ms,
        },
    ))
}
