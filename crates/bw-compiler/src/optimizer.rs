use log::info;
use serde::Serialize;

use bw_core::index::RuleIndex;

/// Hide entry counts around the scope merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
}

/// Merge hide entries by selector, then by scope.
///
/// Call once after every list has been loaded. Running it again changes
/// nothing.
pub fn optimize(index: &mut RuleIndex) -> OptimizeStats {
    let hides = index.hides_mut();
    hides.merge_by_selector();
    let before = hides.len();
    hides.merge_by_scope();
    let after = hides.len();

    info!("merged hide entries: {before} -> {after}");
    OptimizeStats { before, after }
}
