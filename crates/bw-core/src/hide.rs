//! Element hiding index
//!
//! Raw hide entries (one selector each) are merged in two passes:
//!
//! 1. by selector - every scope a selector was declared with is unioned,
//!    so a query sees all of them at once. Required before querying.
//! 2. by scope - entries with identical (domains, exclude) sets are
//!    combined into one entry with all their selectors. Only reduces the
//!    number of entries a query walks.
//!
//! Both passes consume the entry list and replace it wholesale. Grouping
//! goes through ordered maps, so the output is canonical regardless of the
//! order rules were loaded in.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::domain::{Domain, DomainSet};
use crate::types::HideEntry;

/// Merge progress of a [`HideIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum MergeState {
    /// Entries as they were added
    #[default]
    Raw,
    /// Merged by selector
    BySelector,
    /// Merged by selector, then by scope
    ByScope,
}

/// Element hide entries, queried by page domain.
#[derive(Debug, Clone, Default)]
pub struct HideIndex {
    entries: Vec<HideEntry>,
    state: MergeState,
}

impl HideIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unmerged entry.
    pub fn insert(&mut self, entry: HideEntry) {
        self.entries.push(entry);
        self.state = MergeState::Raw;
    }

    #[inline]
    pub fn state(&self) -> MergeState {
        self.state
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HideEntry] {
        &self.entries
    }

    /// Phase 1: union the scopes of every selector.
    pub fn merge_by_selector(&mut self) {
        if self.state >= MergeState::BySelector {
            return;
        }
        let entries = std::mem::take(&mut self.entries);
        self.entries = merge_by_selector(entries);
        self.state = MergeState::BySelector;
    }

    /// Phase 2: combine entries that share a scope. Runs phase 1 first if
    /// needed; repeated calls are no-ops.
    pub fn merge_by_scope(&mut self) {
        if self.state == MergeState::ByScope {
            return;
        }
        self.merge_by_selector();
        let entries = std::mem::take(&mut self.entries);
        self.entries = merge_by_scope(entries);
        self.state = MergeState::ByScope;
    }

    /// All entries that apply to a page on `page`.
    pub fn query(&self, page: &Domain) -> Vec<&HideEntry> {
        self.entries.iter().filter(|e| e.matches(page)).collect()
    }

    /// Selectors to hide on a page whose host is `page_domain`.
    pub fn selectors_for(&self, page_domain: &str) -> Vec<&str> {
        let page = Domain::new(page_domain);
        self.query(&page)
            .into_iter()
            .flat_map(|e| e.selectors.iter().map(String::as_str))
            .collect()
    }
}

/// Group entries by selector and union their domain and exclude sets.
///
/// Entries holding several selectors are split first, so this is also
/// valid on the output of [`merge_by_scope`].
pub fn merge_by_selector(entries: Vec<HideEntry>) -> Vec<HideEntry> {
    let mut groups: BTreeMap<String, (DomainSet, DomainSet)> = BTreeMap::new();

    for entry in entries {
        for selector in entry.selectors {
            let (domains, exclude) = groups.entry(selector).or_default();
            domains.union_with(&entry.domains);
            exclude.union_with(&entry.exclude);
        }
    }

    groups
        .into_iter()
        .map(|(selector, (domains, exclude))| HideEntry {
            domains,
            exclude,
            selectors: vec![selector],
        })
        .collect()
}

/// Group entries by identical (domains, exclude) and join their selectors.
pub fn merge_by_scope(entries: Vec<HideEntry>) -> Vec<HideEntry> {
    let mut groups: BTreeMap<(DomainSet, DomainSet), Vec<String>> = BTreeMap::new();

    for entry in entries {
        let selectors = groups.entry((entry.domains, entry.exclude)).or_default();
        for selector in entry.selectors {
            if !selectors.contains(&selector) {
                selectors.push(selector);
            }
        }
    }

    groups
        .into_iter()
        .map(|((domains, exclude), selectors)| HideEntry {
            domains,
            exclude,
            selectors,
        })
        .collect()
}

/// Write entries as a user stylesheet, one hiding block per selector.
pub fn write_stylesheet<'a, W, I>(writer: &mut W, entries: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a HideEntry>,
{
    let mut written = 0usize;
    for entry in entries {
        writeln!(
            writer,
            "/* domains: {:?}, exclude: {:?} */",
            entry.domains.to_string(),
            entry.exclude.to_string()
        )?;
        for selector in &entry.selectors {
            writeln!(writer, "{selector}{{display: none !important;}}")?;
            written += 1;
        }
        writeln!(writer)?;
    }
    Ok(written)
}
