//! Keyword-bucketed rule index
//!
//! Every rule is filed under the fingerprint of its keyword, in a block or
//! an exception map. At query time a bucket is only evaluated when its
//! keyword occurs in the request URL, which prunes most rules before any
//! regex runs.
//!
//! Rules without a keyword land in the blank bucket and are evaluated on
//! every query. Lists with many such rules get slow; `blank_count` exposes
//! how many there are.

use std::collections::HashMap;

use crate::hash::{search, Fingerprint};
use crate::hide::HideIndex;
use crate::types::{CompiledItem, ConstraintMatching, Rule};

/// Rules sharing one keyword, in insertion order.
#[derive(Debug, Clone)]
pub struct KeywordBucket {
    keyword: Fingerprint,
    rules: Vec<Rule>,
}

impl KeywordBucket {
    pub fn keyword(&self) -> &Fingerprint {
        &self.keyword
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Rules of one kind (block or exception), bucketed by keyword.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    buckets: Vec<KeywordBucket>,
    slots: HashMap<Fingerprint, usize>,
    blank: Vec<Rule>,
    len: usize,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `rule` under its keyword.
    pub fn insert(&mut self, rule: Rule) {
        self.len += 1;

        if rule.keyword.is_empty() {
            self.blank.push(rule);
            return;
        }

        let fp = Fingerprint::new(&rule.keyword);
        let slot = match self.slots.get(&fp) {
            Some(&slot) => slot,
            None => {
                let slot = self.buckets.len();
                self.slots.insert(fp.clone(), slot);
                self.buckets.push(KeywordBucket {
                    keyword: fp,
                    rules: Vec::new(),
                });
                slot
            }
        };
        self.buckets[slot].rules.push(rule);
    }

    /// Rules whose keyword occurs in `req`, plus every blank-keyword rule.
    pub fn candidates<'a>(&'a self, req: &str) -> Vec<&'a Rule> {
        let mut out: Vec<&Rule> = Vec::new();
        for bucket in &self.buckets {
            if search(req, &bucket.keyword) {
                out.extend(bucket.rules.iter());
            }
        }
        out.extend(self.blank.iter());
        out
    }

    /// First candidate matching the request, in candidate order.
    pub fn find<'a>(&'a self, src: &str, req: &str, mode: ConstraintMatching) -> Option<&'a Rule> {
        self.candidates(req)
            .into_iter()
            .find(|rule| rule.matches(src, req, mode))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn blank_count(&self) -> usize {
        self.blank.len()
    }

    pub fn buckets(&self) -> &[KeywordBucket] {
        &self.buckets
    }
}

/// Block rules, exception rules and element hide entries.
///
/// Built once, then shared read-only by every matching context.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    block: KeywordIndex,
    exception: KeywordIndex,
    hides: HideIndex,
}

impl RuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one compiled item to the matching map.
    pub fn add(&mut self, item: CompiledItem) {
        match item {
            CompiledItem::Hide(entry) => self.hides.insert(entry),
            CompiledItem::Rule(rule) if rule.is_exception() => self.exception.insert(rule),
            CompiledItem::Rule(rule) => self.block.insert(rule),
        }
    }

    /// Run the hide merge passes. Phase 1 always runs; phase 2 only when
    /// `merge_by_scope` is set.
    pub fn finalize_hides(&mut self, merge_by_scope: bool) {
        if merge_by_scope {
            self.hides.merge_by_scope();
        } else {
            self.hides.merge_by_selector();
        }
    }

    pub fn block(&self) -> &KeywordIndex {
        &self.block
    }

    pub fn exception(&self) -> &KeywordIndex {
        &self.exception
    }

    pub fn hides(&self) -> &HideIndex {
        &self.hides
    }

    pub fn hides_mut(&mut self) -> &mut HideIndex {
        &mut self.hides
    }

    /// Total number of block and exception rules.
    pub fn rule_count(&self) -> usize {
        self.block.len() + self.exception.len()
    }

    /// Rules that are evaluated on every query.
    pub fn blank_count(&self) -> usize {
        self.block.blank_count() + self.exception.blank_count()
    }
}

impl Extend<CompiledItem> for RuleIndex {
    fn extend<I: IntoIterator<Item = CompiledItem>>(&mut self, iter: I) {
        for item in iter {
            self.add(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::hash::fingerprint;
    use crate::types::{HideEntry, PartyMask, Pattern, RuleFlags};

    fn rule(literal: &str, keyword: &str, flags: RuleFlags) -> Rule {
        Rule {
            text: literal.to_string(),
            flags,
            pattern: Pattern::Literal(fingerprint(literal)),
            keyword: keyword.to_string(),
            domains: Vec::new(),
            party: PartyMask::empty(),
        }
    }

    #[test]
    fn test_rules_partitioned_by_kind() {
        let mut index = RuleIndex::new();
        index.add(CompiledItem::Rule(rule("/ads/", "ads", RuleFlags::empty())));
        index.add(CompiledItem::Rule(rule("/ads/ok", "ads", RuleFlags::EXCEPTION)));
        index.add(CompiledItem::Hide(HideEntry {
            selectors: vec![".ad".to_string()],
            ..HideEntry::default()
        }));

        assert_eq!(index.block().len(), 1);
        assert_eq!(index.exception().len(), 1);
        assert_eq!(index.hides().len(), 1);
        assert_eq!(index.rule_count(), 2);
    }

    #[test]
    fn test_same_keyword_shares_bucket() {
        let mut index = KeywordIndex::new();
        index.insert(rule("/banner/", "banner", RuleFlags::empty()));
        index.insert(rule("-banner-", "banner", RuleFlags::empty()));
        index.insert(rule("/track/", "track", RuleFlags::empty()));

        assert_eq!(index.bucket_count(), 2);
        assert_eq!(index.buckets()[0].rules().len(), 2);
        assert_eq!(index.buckets()[0].keyword().literal(), "banner");
    }

    #[test]
    fn test_candidates_pruned_by_keyword() {
        let mut index = KeywordIndex::new();
        index.insert(rule("/banner/", "banner", RuleFlags::empty()));
        index.insert(rule("/track/", "track", RuleFlags::empty()));
        index.insert(rule("-x-", "", RuleFlags::empty()));

        let candidates = index.candidates("http://example.com/banner/1.png");
        let texts: Vec<&str> = candidates.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["/banner/", "-x-"]);
    }

    #[test]
    fn test_blank_bucket_always_included() {
        let mut index = KeywordIndex::new();
        index.insert(rule("-x-", "", RuleFlags::empty()));
        assert_eq!(index.blank_count(), 1);
        assert_eq!(index.candidates("").len(), 1);
    }

    #[test]
    fn test_find_first_match_in_order() {
        let mut index = KeywordIndex::new();
        index.insert(rule("/ads/one", "ads", RuleFlags::empty()));
        index.insert(rule("/ads/", "ads", RuleFlags::empty()));
        index.insert(rule("/a", "ads", RuleFlags::empty()));

        let found = index
            .find("site.test", "http://x.test/ads/two", ConstraintMatching::Exact)
            .expect("a rule should match");
        assert_eq!(found.text, "/ads/");
    }

    #[test]
    fn test_finalize_hides_merges() {
        let mut index = RuleIndex::new();
        for selector in [".a", ".b"] {
            index.add(CompiledItem::Hide(HideEntry {
                domains: [Domain::new("example.com")].into_iter().collect(),
                selectors: vec![selector.to_string()],
                ..HideEntry::default()
            }));
        }
        index.finalize_hides(false);
        assert_eq!(index.hides().len(), 2);
        index.finalize_hides(true);
        assert_eq!(index.hides().len(), 1);
    }
}
