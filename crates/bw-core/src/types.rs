//! Core type definitions for Blockwise
//!
//! Compiled rules, element-hide entries and match verdicts. Rules are
//! created once by the compiler and are immutable afterwards.

use std::fmt;

use regex::Regex;

use crate::domain::{Domain, DomainSet};
use crate::hash::{search, Fingerprint};
use crate::url::{host_of, source_host};

// =============================================================================
// Rule Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for rule behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleFlags: u8 {
        /// Exception rule (@@...) - overrides a block
        const EXCEPTION = 1 << 0;
        /// Case-sensitive matching ($match-case)
        const MATCH_CASE = 1 << 1;
    }
}

// =============================================================================
// Party Masks
// =============================================================================

bitflags::bitflags! {
    /// Origin constraint. Empty means the rule applies to any origin.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PartyMask: u8 {
        /// $~third-party - request host must equal the source host
        const FIRST_PARTY = 1 << 0;
        /// $third-party - request host must differ from the source host
        const THIRD_PARTY = 1 << 1;
    }
}

// =============================================================================
// Domain Constraints
// =============================================================================

/// How `$domain=` constraints compare against the request source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstraintMatching {
    /// Compare the raw source string for equality.
    #[default]
    Exact,
    /// Compare the source host with the [`Domain`] suffix relation.
    Hierarchical,
}

/// One entry of a `$domain=a|~b` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConstraint {
    pub name: String,
    pub domain: Domain,
    pub negated: bool,
}

impl DomainConstraint {
    pub fn new(name: &str, negated: bool) -> Self {
        Self {
            name: name.to_string(),
            domain: Domain::new(name),
            negated,
        }
    }

    #[inline]
    fn applies_to(&self, src: &str, src_domain: Option<&Domain>) -> bool {
        match src_domain {
            Some(d) => self.domain.matches(d),
            None => self.name == src,
        }
    }
}

// =============================================================================
// Patterns
// =============================================================================

/// Compiled URL pattern of a rule.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Plain substring, matched with the rolling hash.
    Literal(Fingerprint),
    /// Pattern with `^`, `*` or `|`, compiled to a regex.
    Glob(Regex),
}

impl Pattern {
    #[inline]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Pattern::Literal(fp) => search(url, fp),
            Pattern::Glob(re) => re.is_match(url),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Pattern::Literal(_))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(fp) => write!(f, "{:?}", fp.literal()),
            Pattern::Glob(re) => f.write_str(re.as_str()),
        }
    }
}

// =============================================================================
// Rules
// =============================================================================

/// A compiled blocking or exception rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// The filter line this rule was compiled from
    pub text: String,
    pub flags: RuleFlags,
    pub pattern: Pattern,
    /// Bucketing keyword; empty if none qualified
    pub keyword: String,
    /// Evaluated in order; empty admits every source
    pub domains: Vec<DomainConstraint>,
    pub party: PartyMask,
}

impl Rule {
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.flags.contains(RuleFlags::EXCEPTION)
    }

    #[inline]
    pub fn third_party_only(&self) -> bool {
        self.party.contains(PartyMask::THIRD_PARTY)
    }

    #[inline]
    pub fn first_party_only(&self) -> bool {
        self.party.contains(PartyMask::FIRST_PARTY)
    }

    /// Full predicate: domain constraints, pattern, then origin.
    pub fn matches(&self, src: &str, req: &str, mode: ConstraintMatching) -> bool {
        self.admits_source(src, mode) && self.pattern.matches(req) && self.matches_origin(src, req)
    }

    /// Check `$domain=` constraints against `src`.
    ///
    /// A negated entry that does not apply to `src` admits it at once; a
    /// negated entry that does apply is skipped, not a rejection. A positive
    /// entry admits only when it applies.
    pub fn admits_source(&self, src: &str, mode: ConstraintMatching) -> bool {
        if self.domains.is_empty() {
            return true;
        }

        let src_domain = match mode {
            ConstraintMatching::Exact => None,
            ConstraintMatching::Hierarchical => Some(Domain::new(source_host(src))),
        };

        for constraint in &self.domains {
            let applies = constraint.applies_to(src, src_domain.as_ref());
            if constraint.negated != applies {
                return true;
            }
        }
        false
    }

    /// Check the first/third-party constraint.
    ///
    /// Fails when either URL cannot be parsed.
    pub fn matches_origin(&self, src: &str, req: &str) -> bool {
        if self.party.is_empty() {
            return true;
        }
        let (src_host, req_host) = match (host_of(src), host_of(req)) {
            (Some(s), Some(r)) => (s, r),
            _ => return false,
        };
        (src_host == req_host) != self.third_party_only()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// =============================================================================
// Element Hiding
// =============================================================================

/// Selectors to hide on pages within `domains` and outside `exclude`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct HideEntry {
    pub domains: DomainSet,
    pub exclude: DomainSet,
    pub selectors: Vec<String>,
}

impl HideEntry {
    /// Return true if this entry applies to a page on `page`.
    ///
    /// Exclusion always wins over inclusion.
    pub fn matches(&self, page: &Domain) -> bool {
        if self.is_generic() {
            return true;
        }
        if self.exclude.matches_any(page) {
            return false;
        }
        self.domains.is_empty() || self.domains.matches_any(page)
    }

    #[inline]
    pub fn is_generic(&self) -> bool {
        self.domains.is_empty() && self.exclude.is_empty()
    }
}

/// Output of compiling one filter line.
#[derive(Debug, Clone)]
pub enum CompiledItem {
    Rule(Rule),
    Hide(HideEntry),
}

// =============================================================================
// Verdict
// =============================================================================

/// Outcome of matching a request.
#[derive(Debug, Clone, Copy)]
pub enum Verdict<'a> {
    /// No block rule matched.
    Allowed,
    /// Blocked. The rule is absent when the answer came from the cache.
    Blocked(Option<&'a Rule>),
    /// A block rule matched but this exception overrode it.
    ExceptedBy(&'a Rule),
}

impl<'a> Verdict<'a> {
    #[inline]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Verdict::Blocked(_))
    }

    /// The rule responsible for this verdict, if known.
    pub fn rule(&self) -> Option<&'a Rule> {
        match *self {
            Verdict::Allowed => None,
            Verdict::Blocked(rule) => rule,
            Verdict::ExceptedBy(rule) => Some(rule),
        }
    }
}

impl fmt::Display for Verdict<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allowed => f.write_str("allowed"),
            Verdict::Blocked(Some(rule)) => write!(f, "blocked by {rule}"),
            Verdict::Blocked(None) => f.write_str("blocked (cached)"),
            Verdict::ExceptedBy(rule) => write!(f, "allowed by exception {rule}"),
        }
    }
}
