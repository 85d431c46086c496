//! Core Matching Engine
//!
//! This is the hot path - every request goes through here. The rule index
//! is shared read-only; the result cache is the only mutable state.

use std::sync::Arc;
use std::time::Instant;

use log::trace;

use crate::cache::{ResultCache, DEFAULT_CAPACITY};
use crate::domain::Domain;
use crate::error::EngineError;
use crate::index::RuleIndex;
use crate::stats::MatchObserver;
use crate::types::{ConstraintMatching, HideEntry, Verdict};

// =============================================================================
// Configuration
// =============================================================================

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of cached verdicts
    pub cache_capacity: usize,
    /// How `$domain=` constraints compare against the source
    pub constraint_matching: ConstraintMatching,
    /// Combine hide entries with identical scopes after loading
    pub merge_hides_by_scope: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            constraint_matching: ConstraintMatching::Exact,
            merge_hides_by_scope: true,
        }
    }
}

// =============================================================================
// Matcher
// =============================================================================

/// The core matching engine.
///
/// `Matcher` is `Send + Sync`; share it behind an `Arc` to match from many
/// threads at once.
pub struct Matcher {
    index: Arc<RuleIndex>,
    cache: ResultCache,
    config: EngineConfig,
    observer: Option<Arc<dyn MatchObserver>>,
}

impl Matcher {
    /// Create a matcher over `index`, finishing its hide merge.
    pub fn new(mut index: RuleIndex, config: EngineConfig) -> Result<Self, EngineError> {
        let cache = ResultCache::new(config.cache_capacity)?;
        index.finalize_hides(config.merge_hides_by_scope);

        Ok(Self {
            index: Arc::new(index),
            cache,
            config,
            observer: None,
        })
    }

    /// Report cache traffic and verdicts to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn MatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn index(&self) -> &Arc<RuleIndex> {
        &self.index
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Match a request from `src` for `req` and return the verdict.
    pub fn match_request(&self, src: &str, req: &str) -> Verdict<'_> {
        let start = Instant::now();

        if let Some(blocked) = self.cache.get(src, req) {
            let verdict = if blocked {
                Verdict::Blocked(None)
            } else {
                Verdict::Allowed
            };
            if let Some(observer) = &self.observer {
                observer.cache_hit(blocked);
                observer.verdict(&verdict, start.elapsed());
            }
            return verdict;
        }

        if let Some(observer) = &self.observer {
            observer.cache_miss();
        }

        let verdict = self.evaluate(src, req);
        self.cache.set(src, req, verdict.is_blocked());

        trace!("{src} -> {req}: {verdict}");
        if let Some(observer) = &self.observer {
            observer.verdict(&verdict, start.elapsed());
        }
        verdict
    }

    /// Return true if the request should be blocked.
    #[inline]
    pub fn matches(&self, src: &str, req: &str) -> bool {
        self.match_request(src, req).is_blocked()
    }

    /// Evaluate the rule index without consulting the cache.
    pub fn evaluate(&self, src: &str, req: &str) -> Verdict<'_> {
        let mode = self.config.constraint_matching;

        let block = match self.index.block().find(src, req, mode) {
            Some(rule) => rule,
            None => return Verdict::Allowed,
        };

        match self.index.exception().find(src, req, mode) {
            Some(exception) => Verdict::ExceptedBy(exception),
            None => Verdict::Blocked(Some(block)),
        }
    }

    /// Hide entries that apply to a page on `page_domain`.
    pub fn hide_entries(&self, page_domain: &str) -> Vec<&HideEntry> {
        self.index.hides().query(&Domain::new(page_domain))
    }

    /// Selectors to hide on a page on `page_domain`.
    pub fn hides_for(&self, page_domain: &str) -> Vec<&str> {
        self.index.hides().selectors_for(page_domain)
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("rules", &self.index.rule_count())
            .field("hides", &self.index.hides().len())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}
