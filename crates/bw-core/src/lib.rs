//! Blockwise Core Library
//!
//! This crate provides the matching engine for the Blockwise request filter.
//! Given a compiled set of Adblock-Plus-style rules it decides, for every
//! (source, requested URL) pair, whether the request should be blocked, and
//! which CSS selectors should be hidden on a page.
//!
//! # Architecture
//!
//! Rules are compiled once (see the `bw-compiler` crate) into a
//! [`RuleIndex`], which is immutable afterwards and shared by every matching
//! thread. Candidate rules are pruned by keyword with a rolling-hash search
//! before any regex runs. A bounded LRU cache sits in front of the index.
//!
//! # Modules
//!
//! - `hash`: Rabin-Karp fingerprints and substring search
//! - `domain`: Reversed-label hostnames and suffix matching
//! - `url`: Lenient host extraction
//! - `types`: Rules, hide entries and verdicts
//! - `index`: Keyword-bucketed rule index
//! - `hide`: Element hide merging and lookup
//! - `cache`: Bounded verdict cache
//! - `matcher`: Core request matching engine
//! - `stats`: Observer hook and counters

pub mod cache;
pub mod domain;
pub mod error;
pub mod hash;
pub mod hide;
pub mod index;
pub mod matcher;
pub mod stats;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use cache::ResultCache;
pub use domain::{Domain, DomainSet};
pub use error::EngineError;
pub use hash::{fingerprint, search, Fingerprint};
pub use hide::HideIndex;
pub use index::RuleIndex;
pub use matcher::{EngineConfig, Matcher};
pub use stats::{MatchObserver, MatchStats};
pub use types::{CompiledItem, ConstraintMatching, HideEntry, Pattern, Rule, Verdict};
