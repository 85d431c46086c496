//! Blockwise Filter Rule Compiler
//!
//! This crate compiles ABP-style filter lists into a `bw_core::RuleIndex`.

pub mod builder;
pub mod optimizer;
pub mod parser;

pub use builder::{build_index, load_rules, load_str, LoadStats};
pub use optimizer::{optimize, OptimizeStats};
pub use parser::{extract_keyword, glob_to_regex, parse_filter_list, parse_line, RejectReason};
