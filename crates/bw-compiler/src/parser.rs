use log::{debug, trace};
use regex::Regex;
use thiserror::Error;

use bw_core::domain::{Domain, DomainSet};
use bw_core::hash::Fingerprint;
use bw_core::types::{
    CompiledItem, DomainConstraint, HideEntry, PartyMask, Pattern, Rule, RuleFlags,
};

/// Why a filter line did not produce a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("comment")]
    Comment,
    #[error("blank line")]
    Blank,
    #[error("empty pattern")]
    EmptyPattern,
    #[error("element hide rule without a selector")]
    MalformedHide,
    #[error("unsupported option `{0}`")]
    UnsupportedOption(String),
    #[error("pattern matches almost every request")]
    DegeneratePattern,
    #[error("malformed domain option")]
    InvalidDomainOption,
    #[error("pattern does not compile: {0}")]
    InvalidRegex(String),
}

/// Separator class used for `^`.
const SEPARATOR_CLASS: &str = "[^a-zA-Z0-9_.%-]";

/// Prefix for `||`: optional scheme and optional subdomains.
const HOST_ANCHOR_PREFIX: &str = r"(?:[^:]+://(?:[^/]+\.)?)";

const MIN_KEYWORD_LEN: usize = 3;

/// Request types are not known at match time, so rules restricted to
/// (or excluding) one can never be evaluated faithfully.
const CONTENT_TYPE_OPTIONS: &[&str] = &[
    "script",
    "image",
    "stylesheet",
    "object",
    "xmlhttprequest",
    "xhr",
    "object-subrequest",
    "subdocument",
    "document",
    "elemhide",
    "generichide",
    "other",
    "background",
    "xbl",
    "ping",
    "dtd",
    "media",
    "font",
    "websocket",
    "popup",
];

/// Compile every rule of a filter list, skipping lines that do not parse.
pub fn parse_filter_list(text: &str) -> Vec<CompiledItem> {
    text.lines().filter_map(parse_line).collect()
}

/// Compile one filter line, or `None` if it is not a usable rule.
pub fn parse_line(line: &str) -> Option<CompiledItem> {
    match parse_line_detailed(line) {
        Ok(item) => Some(item),
        Err(RejectReason::Comment | RejectReason::Blank) => None,
        Err(reason) => {
            debug!("skipping rule {line:?}: {reason}");
            None
        }
    }
}

/// Compile one filter line, reporting why it was rejected.
pub fn parse_line_detailed(line: &str) -> Result<CompiledItem, RejectReason> {
    let line = line.trim();
    if line.is_empty() {
        return Err(RejectReason::Blank);
    }
    if is_comment_line(line) {
        return Err(RejectReason::Comment);
    }

    if line.contains("#@#") || line.contains("##") {
        return parse_hide(line).map(CompiledItem::Hide);
    }

    parse_rule(line).map(CompiledItem::Rule)
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

// =============================================================================
// Element hide rules
// =============================================================================

fn parse_hide(line: &str) -> Result<HideEntry, RejectReason> {
    let (exception, (domains_part, selector)) = match line.split_once("#@#") {
        Some(parts) => (true, parts),
        None => match line.split_once("##") {
            Some(parts) => (false, parts),
            None => return Err(RejectReason::MalformedHide),
        },
    };

    let selector = selector.trim();
    if selector.is_empty() {
        return Err(RejectReason::MalformedHide);
    }

    let mut domains = DomainSet::new();
    let mut exclude = DomainSet::new();
    for raw in domains_part.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match raw.strip_prefix('~') {
            Some(name) => {
                exclude.insert(Domain::new(name));
            }
            None if exception => {
                exclude.insert(Domain::new(raw));
            }
            None => {
                domains.insert(Domain::new(raw));
            }
        }
    }

    // an exception needs at least one domain to exclude
    if exception && exclude.is_empty() {
        return Err(RejectReason::MalformedHide);
    }

    Ok(HideEntry {
        domains,
        exclude,
        selectors: vec![selector.to_string()],
    })
}

// =============================================================================
// Blocking rules
// =============================================================================

#[derive(Debug, Default)]
struct ParsedOptions {
    flags: RuleFlags,
    party: PartyMask,
    domains: Vec<DomainConstraint>,
}

fn parse_rule(line: &str) -> Result<Rule, RejectReason> {
    let mut flags = RuleFlags::empty();
    let mut body = line;
    if let Some(rest) = body.strip_prefix("@@") {
        flags |= RuleFlags::EXCEPTION;
        body = rest;
    }

    let (pattern_text, options_text) = split_rule_options(body);
    if pattern_text.is_empty() {
        return Err(RejectReason::EmptyPattern);
    }

    if pattern_text == "|http:" || pattern_text == "|http://" {
        return Err(RejectReason::DegeneratePattern);
    }

    let options = match options_text {
        Some(text) => parse_options(text)?,
        None => ParsedOptions::default(),
    };
    flags |= options.flags;

    let keyword = extract_keyword(pattern_text).to_string();

    let pattern = match glob_to_regex(pattern_text, flags.contains(RuleFlags::MATCH_CASE)) {
        Some(source) => {
            let re = Regex::new(&source).map_err(|e| RejectReason::InvalidRegex(e.to_string()))?;
            Pattern::Glob(re)
        }
        None => Pattern::Literal(Fingerprint::new(pattern_text)),
    };

    Ok(Rule {
        text: line.to_string(),
        flags,
        pattern,
        keyword,
        domains: options.domains,
        party: options.party,
    })
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.split_once('$') {
        Some((pattern, options)) => (pattern, Some(options)),
        None => (line, None),
    }
}

fn parse_options(text: &str) -> Result<ParsedOptions, RejectReason> {
    let mut options = ParsedOptions::default();

    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let raw_lower = raw.to_ascii_lowercase();
        let raw_lower = raw_lower.as_str();

        match raw_lower {
            "match-case" => {
                options.flags |= RuleFlags::MATCH_CASE;
                continue;
            }
            "third-party" => {
                options.party |= PartyMask::THIRD_PARTY;
                continue;
            }
            "~third-party" => {
                options.party |= PartyMask::FIRST_PARTY;
                continue;
            }
            _ => {}
        }

        if raw_lower.starts_with("domain") {
            // the name is matched case-insensitively, the value is kept as written
            let value = raw["domain".len()..]
                .strip_prefix('=')
                .ok_or(RejectReason::InvalidDomainOption)?;
            options.domains.extend(parse_domain_option(value));
            continue;
        }

        let name = raw_lower.strip_prefix('~').unwrap_or(raw_lower);
        if CONTENT_TYPE_OPTIONS.contains(&name) {
            return Err(RejectReason::UnsupportedOption(raw.to_string()));
        }

        trace!("ignoring unknown option {raw:?}");
    }

    Ok(options)
}

fn parse_domain_option(value: &str) -> Vec<DomainConstraint> {
    value
        .split('|')
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| match raw.strip_prefix('~') {
            Some(name) => DomainConstraint::new(name, true),
            None => DomainConstraint::new(raw, false),
        })
        .collect()
}

// =============================================================================
// Keywords
// =============================================================================

#[inline]
fn is_keyword_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'&' || b == b'?'
}

/// Longest run of `[A-Za-z0-9&?]` of at least three bytes; the first one
/// wins ties. Empty if no run qualifies.
pub fn extract_keyword(pattern: &str) -> &str {
    let bytes = pattern.as_bytes();
    let mut best = (0usize, 0usize);
    let mut run_start = None;

    for i in 0..=bytes.len() {
        let in_run = i < bytes.len() && is_keyword_byte(bytes[i]);
        if in_run {
            if run_start.is_none() {
                run_start = Some(i);
            }
        } else if let Some(start) = run_start.take() {
            let len = i - start;
            if len >= MIN_KEYWORD_LEN && len > best.1 - best.0 {
                best = (start, i);
            }
        }
    }

    &pattern[best.0..best.1]
}

// =============================================================================
// Glob translation
// =============================================================================

/// Translate an ABP pattern to a regex source.
///
/// Returns `None` if the pattern has no `^`, `*` or `|` and should be
/// matched as a plain substring instead.
pub fn glob_to_regex(pattern: &str, match_case: bool) -> Option<String> {
    let last = pattern.len().saturating_sub(1);
    let host_anchored = pattern.starts_with("||");
    let mut glob = false;
    let mut out = String::with_capacity(pattern.len() * 2 + 4);
    if !match_case {
        out.push_str("(?i)");
    }

    let mut buf = [0u8; 4];
    for (i, c) in pattern.char_indices() {
        match c {
            '^' => {
                glob = true;
                out.push_str("(?:");
                if i == 0 {
                    out.push_str("^|");
                }
                out.push_str(SEPARATOR_CLASS);
                if i == last {
                    out.push_str("|$");
                }
                out.push(')');
            }
            '*' => {
                glob = true;
                out.push_str(".*");
            }
            '|' => {
                glob = true;
                if i == last {
                    out.push('$');
                }
                if i == 0 {
                    out.push('^');
                }
                if i == 1 && host_anchored {
                    out.push_str(HOST_ANCHOR_PREFIX);
                }
            }
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }

    glob.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(line: &str) -> Rule {
        match parse_line_detailed(line) {
            Ok(CompiledItem::Rule(rule)) => rule,
            other => panic!("expected a rule for {line:?}, got {other:?}"),
        }
    }

    fn hide(line: &str) -> HideEntry {
        match parse_line_detailed(line) {
            Ok(CompiledItem::Hide(entry)) => entry,
            other => panic!("expected a hide entry for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_comments_and_headers() {
        assert_eq!(parse_line_detailed("! comment").err(), Some(RejectReason::Comment));
        assert_eq!(parse_line_detailed("! a##b").err(), Some(RejectReason::Comment));
        assert_eq!(parse_line_detailed("[Adblock Plus 2.0]").err(), Some(RejectReason::Comment));
        assert_eq!(parse_line_detailed("   ").err(), Some(RejectReason::Blank));
    }

    #[test]
    fn test_literal_rule() {
        let r = rule("-ads-");
        assert!(r.pattern.is_literal());
        assert!(!r.is_exception());
        assert_eq!(r.keyword, "ads");
        assert!(r.pattern.matches("http://x.test/-ads-banner.png"));
        assert!(!r.pattern.matches("http://x.test/ads.png"));
    }

    #[test]
    fn test_exception_rule_with_domains() {
        let r = rule("@@-ads-$domain=trusted.test|~bad.test");
        assert!(r.is_exception());
        assert_eq!(r.domains.len(), 2);
        assert_eq!(r.domains[0].name, "trusted.test");
        assert!(!r.domains[0].negated);
        assert_eq!(r.domains[1].name, "bad.test");
        assert!(r.domains[1].negated);
    }

    #[test]
    fn test_domain_option_value_keeps_case() {
        let r = rule("/ads/$Domain=Trusted.Test|~Bad.Test");
        assert_eq!(r.domains[0].name, "Trusted.Test");
        assert_eq!(r.domains[1].name, "Bad.Test");
        assert_eq!(r.domains[0].domain, Domain::new("trusted.test"));
    }

    #[test]
    fn test_party_options() {
        assert!(rule("/ads/$third-party").third_party_only());
        assert!(rule("/ads/$~third-party").first_party_only());
        let plain = rule("/ads/");
        assert!(!plain.third_party_only() && !plain.first_party_only());
    }

    #[test]
    fn test_content_type_options_rejected() {
        for line in ["/ads/$script", "/ads/$~image", "/ads/$third-party,stylesheet", "||x.com^$document"] {
            assert!(
                matches!(parse_line_detailed(line), Err(RejectReason::UnsupportedOption(_))),
                "{line} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_options_ignored() {
        assert!(parse_line("/ads/$collapse").is_some());
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert_eq!(parse_line_detailed("$third-party").err(), Some(RejectReason::EmptyPattern));
        assert_eq!(parse_line_detailed("@@$domain=a.com").err(), Some(RejectReason::EmptyPattern));
    }

    #[test]
    fn test_degenerate_patterns_rejected() {
        assert_eq!(parse_line_detailed("|http:").err(), Some(RejectReason::DegeneratePattern));
        assert_eq!(parse_line_detailed("|http://").err(), Some(RejectReason::DegeneratePattern));
        assert!(parse_line("|http://ads.").is_some());
    }

    #[test]
    fn test_domain_option_without_value() {
        assert_eq!(
            parse_line_detailed("/ads/$domain").err(),
            Some(RejectReason::InvalidDomainOption)
        );
    }

    #[test]
    fn test_extract_keyword() {
        assert_eq!(extract_keyword("||ads.example.com^"), "example");
        assert_eq!(extract_keyword("/banner/ad?id=&x"), "banner");
        assert_eq!(extract_keyword("?ad&id="), "?ad&id");
        assert_eq!(extract_keyword("abc-def"), "abc");
        assert_eq!(extract_keyword("a-b-cd"), "");
    }

    #[test]
    fn test_glob_detection() {
        assert!(glob_to_regex("/ads/banner", false).is_none());
        assert!(glob_to_regex("/ads/*", false).is_some());
        assert!(glob_to_regex("|http://x", false).is_some());
        assert!(glob_to_regex("ads^", false).is_some());
    }

    #[test]
    fn test_glob_translation() {
        assert_eq!(glob_to_regex("a*b", true).as_deref(), Some("a.*b"));
        assert_eq!(glob_to_regex("|a.b|", true).as_deref(), Some(r"^a\.b$"));
        assert_eq!(
            glob_to_regex("^ad^", true).as_deref(),
            Some("(?:^|[^a-zA-Z0-9_.%-])ad(?:[^a-zA-Z0-9_.%-]|$)")
        );
        assert_eq!(
            glob_to_regex("||x.com", false).as_deref(),
            Some(r"(?i)^(?:[^:]+://(?:[^/]+\.)?)x\.com")
        );
    }

    #[test]
    fn test_host_anchor_matching() {
        let r = rule("||ads.example.com^");
        assert!(!r.pattern.is_literal());
        assert!(r.pattern.matches("http://ads.example.com/banner.js"));
        assert!(r.pattern.matches("https://cdn.ads.example.com/x"));
        assert!(r.pattern.matches("http://ads.example.com"));
        assert!(!r.pattern.matches("http://notads.example.com/x.js"));
        assert!(!r.pattern.matches("http://ads.example.community/x.js"));
    }

    #[test]
    fn test_case_sensitivity() {
        assert!(rule("/ADS/*").pattern.matches("http://x.test/ads/1"));
        assert!(!rule("/ADS/*$match-case").pattern.matches("http://x.test/ads/1"));
        assert!(rule("/ADS/*$match-case").pattern.matches("http://x.test/ADS/1"));
    }

    #[test]
    fn test_separator_does_not_match_percent() {
        let r = rule("ads^");
        assert!(r.pattern.matches("http://x.test/ads/"));
        assert!(r.pattern.matches("http://x.test/ads"));
        assert!(!r.pattern.matches("http://x.test/ads%20"));
    }

    #[test]
    fn test_regex_metacharacters_escaped() {
        let r = rule("/ad(s)+.js|");
        assert!(r.pattern.matches("http://x.test/ad(s)+.js"));
        assert!(!r.pattern.matches("http://x.test/adss.js"));
    }

    #[test]
    fn test_hide_rules() {
        let e = hide("example.com,~shop.example.com##.banner");
        assert_eq!(e.selectors, vec![".banner".to_string()]);
        assert_eq!(e.domains.len(), 1);
        assert_eq!(e.exclude.len(), 1);

        let generic = hide("##.ad");
        assert!(generic.is_generic());

        let exception = hide("example.com#@#.banner");
        assert!(exception.domains.is_empty());
        assert!(exception.exclude.matches_any(&Domain::new("example.com")));
    }

    #[test]
    fn test_malformed_hide() {
        assert_eq!(parse_line_detailed("example.com##").err(), Some(RejectReason::MalformedHide));
        assert_eq!(parse_line_detailed("example.com#@#  ").err(), Some(RejectReason::MalformedHide));
        assert_eq!(parse_line_detailed("#@#.ad").err(), Some(RejectReason::MalformedHide));
        assert_eq!(parse_line_detailed(" , #@#.ad").err(), Some(RejectReason::MalformedHide));
    }

    #[test]
    fn test_parse_filter_list() {
        let items = parse_filter_list("! title\n||ads.test^\n\n/ads/$script\n##.ad\n");
        assert_eq!(items.len(), 2);
    }
}
