//! Hostname hierarchy matching
//!
//! A [`Domain`] stores the labels of a hostname in reverse order, so
//! `www.example.com` becomes `["com", "example", "www"]`. A domain then
//! matches every host that it is a label-prefix of: `example.com` matches
//! `www.example.com`, but not the other way around.

use std::collections::BTreeSet;
use std::fmt;

/// A hostname as reversed, lowercased labels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Domain {
    labels: Vec<String>,
}

impl Domain {
    /// Split `host` on `.` and reverse the labels.
    pub fn new(host: &str) -> Self {
        Self {
            labels: host
                .split('.')
                .rev()
                .map(|label| label.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Labels, most significant first.
    #[inline]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Return true if `other` is this domain or one of its subdomains.
    pub fn matches(&self, other: &Domain) -> bool {
        if self.labels.len() > other.labels.len() {
            return false;
        }
        self.labels
            .iter()
            .zip(other.labels.iter())
            .all(|(a, b)| a == b)
    }
}

impl From<&str> for Domain {
    fn from(host: &str) -> Self {
        Self::new(host)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.labels.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(label)?;
        }
        Ok(())
    }
}

/// An ordered set of domains.
///
/// Ordering is canonical, so two sets built from the same domains in a
/// different order compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DomainSet {
    domains: BTreeSet<Domain>,
}

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: Domain) -> bool {
        self.domains.insert(domain)
    }

    /// Add every member of `other` to this set.
    pub fn union_with(&mut self, other: &DomainSet) {
        self.domains.extend(other.domains.iter().cloned());
    }

    /// Return true if any member matches `other`.
    pub fn matches_any(&self, other: &Domain) -> bool {
        self.domains.iter().any(|d| d.matches(other))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter()
    }
}

impl FromIterator<Domain> for DomainSet {
    fn from_iter<I: IntoIterator<Item = Domain>>(iter: I) -> Self {
        Self {
            domains: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for DomainSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, domain) in self.domains.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{domain}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_reversed() {
        let d = Domain::new("www.example.com");
        assert_eq!(d.labels(), &["com", "example", "www"]);
    }

    #[test]
    fn test_parent_matches_child() {
        assert!(Domain::new("a.b").matches(&Domain::new("c.a.b")));
    }

    #[test]
    fn test_child_does_not_match_parent() {
        assert!(!Domain::new("c.a.b").matches(&Domain::new("a.b")));
    }

    #[test]
    fn test_reflexive() {
        assert!(Domain::new("a.b").matches(&Domain::new("a.b")));
    }

    #[test]
    fn test_label_boundary() {
        // "ample.com" is a string suffix of "example.com" but not a label suffix
        assert!(!Domain::new("ample.com").matches(&Domain::new("example.com")));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(Domain::new("Example.COM").matches(&Domain::new("www.example.com")));
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(Domain::new("www.example.com").to_string(), "www.example.com");
    }

    #[test]
    fn test_set_matches_any() {
        let set: DomainSet = ["example.com", "test.org"].into_iter().map(Domain::new).collect();
        assert!(set.matches_any(&Domain::new("cdn.test.org")));
        assert!(!set.matches_any(&Domain::new("other.net")));
        assert!(!DomainSet::new().matches_any(&Domain::new("example.com")));
    }

    #[test]
    fn test_set_order_is_canonical() {
        let a: DomainSet = ["b.com", "a.com"].into_iter().map(Domain::new).collect();
        let b: DomainSet = ["a.com", "b.com"].into_iter().map(Domain::new).collect();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }
}
