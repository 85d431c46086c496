//! Rolling hash substring search for Blockwise
//!
//! Literal rules and keyword buckets are matched with a Rabin-Karp search
//! instead of a regex engine. A pattern is fingerprinted once at load time;
//! searching a URL then costs one pass over its bytes.
//!
//! # Collision Handling
//!
//! A hash match is always confirmed with a byte comparison of the window,
//! so `search` never reports a false positive.

/// Multiplier for the polynomial hash (32-bit FNV prime).
pub const PRIME_RK: u32 = 16_777_619;

/// Precomputed hash of a literal pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint {
    hash: u32,
    pow: u32,
    literal: String,
}

impl Fingerprint {
    /// Fingerprint `pattern`.
    pub fn new(pattern: &str) -> Self {
        let mut hash = 0u32;
        for &b in pattern.as_bytes() {
            hash = hash.wrapping_mul(PRIME_RK).wrapping_add(b as u32);
        }

        Self {
            hash,
            pow: pow_mod(pattern.len()),
            literal: pattern.to_string(),
        }
    }

    /// Polynomial hash of the pattern, mod 2^32.
    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// `PRIME_RK ^ len`, mod 2^32.
    #[inline]
    pub fn pow(&self) -> u32 {
        self.pow
    }

    /// The pattern this fingerprint was computed from.
    #[inline]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.literal.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.literal.is_empty()
    }
}

/// Compute `PRIME_RK ^ n` by repeated squaring.
#[inline]
fn pow_mod(n: usize) -> u32 {
    let mut pow = 1u32;
    let mut sq = PRIME_RK;
    let mut i = n;
    while i > 0 {
        if i & 1 != 0 {
            pow = pow.wrapping_mul(sq);
        }
        sq = sq.wrapping_mul(sq);
        i >>= 1;
    }
    pow
}

/// Fingerprint a pattern. Shorthand for [`Fingerprint::new`].
#[inline]
pub fn fingerprint(pattern: &str) -> Fingerprint {
    Fingerprint::new(pattern)
}

/// Return true if the fingerprinted pattern occurs anywhere in `text`.
///
/// An empty pattern occurs in every text.
pub fn search(text: &str, fp: &Fingerprint) -> bool {
    let haystack = text.as_bytes();
    let needle = fp.literal.as_bytes();
    let n = needle.len();

    if n > haystack.len() {
        return false;
    }

    let mut h = 0u32;
    for &b in &haystack[..n] {
        h = h.wrapping_mul(PRIME_RK).wrapping_add(b as u32);
    }
    if h == fp.hash && &haystack[..n] == needle {
        return true;
    }

    let mut i = n;
    while i < haystack.len() {
        h = h
            .wrapping_mul(PRIME_RK)
            .wrapping_add(haystack[i] as u32)
            .wrapping_sub(fp.pow.wrapping_mul(haystack[i - n] as u32));
        i += 1;
        if h == fp.hash && &haystack[i - n..i] == needle {
            return true;
        }
    }

    false
}
