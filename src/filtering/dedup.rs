/*! Hash-only line deduplication

[WeakStringSet] answers "has this line been seen during this run?" without keeping the line itself:
only a 64-bit [LineHash] is stored per distinct line, so memory grows with the number of distinct lines
(8 bytes each, plus the set overhead) rather than with their length.

Lines are normalized before hashing: surrounding whitespace is stripped (this also removes the line terminator)
and the text is put in Unicode NFC form. Two lines that are equal after normalization always share a hash.

# Collisions

Hashes are [XxHash64] digests, so two *different* lines can share a hash, in which case the second one is
reported as a duplicate and dropped. There are never false negatives.
For `n` distinct lines the probability of at least one collision is `1 - exp(-n(n-1) / 2^65)`:

| distinct lines | p(at least one collision) |
|---------------:|--------------------------:|
|     10 000 000 |                 ~2.7e-6   |
|    100 000 000 |                 ~2.7e-4   |
|    500 000 000 |                 ~6.7e-3   |

Even when a collision happens, a single line is lost out of hundreds of millions.
See [collision_probability].
!*/
use std::collections::HashSet;
use std::hash::{BuildHasherDefault, Hasher};

use twox_hash::XxHash64;
use unicode_normalization::{is_nfc, UnicodeNormalization};

use crate::error::Error;

use super::FilterMut;

/// Digest of a normalized line.
pub type LineHash = u64;

const HASH_SEED: u64 = 0;

/// Hash a line after stripping surrounding whitespace and applying NFC normalization.
pub fn hash_line(line: &str) -> LineHash {
    let stripped = line.trim();
    let mut hasher = XxHash64::with_seed(HASH_SEED);

    // avoid an allocation when the line is already normalized, which is the common case.
    if is_nfc(stripped) {
        hasher.write(stripped.as_bytes());
    } else {
        let normalized: String = stripped.nfc().collect();
        hasher.write(normalized.as_bytes());
    }
    hasher.finish()
}

/// Probability that at least two of `distinct_lines` different lines share a [LineHash].
pub fn collision_probability(distinct_lines: u64) -> f64 {
    let n = distinct_lines as f64;
    let pairs = n * (n - 1.0) / 2.0;
    -(-pairs / 2f64.powi(64)).exp_m1()
}

/// A set of lines that only holds their hashes.
///
/// ```
/// use mtcorpus::filtering::WeakStringSet;
///
/// let mut unique_strings = WeakStringSet::new();
/// unique_strings.add("string a");
/// unique_strings.add("string b");
///
/// assert!(unique_strings.contains("string a"));
/// assert!(unique_strings.contains("  string b\n"));
/// assert!(!unique_strings.contains("string c"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct WeakStringSet {
    hashes: HashSet<LineHash, BuildHasherDefault<XxHash64>>,
}

impl WeakStringSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hashes: HashSet::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Adds a line. Returns `true` if it was not present before.
    pub fn add(&mut self, line: &str) -> bool {
        self.hashes.insert(hash_line(line))
    }

    pub fn contains(&self, line: &str) -> bool {
        self.hashes.contains(&hash_line(line))
    }

    /// Membership test on an already computed hash.
    pub fn contains_hash(&self, hash: LineHash) -> bool {
        self.hashes.contains(&hash)
    }

    pub fn insert_hash(&mut self, hash: LineHash) -> bool {
        self.hashes.insert(hash)
    }

    pub fn update<'a, I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.hashes.extend(lines.into_iter().map(hash_line));
    }

    /// Removes a line, failing if it is absent.
    pub fn remove(&mut self, line: &str) -> Result<(), Error> {
        if self.hashes.remove(&hash_line(line)) {
            Ok(())
        } else {
            Err(Error::Custom(format!("line not in set: {:?}", line)))
        }
    }

    /// Removes a line if present. Returns whether it was present.
    pub fn discard(&mut self, line: &str) -> bool {
        self.hashes.remove(&hash_line(line))
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for WeakStringSet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut set = Self::new();
        set.update(iter);
        set
    }
}

impl<'a> Extend<&'a str> for WeakStringSet {
    fn extend<T: IntoIterator<Item = &'a str>>(&mut self, iter: T) {
        self.update(iter);
    }
}

impl FilterMut<&str> for WeakStringSet {
    /// Returns `true` for lines that were never seen, and remembers them.
    fn detect_mut(&mut self, line: &str) -> bool {
        self.add(line)
    }
}
