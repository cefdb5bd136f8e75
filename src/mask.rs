//! Shell-style wildcard masks.
//!
//! Masks use `*` (any run of characters, including none) and `?` (exactly
//! one character). Every other character matches literally. Matching is
//! case-insensitive and anchored at both ends, so a mask must describe the
//! whole string it is tested against.
//!
//! Compiled masks are memoized by their literal text. The same
//! [`MaskMatcher`] can be shared across scanning threads.
//!
//! # Example
//!
//! ```
//! use dupsweep::mask::MaskMatcher;
//!
//! let matcher = MaskMatcher::new();
//! assert!(matcher.is_match("/data/photos/IMG_0001.JPG", "*.jpg"));
//! assert!(!matcher.is_match("/data/photos/IMG_0001.JPG", "*.png"));
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use regex::{Regex, RegexBuilder};

/// Memoizing wildcard matcher.
#[derive(Debug, Default)]
pub struct MaskMatcher {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl MaskMatcher {
    /// Create an empty matcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test `text` against a single mask.
    pub fn is_match(&self, text: &str, mask: &str) -> bool {
        if let Ok(cache) = self.compiled.read() {
            if let Some(re) = cache.get(mask) {
                return re.is_match(text);
            }
        }

        let re = match compile(mask) {
            Ok(re) => re,
            Err(e) => {
                log::warn!("Invalid mask '{}': {}", mask, e);
                return false;
            }
        };
        let matched = re.is_match(text);
        if let Ok(mut cache) = self.compiled.write() {
            cache.entry(mask.to_string()).or_insert(re);
        }
        matched
    }

    /// Test `text` against a list of masks. An empty list never matches.
    pub fn is_match_any<S: AsRef<str>>(&self, text: &str, masks: &[S]) -> bool {
        masks.iter().any(|mask| self.is_match(text, mask.as_ref()))
    }

    /// Number of distinct masks compiled so far.
    #[must_use]
    pub fn compiled_count(&self) -> usize {
        self.compiled.read().map_or(0, |cache| cache.len())
    }
}

/// Translate a wildcard mask into an anchored, case-insensitive regex.
fn compile(mask: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(mask.len() + 8);
    pattern.push('^');
    for ch in mask.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    pattern.push('$');

    // Literals are escaped; only the compiled size limit can still fail.
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}
