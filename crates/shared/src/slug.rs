//! Station slug generation.
//!
//! Station documents are keyed by a human-readable slug derived from the
//! station name ("Ljubljana Center" -> "ljubljana-center"). Collisions are
//! resolved by appending a short random suffix.

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

/// Maximum length of a generated slug (before any collision suffix).
const MAX_SLUG_LEN: usize = 64;

/// Length of the random collision suffix.
const SUFFIX_LEN: usize = 6;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Derives a slug from a display name.
///
/// Lowercases, replaces runs of non-alphanumeric characters with a single
/// hyphen, trims hyphens at both ends, and truncates. Returns "station"
/// for names with no usable characters.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced = NON_ALNUM.replace_all(&lowered, "-");
    let trimmed = replaced.trim_matches('-');

    let mut slug: String = trimmed.chars().take(MAX_SLUG_LEN).collect();
    // Truncation can leave a trailing hyphen behind
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "station".to_string()
    } else {
        slug
    }
}

/// Appends a random lowercase-alphanumeric suffix for collision resolution.
pub fn with_suffix(slug: &str) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", slug, suffix)
}
