//! Lexical normalization for free-text answer grading

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalize a learner-typed answer for comparison.
///
/// Lowercases, decomposes to NFD and drops combining marks (so "inversión"
/// and "inversion" compare equal), and trims surrounding whitespace. Pure and
/// total; used only for `input`-type grading.
pub fn normalize(s: &str) -> String {
    s.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)).collect::<String>().trim().to_string()
}
