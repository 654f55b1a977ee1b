//! Scalar-line extraction from raw console timing dumps.
//!
//! The benchmark driver prints bare numbers, one per line, and finishes with
//! exactly two timings in a fixed order: the op1 time followed by the op2
//! time, both in seconds. That print order is a contract the producer has to
//! keep; nothing in the text tells the two values apart.

use regex::Regex;
use std::sync::LazyLock;

/// A line holding nothing but one number.
static ISOLATED_SCALAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*([-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?)\s*$").unwrap()
});

/// Extract the last two lines as `(first, second)`, each multiplied by `scale`.
///
/// Blank lines are ignored. Returns `None` when fewer than two lines remain,
/// or when either of the two selected lines is not a number; a pair is never
/// half-filled.
pub fn extract_pair(text: &str, scale: f64) -> Option<(f64, f64)> {
    let lines: Vec<&str> = text
        .trim()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 2 {
        return None;
    }
    let first = lines[lines.len() - 2].parse::<f64>().ok()?;
    let second = lines[lines.len() - 1].parse::<f64>().ok()?;
    Some((first * scale, second * scale))
}

/// Fallback for dumps with other output mixed in: consider only lines that
/// are a lone number, wherever they occur, and take the last two.
///
/// Same positional contract and strictness as [`extract_pair`].
pub fn extract_isolated_pair(text: &str, scale: f64) -> Option<(f64, f64)> {
    let scalars: Vec<&str> = ISOLATED_SCALAR
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if scalars.len() < 2 {
        return None;
    }
    let first = scalars[scalars.len() - 2].parse::<f64>().ok()?;
    let second = scalars[scalars.len() - 1].parse::<f64>().ok()?;
    Some((first * scale, second * scale))
}
