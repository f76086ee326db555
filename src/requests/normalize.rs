//! Cleanup of free-form grating request strings.
//!
//! Observers type the GRATINGS field by hand, so values arrive as anything
//! from a bare `400` to `SYZY 400 l/mm and 600 l/mm (Blue, 0.45" slit)`.
//! Normalization strips the descriptive noise, maps the separator zoo onto
//! commas and splits fused digit runs like `4006001200` against the known
//! line densities.

use std::sync::OnceLock;

use regex::Regex;

use super::ACCEPTED_GRATINGS;

/// Noise substrings removed verbatim before any splitting.
const NOISE: [&str; 9] = [
    "Red",
    "Blue",
    "l/mm",
    "lines/mm",
    "500nm",
    "620nm",
    "620 nm",
    "mm^-1",
    "0.45\" slit",
];

fn parenthetical() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)").expect("hardcoded pattern"))
}

fn mode_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)m[1-4]").expect("hardcoded pattern"))
}

/// Reduces a raw GRATINGS value to the line densities it names.
///
/// Tokens that survive cleanup but match no known grating (fused or not) are
/// dropped with a warning rather than failing the whole file. A value of
/// `N/A` yields nothing.
pub fn normalize_gratings(raw: &str) -> Vec<u16> {
    // The slash in `N/A` must not act as a separator.
    let slash_separates = !raw.contains("N/A");

    let mut text = raw.to_string();
    for noise in NOISE {
        text = text.replace(noise, "");
    }
    text = parenthetical().replace_all(&text, "").into_owned();
    text = text.replace('&', ",").replace(';', ",").replace("and", ",");
    if slash_separates {
        text = text.replace('/', ",");
    }
    // Mode markers carry a digit that would otherwise leak into the numbers.
    text = mode_marker().replace_all(&text, "").into_owned();

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();
    if cleaned.len() <= 1 {
        return Vec::new();
    }

    let mut gratings = Vec::new();
    for token in cleaned.split(',').filter(|token| !token.is_empty()) {
        if let Ok(value) = token.parse::<u16>() {
            if ACCEPTED_GRATINGS.contains(&value) {
                gratings.push(value);
                continue;
            }
        }
        match split_fused(token) {
            Some(parts) => gratings.extend(parts),
            None => log::warn!("dropping unrecognized grating token '{token}' from '{raw}'"),
        }
    }
    gratings
}

/// Splits a fused digit run like `4006001200` into known line densities,
/// trying longer names first. `None` when no complete split exists.
fn split_fused(digits: &str) -> Option<Vec<u16>> {
    fn recurse(digits: &str, candidates: &[(String, u16)]) -> Option<Vec<u16>> {
        if digits.is_empty() {
            return Some(Vec::new());
        }
        for (text, value) in candidates {
            if let Some(rest) = digits.strip_prefix(text.as_str()) {
                if let Some(mut tail) = recurse(rest, candidates) {
                    tail.insert(0, *value);
                    return Some(tail);
                }
            }
        }
        None
    }

    let mut candidates: Vec<(String, u16)> = ACCEPTED_GRATINGS
        .iter()
        .map(|&grating| (grating.to_string(), grating))
        .collect();
    candidates.sort_by_key(|(text, _)| std::cmp::Reverse(text.len()));
    recurse(digits, &candidates)
}
