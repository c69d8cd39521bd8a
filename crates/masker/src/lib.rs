//! Data Masker (C2): masks digit-bearing tokens in distilled page text
//! before it reaches the model, and reversibly unmasks tokens the model
//! echoes back (spec.md §4.2).
//!
//! A token is masked by substituting every digit through a permutation
//! fixed for the lifetime of one [`Masker::mask`] call. This keeps the
//! token's shape (useful for a model reasoning about a date-like or
//! account-like field) while still hiding the real value, and gives
//! `unmask` two cheap fallbacks: an exact reverse lookup, and a
//! normalized-number lookup for values the model reformats.

use std::collections::{HashMap, HashSet};

use nav_domain::config::masking::MaskingConfig;
use regex::Regex;

/// A digit-bearing run of non-whitespace characters, which is the unit
/// `mask`/`unmask` operate on.
fn token_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\S*\d\S*").unwrap())
}

fn date_shape_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,4}[/-]\d{1,2}([/-]\d{1,4})?$").unwrap())
}

fn time_shape_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\d{1,2}:\d{2}(:\d{2})?\s?(am|pm)?$").unwrap())
}

const MONTH_NAMES: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "sept", "oct", "nov", "dec",
];

fn is_month_with_digit_shape(token: &str) -> bool {
    let lower = token.to_lowercase();
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    has_digit && MONTH_NAMES.iter().any(|m| lower.contains(m))
}

fn is_date_or_time_shape(token: &str) -> bool {
    date_shape_regex().is_match(token) || time_shape_regex().is_match(token) || is_month_with_digit_shape(token)
}

/// Digit harvested from the task goal or another out-of-band source,
/// added to the donot-mask set so the model's own task text is never
/// masked back at it (spec.md §4.2).
pub fn harvest_digit_tokens(text: &str) -> HashSet<String> {
    token_regex().find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// A permutation of the ten digits, fixed for one masking pass.
#[derive(Debug, Clone, Copy)]
struct DigitPermutation {
    forward: [u8; 10],
    inverse: [u8; 10],
}

impl DigitPermutation {
    fn random() -> Self {
        use rand::seq::SliceRandom;
        let mut digits: Vec<u8> = (0..10).collect();
        digits.shuffle(&mut rand::thread_rng());
        let mut forward = [0u8; 10];
        let mut inverse = [0u8; 10];
        for (i, &d) in digits.iter().enumerate() {
            forward[i] = d;
            inverse[d as usize] = i as u8;
        }
        Self { forward, inverse }
    }

    fn substitute(&self, token: &str) -> String {
        token
            .chars()
            .map(|c| match c.to_digit(10) {
                Some(d) => std::char::from_digit(self.forward[d as usize] as u32, 10).unwrap(),
                None => c,
            })
            .collect()
    }
}

/// The outcome of one [`Masker::mask`] call: the masked text plus
/// everything needed to reverse it.
#[derive(Debug, Clone, Default)]
pub struct MaskMap {
    /// Exact masked-token -> original-token.
    token_map: HashMap<String, String>,
    /// Normalized masked-number -> original-token, for values the model
    /// reformats in its own output before echoing them back.
    numeric_map: HashMap<String, String>,
}

impl MaskMap {
    fn record(&mut self, masked: &str, original: &str) {
        self.token_map.entry(masked.to_string()).or_insert_with(|| original.to_string());
        let normalized = normalize_number(masked);
        self.numeric_map.entry(normalized).or_insert_with(|| original.to_string());
    }

    /// Reverse every masked token found in `text`, leaving everything
    /// else untouched (spec.md §8 property 1).
    pub fn unmask(&self, text: &str) -> String {
        if self.token_map.is_empty() {
            return text.to_string();
        }
        let re = token_regex();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in re.find_iter(text) {
            out.push_str(&text[last..m.start()]);
            let word = m.as_str();
            if let Some(original) = self.token_map.get(word) {
                out.push_str(original);
            } else if let Some(original) = self.numeric_map.get(&normalize_number(word)) {
                out.push_str(original);
            } else {
                out.push_str(word);
            }
            last = m.end();
        }
        out.push_str(&text[last..]);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.token_map.is_empty()
    }
}

/// Strips `{}[](),:;$'` wrapping/punctuation, collapses a trailing `.0`,
/// and preserves a leading sign or `$` (spec.md §4.2 "normalized-number
/// lookup").
fn normalize_number(token: &str) -> String {
    let sign = if token.starts_with('-') { "-" } else { "" };
    let dollar = if token.contains('$') { "$" } else { "" };
    let mut digits_and_dot: String = token.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if let Some(stripped) = digits_and_dot.strip_suffix(".0") {
        digits_and_dot = stripped.to_string();
    }
    format!("{sign}{dollar}{digits_and_dot}")
}

/// Masks digit-bearing tokens in distilled page text (spec.md §4.2).
pub struct Masker {
    min_token_length: usize,
    donot_mask: HashSet<String>,
}

impl Masker {
    pub fn new(config: &MaskingConfig) -> Self {
        Self { min_token_length: config.min_token_length, donot_mask: config.donot_mask.clone() }
    }

    /// Builds a masker for one task, seeding the donot-mask set with
    /// digit tokens harvested from the task goal so the model's own
    /// wording is never masked back at it.
    pub fn for_task(config: &MaskingConfig, task_goal: &str) -> Self {
        let mut masker = Self::new(config);
        masker.donot_mask.extend(harvest_digit_tokens(task_goal));
        masker
    }

    fn should_mask(&self, token: &str) -> bool {
        if self.donot_mask.contains(token) {
            return false;
        }
        if is_date_or_time_shape(token) {
            return false;
        }
        token.len() >= self.min_token_length
    }

    /// Masks every eligible digit-bearing token in `text`, returning the
    /// masked text and a [`MaskMap`] that reverses it. A fresh digit
    /// permutation is drawn for each call, matching "mapping is 1:1 and
    /// stable within a single distilled text" (spec.md §4.2).
    pub fn mask(&self, text: &str) -> (String, MaskMap) {
        let permutation = DigitPermutation::random();
        let mut map = MaskMap::default();
        let re = token_regex();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in re.find_iter(text) {
            out.push_str(&text[last..m.start()]);
            let word = m.as_str();
            if self.should_mask(word) {
                let masked = permutation.substitute(word);
                map.record(&masked, word);
                out.push_str(&masked);
            } else {
                out.push_str(word);
            }
            last = m.end();
        }
        out.push_str(&text[last..]);
        (out, map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masker() -> Masker {
        Masker::new(&MaskingConfig { min_token_length: 5, donot_mask: d_set(&["1099", "2024", "2025", "2026", "401k"]) })
    }

    fn d_set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mask_round_trip_on_account_like_token() {
        let m = masker();
        let text = "Account number 4000123456 is active";
        let (masked, map) = m.mask(text);
        assert_ne!(masked, text);
        assert_eq!(map.unmask(&masked), text);
    }

    #[test]
    fn seeded_years_are_never_masked() {
        let m = masker();
        let text = "Filed in 2024 under form 1099 for 401k";
        let (masked, _) = m.mask(text);
        assert_eq!(masked, text);
    }

    #[test]
    fn date_shapes_are_not_masked() {
        let m = masker();
        let text = "Due 03/15/2027 at 10:30am";
        let (masked, _) = m.mask(text);
        assert_eq!(masked, text);
    }

    #[test]
    fn short_digit_tokens_are_not_masked() {
        let m = masker();
        let text = "Room 42";
        let (masked, _) = m.mask(text);
        assert_eq!(masked, text);
    }

    #[test]
    fn unmask_is_identity_on_text_with_no_masked_tokens() {
        let m = masker();
        let map = m.mask("no digits here at all").1;
        assert_eq!(map.unmask("plain text unaffected"), "plain text unaffected");
    }

    #[test]
    fn unmask_recovers_a_reformatted_echo_via_numeric_fallback() {
        let m = masker();
        let (masked, map) = m.mask("Policy 9988776655 on file");
        let masked_number = masked.split_whitespace().nth(1).unwrap();
        let reformatted = format!("{masked_number}.0");
        assert_eq!(map.unmask(&reformatted), "9988776655");
    }

    #[test]
    fn for_task_harvests_goal_digits_into_donot_mask() {
        let config = MaskingConfig { min_token_length: 5, donot_mask: d_set(&[]) };
        let m = Masker::for_task(&config, "Look up invoice 778899 for this customer");
        let (masked, _) = m.mask("Invoice 778899 total due");
        assert_eq!(masked, "Invoice 778899 total due");
    }
}
