//! OTP step rewriting (spec.md §4.8 "OTP", §8 property 7).
//!
//! Two shapes: a single step with `value == "OTP"` gets the full code
//! verbatim; a run of steps targeting `{_<n>}` with `value == "*"` forms a
//! digit-per-box sequence, valid only when the index set is exactly
//! `{1..k}` and the OTP length equals `k`.

use regex::Regex;
use std::sync::OnceLock;

use nav_domain::llm::LlmStep;

fn digit_box_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\{_(\d+)\}$").unwrap())
}

/// Applies OTP substitution across a turn's step list in place. Returns
/// the number of steps that received a digit (0 if neither shape
/// matched).
pub fn apply_otp(steps: &mut [LlmStep], code: &str) -> usize {
    let mut applied = 0;

    for step in steps.iter_mut() {
        if step.value.as_deref() == Some("OTP") {
            step.orig_value = step.value.clone();
            step.value = Some(code.to_string());
            applied += 1;
        }
    }
    if applied > 0 {
        return applied;
    }

    let boxes: Vec<(usize, usize)> = steps
        .iter()
        .enumerate()
        .filter_map(|(idx, s)| {
            if s.value.as_deref() != Some("*") {
                return None;
            }
            digit_box_regex()
                .captures(&s.target)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .map(|n| (idx, n))
        })
        .collect();

    if boxes.is_empty() {
        return 0;
    }

    let k = boxes.len();
    let mut indices: Vec<usize> = boxes.iter().map(|(_, n)| *n).collect();
    indices.sort_unstable();
    let is_contiguous_from_one = indices == (1..=k).collect::<Vec<_>>();

    if !is_contiguous_from_one || code.len() != k || !code.chars().all(|c| c.is_ascii_digit()) {
        return 0;
    }

    let digits: Vec<char> = code.chars().collect();
    for (step_idx, box_n) in boxes {
        let digit = digits[box_n - 1];
        steps[step_idx].orig_value = steps[step_idx].value.clone();
        steps[step_idx].value = Some(digit.to_string());
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_domain::llm::StepAction;

    fn step(target: &str, value: &str) -> LlmStep {
        LlmStep {
            action: StepAction::Fill,
            target: target.into(),
            value: Some(value.into()),
            resolve_value: None,
            locator: None,
            is_expandable: None,
            result: None,
            orig_value: None,
            orig_target: None,
        }
    }

    #[test]
    fn full_code_replaces_single_otp_step() {
        let mut steps = vec![step("{Code}", "OTP")];
        let applied = apply_otp(&mut steps, "482913");
        assert_eq!(applied, 1);
        assert_eq!(steps[0].value.as_deref(), Some("482913"));
    }

    #[test]
    fn contiguous_digit_boxes_get_one_digit_each_in_order() {
        let mut steps = vec![step("{_1}", "*"), step("{_2}", "*"), step("{_3}", "*"), step("{_4}", "*")];
        let applied = apply_otp(&mut steps, "4829");
        assert_eq!(applied, 4);
        assert_eq!(steps[0].value.as_deref(), Some("4"));
        assert_eq!(steps[1].value.as_deref(), Some("8"));
        assert_eq!(steps[2].value.as_deref(), Some("2"));
        assert_eq!(steps[3].value.as_deref(), Some("9"));
    }

    #[test]
    fn non_contiguous_index_set_is_left_unchanged() {
        let mut steps = vec![step("{_1}", "*"), step("{_3}", "*")];
        let applied = apply_otp(&mut steps, "48");
        assert_eq!(applied, 0);
        assert_eq!(steps[0].value.as_deref(), Some("*"));
    }

    #[test]
    fn mismatched_otp_length_is_left_unchanged() {
        let mut steps = vec![step("{_1}", "*"), step("{_2}", "*")];
        let applied = apply_otp(&mut steps, "123");
        assert_eq!(applied, 0);
    }
}
