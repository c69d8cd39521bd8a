use regex::Regex;

use crate::segment::Segment;

/// Calendar linearization heuristic (spec.md §4.1 step 8, constants
/// adopted from the original implementation per SPEC_FULL.md §C.1): if two
/// consecutive month-name headers bracket a block containing at least 5
/// day-number tokens, every subsequent month block is shifted down by the
/// first block's height plus a fixed 40px margin, so multi-month
/// calendars linearize into non-overlapping rows instead of stacking at
/// the same y coordinates.
const MARGIN: f64 = 40.0;
const MIN_DAY_TOKENS: usize = 5;

fn month_header_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4}$").unwrap()
    })
}

fn day_token_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}$").unwrap())
}

/// Mutates `segments` in place, shifting the y coordinate of every segment
/// from the second month header onward. Headers are located by their
/// position in DOM-walk (emit) order, not by y, since overlapping calendar
/// widgets commonly occupy the same y range before this pass runs.
pub fn linearize(segments: &mut [Segment]) {
    let headers: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| month_header_regex().is_match(s.content.trim()))
        .map(|(i, _)| i)
        .collect();

    if headers.len() < 2 {
        return;
    }

    let first_header = headers[0];
    let second_header = headers[1];

    let day_count = segments[first_header + 1..second_header]
        .iter()
        .filter(|s| day_token_regex().is_match(s.content.trim()))
        .count();
    if day_count < MIN_DAY_TOKENS {
        return;
    }

    let first_y = segments[first_header].bbox.y;
    let block_max_y = segments[first_header..second_header]
        .iter()
        .map(|s| s.bbox.y + s.bbox.h)
        .fold(first_y, f64::max);
    let offset = (block_max_y - first_y) + MARGIN;

    for seg in segments[second_header..].iter_mut() {
        seg.bbox.y += offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_domain::locator::BoundingBox;

    fn seg(content: &str, y: f64) -> Segment {
        Segment {
            frame_id: "main".into(),
            content: content.into(),
            bbox: BoundingBox { x: 0.0, y, w: 20.0, h: 20.0 },
            xpath: "/html/body".into(),
            locator_string: None,
            bracket_depth: 0,
        }
    }

    #[test]
    fn second_month_block_is_shifted_down_when_day_tokens_overlap() {
        let mut segs = vec![seg("March 2026", 0.0)];
        for d in 1..=6 {
            segs.push(seg(&d.to_string(), 30.0));
        }
        segs.push(seg("April 2026", 0.0));
        segs.push(seg("1", 30.0));

        let before_second_y = segs[segs.len() - 2].bbox.y;
        linearize(&mut segs);
        assert!(segs[segs.len() - 2].bbox.y > before_second_y);
    }

    #[test]
    fn single_month_header_is_left_untouched() {
        let mut segs = vec![seg("March 2026", 0.0), seg("1", 30.0)];
        let original_y: Vec<f64> = segs.iter().map(|s| s.bbox.y).collect();
        linearize(&mut segs);
        let after_y: Vec<f64> = segs.iter().map(|s| s.bbox.y).collect();
        assert_eq!(original_y, after_y);
    }
}
