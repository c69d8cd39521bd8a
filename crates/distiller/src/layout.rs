use crate::segment::Segment;

/// Row tie-break distance in page pixels (spec.md §4.1 step 7).
pub const X_NEAR: f64 = 320.0;

/// Two segments are in the same row if their top edges are within this
/// many pixels of each other.
const Y_ROW_THRESHOLD: f64 = 10.0;

/// A vertical gap larger than this between consecutive rows emits a blank
/// line in the ASCII reproduction.
const Y_GAP_THRESHOLD: f64 = 24.0;

/// Approximate monospace character width in pixels, used to translate an
/// absolute x coordinate into a character column.
const H_SCALE: f64 = 8.0;

/// One line of the flattened, coordinate-annotated representation (spec.md
/// §4.1 step 3): `<frame_id> <content> (x=…, y=…, w=…, h=…, xpath=…,
/// locator_string=…)`.
pub fn flatten_line(seg: &Segment) -> String {
    let locator = seg.locator_string.as_deref().unwrap_or("");
    format!(
        "{} {} (x={:.0}, y={:.0}, w={:.0}, h={:.0}, xpath={}, locator_string={})",
        seg.frame_id, seg.content, seg.bbox.x, seg.bbox.y, seg.bbox.w, seg.bbox.h, seg.xpath, locator
    )
}

/// Groups segments into rows by a y-threshold (tie-breaking by nearest x
/// within [`X_NEAR`]) and renders a readable ASCII-like grid: each row's
/// segments are placed at `target_col = round(x / h_scale)`, and a
/// vertical gap beyond [`Y_GAP_THRESHOLD`] between rows emits a blank
/// line (spec.md §4.1 step 7).
pub fn render_layout(segments: &[Segment]) -> String {
    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by(|a, b| {
        a.bbox
            .y
            .partial_cmp(&b.bbox.y)
            .unwrap()
            .then(a.bbox.x.partial_cmp(&b.bbox.x).unwrap())
    });

    let mut rows: Vec<Vec<&Segment>> = Vec::new();
    let mut last_y: Option<f64> = None;
    let mut out = String::new();

    for seg in ordered {
        match last_y {
            Some(y) if (seg.bbox.y - y).abs() <= Y_ROW_THRESHOLD => {
                rows.last_mut().unwrap().push(seg);
            }
            Some(y) => {
                if seg.bbox.y - y > Y_GAP_THRESHOLD {
                    rows.push(Vec::new()); // blank-line marker row
                }
                rows.push(vec![seg]);
                last_y = Some(seg.bbox.y);
            }
            None => {
                rows.push(vec![seg]);
                last_y = Some(seg.bbox.y);
            }
        }
    }

    for row in &rows {
        if row.is_empty() {
            out.push('\n');
            continue;
        }
        let mut sorted_row = row.clone();
        sorted_row.sort_by(|a, b| {
            let near_a = near_bucket(a.bbox.x);
            let near_b = near_bucket(b.bbox.x);
            near_a.cmp(&near_b).then(a.bbox.x.partial_cmp(&b.bbox.x).unwrap())
        });
        let mut line = String::new();
        let mut col = 0usize;
        for seg in sorted_row {
            let target_col = (seg.bbox.x / H_SCALE).round() as usize;
            if target_col > col {
                line.push_str(&" ".repeat(target_col - col));
                col = target_col;
            }
            line.push_str(&seg.content);
            col += seg.content.chars().count();
        }
        out.push_str(&line);
        out.push('\n');
    }

    out
}

fn near_bucket(x: f64) -> i64 {
    (x / X_NEAR).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_domain::locator::BoundingBox;

    fn seg(content: &str, x: f64, y: f64) -> Segment {
        Segment {
            frame_id: "main".into(),
            content: content.into(),
            bbox: BoundingBox { x, y, w: 10.0, h: 10.0 },
            xpath: "/html/body".into(),
            locator_string: None,
            bracket_depth: 0,
        }
    }

    #[test]
    fn same_row_segments_are_placed_on_one_line() {
        let segs = vec![seg("Name:", 0.0, 100.0), seg("{Name}", 80.0, 101.0)];
        let out = render_layout(&segs);
        let line = out.lines().next().unwrap();
        assert!(line.contains("Name:"));
        assert!(line.contains("{Name}"));
    }

    #[test]
    fn large_vertical_gap_emits_blank_line() {
        let segs = vec![seg("Top", 0.0, 0.0), seg("Bottom", 0.0, 500.0)];
        let out = render_layout(&segs);
        assert!(out.contains("\n\n"));
    }

    #[test]
    fn flatten_line_includes_all_fields() {
        let s = seg("[Login]", 12.0, 34.0);
        let line = flatten_line(&s);
        assert!(line.starts_with("main [Login]"));
        assert!(line.contains("xpath=/html/body"));
    }
}
