//! Groups finder-pattern candidates into plausible top-left/top-right/
//! bottom-left triples and estimates symbol orientation and size.

use crate::pattern_finder::FoundPattern;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderTriple {
    pub top_left: FoundPattern,
    pub top_right: FoundPattern,
    pub bottom_left: FoundPattern,
    pub estimated_size: usize,
}

fn distance(a: &FoundPattern, b: &FoundPattern) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Drops low-confidence or noisy candidates before triple enumeration.
pub fn filter_candidates(candidates: Vec<FoundPattern>) -> Vec<FoundPattern> {
    candidates.into_iter().filter(|c| c.count >= 3 && c.noise <= 1.5).collect()
}

/// Enumerates every 3-combination of candidates, rejecting ones whose
/// module sizes disagree, whose angles aren't roughly square, whose
/// long-edge ratio is implausible, whose timing lines don't scan
/// cleanly, or that nest another candidate (superposed symbols), and
/// orients the surviving triples.
pub fn group_triples(
    candidates: &[FoundPattern],
    grid: &dyn Fn(usize, usize) -> bool,
    width: usize,
    height: usize,
) -> Vec<FinderTriple> {
    let mut triples = Vec::new();
    let n = candidates.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if let Some(triple) = try_orient(candidates[i], candidates[j], candidates[k], candidates, grid, width, height) {
                    triples.push(triple);
                }
            }
        }
    }
    triples
}

/// Walks from `from`'s center toward `to`'s center in module-sized steps,
/// counting how many times the underlying grid value changes color; used
/// to estimate how many modules a purported timing line actually crosses.
fn count_transitions(
    grid: &dyn Fn(usize, usize) -> bool,
    width: usize,
    height: usize,
    from: FoundPattern,
    to: FoundPattern,
    module_size: f32,
) -> usize {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let distance = (dx * dx + dy * dy).sqrt();
    if module_size <= 0.0 || distance <= 0.0 {
        return 0;
    }
    let steps = (distance / module_size).round().max(1.0) as usize;
    let mut last: Option<bool> = None;
    let mut transitions = 0usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let px = (from.x + dx * t).round();
        let py = (from.y + dy * t).round();
        if px < 0.0 || py < 0.0 || px as usize >= width || py as usize >= height {
            continue;
        }
        let dark = grid(px as usize, py as usize);
        if let Some(prev) = last {
            if prev != dark {
                transitions += 1;
            }
        }
        last = Some(dark);
    }
    transitions
}

fn sign(p1: (f32, f32), p2: (f32, f32), p3: (f32, f32)) -> f32 {
    (p1.0 - p3.0) * (p2.1 - p3.1) - (p2.0 - p3.0) * (p1.1 - p3.1)
}

fn point_in_triangle(p: (f32, f32), a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> bool {
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Rejects a triple if any other candidate falls strictly inside its
/// top-left/top-right/bottom-left triangle, a telltale sign of a nested,
/// superposed symbol rather than one clean finder grouping.
fn nests_another_pattern(top_left: FoundPattern, top_right: FoundPattern, bottom_left: FoundPattern, all_candidates: &[FoundPattern]) -> bool {
    all_candidates.iter().any(|&p| {
        if p == top_left || p == top_right || p == bottom_left {
            return false;
        }
        point_in_triangle((p.x, p.y), (top_left.x, top_left.y), (top_right.x, top_right.y), (bottom_left.x, bottom_left.y))
    })
}

fn try_orient(
    a: FoundPattern,
    b: FoundPattern,
    c: FoundPattern,
    all_candidates: &[FoundPattern],
    grid: &dyn Fn(usize, usize) -> bool,
    width: usize,
    height: usize,
) -> Option<FinderTriple> {
    let avg_module_size = (a.module_size + b.module_size + c.module_size) / 3.0;
    if avg_module_size <= 0.0 {
        return None;
    }
    for p in [&a, &b, &c] {
        if (p.module_size - avg_module_size).abs() > avg_module_size * 0.6 {
            return None;
        }
    }

    // The hypotenuse is the longest pairwise distance; its endpoints are
    // top-left and bottom-right-ish corners, the third point is the
    // remaining corner (top-right or bottom-left, disambiguated by cross
    // product sign).
    let dab = distance(&a, &b);
    let dbc = distance(&b, &c);
    let dac = distance(&a, &c);

    let (p1, p2, p3) = if dab >= dbc && dab >= dac {
        (a, b, c)
    } else if dbc >= dab && dbc >= dac {
        (b, c, a)
    } else {
        (a, c, b)
    };
    // p1,p2 are the hypotenuse endpoints, p3 is the corner (top-left).
    let top_left = p3;
    let cross = (p1.x - top_left.x) * (p2.y - top_left.y) - (p1.y - top_left.y) * (p2.x - top_left.x);
    let (top_right, bottom_left) = if cross > 0.0 { (p1, p2) } else { (p2, p1) };

    // Angle between the two finder edges must be roughly square.
    let v1 = (top_right.x - top_left.x, top_right.y - top_left.y);
    let v2 = (bottom_left.x - top_left.x, bottom_left.y - top_left.y);
    let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if mag1 <= 0.0 || mag2 <= 0.0 {
        return None;
    }
    let cos_angle = ((v1.0 * v2.0 + v1.1 * v2.1) / (mag1 * mag2)).clamp(-1.0, 1.0);
    let angle_degrees = cos_angle.acos().to_degrees();
    if !(40.0..=140.0).contains(&angle_degrees) {
        return None;
    }

    // The two edges, measured in modules, must agree within a few modules.
    let edge1_modules = mag1 / avg_module_size;
    let edge2_modules = mag2 / avg_module_size;
    if (edge1_modules - edge2_modules).abs() > 4.0 {
        return None;
    }

    let module_count_estimate = ((edge1_modules + edge2_modules) / 2.0).round() as i64;
    // size = 7 modules of finder + gap to opposite finder + 7; normalize
    // to the nearest valid `17 + 4v` grid size.
    let raw_size = module_count_estimate + 7;
    let version = ((raw_size - 17) as f64 / 4.0).round().max(0.0) as i64;
    let estimated_size = (17 + 4 * version.max(1)) as usize;
    if !(21..=177).contains(&estimated_size) {
        return None;
    }

    // Timing-line scan: the number of color transitions walking toward
    // the other two finders must fall within the standard's tolerance.
    let lower_bound = estimated_size.saturating_sub(14).saturating_sub(2usize.max(estimated_size.saturating_sub(17) / 4));
    let upper_bound = estimated_size + 8;
    let transitions_to_tr = count_transitions(grid, width, height, top_left, top_right, avg_module_size);
    let transitions_to_bl = count_transitions(grid, width, height, top_left, bottom_left, avg_module_size);
    if !(lower_bound..=upper_bound).contains(&transitions_to_tr) || !(lower_bound..=upper_bound).contains(&transitions_to_bl) {
        return None;
    }

    if nests_another_pattern(top_left, top_right, bottom_left, all_candidates) {
        return None;
    }

    Some(FinderTriple { top_left, top_right, bottom_left, estimated_size })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(x: f32, y: f32, module_size: f32) -> FoundPattern {
        FoundPattern { x, y, module_size, count: 3, noise: 0.0 }
    }

    // A module-toggling grid: every `module_size`-sized cell alternates
    // color, giving a timing-line transition count proportional to the
    // distance walked, like a real finder-to-finder scan line.
    fn toggling_grid(module_size: f32) -> impl Fn(usize, usize) -> bool {
        move |x, y| (((x + y) as f32 / module_size) as i64) % 2 == 0
    }

    #[test]
    fn filter_candidates_drops_low_confidence() {
        let candidates = vec![
            pattern(0.0, 0.0, 1.0),
            FoundPattern { x: 1.0, y: 1.0, module_size: 1.0, count: 1, noise: 0.0 },
        ];
        assert_eq!(filter_candidates(candidates).len(), 1);
    }

    #[test]
    fn filter_candidates_drops_noisy_hits() {
        let candidates = vec![
            pattern(0.0, 0.0, 1.0),
            FoundPattern { x: 1.0, y: 1.0, module_size: 1.0, count: 3, noise: 2.0 },
        ];
        assert_eq!(filter_candidates(candidates).len(), 1);
    }

    #[test]
    fn orients_a_square_triple() {
        let tl = pattern(10.0, 10.0, 4.0);
        let tr = pattern(90.0, 10.0, 4.0);
        let bl = pattern(10.0, 90.0, 4.0);
        let grid = toggling_grid(4.0);
        let triples = group_triples(&[tl, tr, bl], &grid, 200, 200);
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].top_left, tl);
    }

    #[test]
    fn rejects_mismatched_module_sizes() {
        let tl = pattern(10.0, 10.0, 4.0);
        let tr = pattern(90.0, 10.0, 4.0);
        let bl = pattern(10.0, 90.0, 20.0);
        let grid = toggling_grid(4.0);
        assert!(group_triples(&[tl, tr, bl], &grid, 200, 200).is_empty());
    }

    #[test]
    fn rejects_implausible_timing_line() {
        let tl = pattern(10.0, 10.0, 4.0);
        let tr = pattern(90.0, 10.0, 4.0);
        let bl = pattern(10.0, 90.0, 4.0);
        // A flat grid has no transitions at all, far below the expected
        // timing-line count for an estimated ~29-module symbol.
        let grid = |_: usize, _: usize| false;
        assert!(group_triples(&[tl, tr, bl], &grid, 200, 200).is_empty());
    }

    #[test]
    fn rejects_a_nested_candidate() {
        let tl = pattern(10.0, 10.0, 4.0);
        let tr = pattern(90.0, 10.0, 4.0);
        let bl = pattern(10.0, 90.0, 4.0);
        // A wildly different module size keeps every other 3-combination
        // involving `inner` out on the module-size-agreement check alone,
        // isolating the nesting rejection to the (tl, tr, bl) combination.
        let inner = pattern(40.0, 40.0, 40.0);
        let grid = toggling_grid(4.0);
        let triples = group_triples(&[tl, tr, bl, inner], &grid, 200, 200);
        assert!(triples.is_empty());
    }
}
