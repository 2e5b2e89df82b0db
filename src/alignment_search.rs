//! Predicts and searches for the bottom-right alignment pattern once a
//! finder triple and an approximate symbol size are known.

use crate::finder_grouping::FinderTriple;
use crate::pattern_finder::{scan_row, FoundPattern, ALIGNMENT_RATIO};

/// Predicts the alignment pattern center from the finder triple's
/// geometry: `TL + (BR - TL) * (1 - 3/(size - 7))`, where BR is
/// extrapolated as `TR + BL - TL`.
pub fn predict_position(triple: &FinderTriple) -> (f32, f32) {
    let br_x = triple.top_right.x + triple.bottom_left.x - triple.top_left.x;
    let br_y = triple.top_right.y + triple.bottom_left.y - triple.top_left.y;
    let size = triple.estimated_size as f32;
    let correction = 1.0 - 3.0 / (size - 7.0);
    (
        triple.top_left.x + (br_x - triple.top_left.x) * correction,
        triple.top_left.y + (br_y - triple.top_left.y) * correction,
    )
}

fn avg_module_size(triple: &FinderTriple) -> f32 {
    (triple.top_left.module_size + triple.top_right.module_size + triple.bottom_left.module_size) / 3.0
}

/// Searches a square region around the predicted position for alignment
/// candidates, ranking by `(distance_to_prediction + |module_size_diff|) * noise`.
/// Returns the top-2 candidates, or an empty vec if the search area is too
/// small to bother (size < 25).
pub fn search(grid: &dyn Fn(usize, usize) -> bool, width: usize, height: usize, triple: &FinderTriple) -> Vec<FoundPattern> {
    if triple.estimated_size < 25 {
        return Vec::new();
    }
    let (pred_x, pred_y) = predict_position(triple);
    let module_size = avg_module_size(triple);
    let radius = (20.0f32.min(triple.estimated_size as f32 / 4.0)) * module_size;

    let top = (pred_y - radius).max(0.0) as usize;
    let bottom = ((pred_y + radius) as usize).min(height.saturating_sub(1));
    let left = (pred_x - radius).max(0.0) as usize;
    let right = ((pred_x + radius) as usize).min(width.saturating_sub(1));

    let mut candidates = Vec::new();
    for y in top..=bottom {
        let row: Vec<bool> = (left..=right).map(|x| grid(x, y)).collect();
        for (center_x, size) in scan_row(&row, &ALIGNMENT_RATIO) {
            candidates.push(FoundPattern { x: left as f32 + center_x, y: y as f32, module_size: size, count: 1, noise: 0.0 });
        }
    }

    candidates.sort_by(|a, b| {
        let score_a = ((a.x - pred_x).powi(2) + (a.y - pred_y).powi(2)).sqrt() + (a.module_size - module_size).abs();
        let score_b = ((b.x - pred_x).powi(2) + (b.y - pred_y).powi(2)).sqrt() + (b.module_size - module_size).abs();
        score_a.partial_cmp(&score_b).unwrap()
    });
    candidates.truncate(2);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern_finder::FoundPattern;

    fn pattern(x: f32, y: f32, module_size: f32) -> FoundPattern {
        FoundPattern { x, y, module_size, count: 3, noise: 0.0 }
    }

    fn sample_triple() -> FinderTriple {
        FinderTriple {
            top_left: pattern(10.0, 10.0, 4.0),
            top_right: pattern(138.0, 10.0, 4.0),
            bottom_left: pattern(10.0, 138.0, 4.0),
            estimated_size: 37,
        }
    }

    #[test]
    fn predicts_near_the_bottom_right_corner() {
        let (x, y) = predict_position(&sample_triple());
        assert!(x > 100.0 && y > 100.0);
    }

    #[test]
    fn small_symbols_skip_alignment_search() {
        let mut triple = sample_triple();
        triple.estimated_size = 21;
        let found = search(&|_, _| false, 50, 50, &triple);
        assert!(found.is_empty());
    }
}
