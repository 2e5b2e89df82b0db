//! Scanline-based ratio pattern matching, parameterized by a target run
//! ratio vector. Used for both finder patterns (1:1:3:1:1) and alignment
//! patterns (1:1:1:1:1).
//!
//! Grounded in the generic structure described for QR detectors across
//! the pack (no teacher equivalent — the teacher's analyzer never scans
//! raw pixels at all): a same-color run counter slides a window of
//! `ratio.len()` runs across each scanline and checks the run lengths
//! against the expected ratio within tolerance.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoundPattern {
    pub x: f32,
    pub y: f32,
    pub module_size: f32,
    pub count: u32,
    /// Confidence score: sums the per-run ratio deviation of the vertical
    /// and horizontal re-verify scans with the spread of the four
    /// per-direction module-size estimates. Lower is cleaner.
    pub noise: f32,
}

/// Centers a ratio match ending at `end_x` on row `y`, given the five (or
/// N) run lengths just scanned.
fn estimate_module_size(runs: &[u32], ratio: &[u32]) -> f32 {
    let total_runs: u32 = runs.iter().sum();
    let total_ratio: u32 = ratio.iter().sum();
    total_runs as f32 / total_ratio as f32
}

/// Checks whether `runs` matches `ratio` within the standard QR tolerance
/// (each run within 50% of its expected proportion, plus/minus one module).
fn matches_ratio(runs: &[u32], ratio: &[u32]) -> bool {
    if runs.iter().any(|&r| r == 0) {
        return false;
    }
    let module_size = estimate_module_size(runs, ratio);
    if module_size < 0.5 {
        return false;
    }
    let max_variance = module_size * 0.5 + 1.0;
    for (&run, &expected) in runs.iter().zip(ratio.iter()) {
        let target = module_size * expected as f32;
        if (run as f32 - target).abs() > max_variance {
            return false;
        }
    }
    true
}

/// Scans one row, returning every position where the trailing window of
/// `ratio.len()` runs matches `ratio`, as `(center_x, module_size)`.
pub fn scan_row(row: &[bool], ratio: &[u32]) -> Vec<(f32, f32)> {
    let window = ratio.len();
    let mut runs: Vec<u32> = Vec::new();
    let mut run_len = 0u32;
    let mut last = row.first().copied().unwrap_or(false);
    let mut run_start_x = 0usize;
    let mut matches = Vec::new();

    for (x, &dark) in row.iter().enumerate() {
        if dark == last {
            run_len += 1;
        } else {
            runs.push(run_len);
            if runs.len() > window {
                runs.remove(0);
            }
            // A finder/alignment pattern's runs alternate colors starting
            // and ending dark; when `last` was dark and we just closed the
            // window, that run ended at x-1.
            if runs.len() == window && last {
                if matches_ratio(&runs, ratio) {
                    let module_size = estimate_module_size(&runs, ratio);
                    let center = x as f32 - runs[window - 1] as f32 / 2.0;
                    matches.push((center, module_size));
                }
            }
            run_len = 1;
            last = dark;
            run_start_x = x;
        }
    }
    let _ = run_start_x;
    runs.push(run_len);
    if runs.len() > window {
        runs.remove(0);
    }
    if runs.len() == window && last && matches_ratio(&runs, ratio) {
        let module_size = estimate_module_size(&runs, ratio);
        let center = row.len() as f32 - runs[window - 1] as f32 / 2.0;
        matches.push((center, module_size));
    }
    matches
}

/// Extracts the `window` run lengths of the ratio-match centered on
/// `center` within `strip`, by run-length-encoding the whole strip and
/// taking the runs symmetric around whichever run contains `center`.
fn runs_through(strip: &[bool], center: usize, window: usize) -> Option<Vec<u32>> {
    if center >= strip.len() {
        return None;
    }
    let mut rle: Vec<u32> = Vec::new();
    {
        let mut last = strip[0];
        let mut run = 0u32;
        for &v in strip {
            if v == last {
                run += 1;
            } else {
                rle.push(run);
                last = v;
                run = 1;
            }
        }
        rle.push(run);
    }

    let mut cursor = 0usize;
    let mut center_run = 0usize;
    for (i, &len) in rle.iter().enumerate() {
        if center < cursor + len as usize {
            center_run = i;
            break;
        }
        cursor += len as usize;
    }

    let mid = (window / 2) as i64;
    let start = center_run as i64 - mid;
    if start < 0 || start as usize + window > rle.len() {
        return None;
    }
    Some(rle[start as usize..start as usize + window].to_vec())
}

/// Sums each run's absolute deviation from its ratio-predicted length, as
/// a fraction of the estimated module size.
fn run_deviation(runs: &[u32], ratio: &[u32]) -> f32 {
    let module_size = estimate_module_size(runs, ratio);
    if module_size <= 0.0 {
        return f32::MAX;
    }
    runs.iter()
        .zip(ratio.iter())
        .map(|(&run, &expected)| ((run as f32 - module_size * expected as f32) / module_size).abs())
        .sum()
}

/// Builds the full diagonal line through `(cx, cy)` with slope `sign`
/// (+1 for top-left to bottom-right, -1 for bottom-left to top-right),
/// bounded by the image edges. Returns the strip and the index of
/// `(cx, cy)` within it.
fn diagonal_strip(
    grid: &dyn Fn(usize, usize) -> bool,
    width: usize,
    height: usize,
    cx: usize,
    cy: usize,
    sign: i64,
) -> (Vec<bool>, usize) {
    let mut backward = Vec::new();
    let mut step = 1i64;
    loop {
        let px = cx as i64 - step;
        let py = cy as i64 - sign * step;
        if px < 0 || py < 0 || px as usize >= width || py as usize >= height {
            break;
        }
        backward.push(grid(px as usize, py as usize));
        step += 1;
    }
    backward.reverse();
    let center_index = backward.len();

    let mut strip = backward;
    strip.push(grid(cx, cy));
    let mut step = 1i64;
    loop {
        let px = cx as i64 + step;
        let py = cy as i64 + sign * step;
        if px < 0 || py < 0 || px as usize >= width || py as usize >= height {
            break;
        }
        strip.push(grid(px as usize, py as usize));
        step += 1;
    }
    (strip, center_index)
}

/// Runs the full ratio-match confirmation: vertical verify, horizontal
/// re-verify, both-diagonal verify, and noise scoring. Returns `None` if
/// any verification step fails to confirm the ratio, so a raw scanline
/// hit never becomes a `FoundPattern` on its own.
pub fn verify_and_score(
    grid: &dyn Fn(usize, usize) -> bool,
    width: usize,
    height: usize,
    x: f32,
    y: f32,
    module_size: f32,
    ratio: &[u32],
) -> Option<FoundPattern> {
    let window = ratio.len();
    if x < 0.0 || y < 0.0 {
        return None;
    }
    let cx = (x.round() as usize).min(width.saturating_sub(1));
    let cy = (y.round() as usize).min(height.saturating_sub(1));

    let column: Vec<bool> = (0..height).map(|row| grid(cx, row)).collect();
    let vertical_runs = runs_through(&column, cy, window)?;
    if !matches_ratio(&vertical_runs, ratio) {
        return None;
    }
    let vertical_module_size = estimate_module_size(&vertical_runs, ratio);

    let row: Vec<bool> = (0..width).map(|col| grid(col, cy)).collect();
    let horizontal_runs = runs_through(&row, cx, window)?;
    if !matches_ratio(&horizontal_runs, ratio) {
        return None;
    }
    let horizontal_module_size = estimate_module_size(&horizontal_runs, ratio);

    let (down_strip, down_index) = diagonal_strip(grid, width, height, cx, cy, 1);
    let diag_down_runs = runs_through(&down_strip, down_index, window)?;
    if !matches_ratio(&diag_down_runs, ratio) {
        return None;
    }
    let diag_down_size = estimate_module_size(&diag_down_runs, ratio);

    let (up_strip, up_index) = diagonal_strip(grid, width, height, cx, cy, -1);
    let diag_up_runs = runs_through(&up_strip, up_index, window)?;
    if !matches_ratio(&diag_up_runs, ratio) {
        return None;
    }
    let diag_up_size = estimate_module_size(&diag_up_runs, ratio);

    let sizes = [module_size, vertical_module_size, horizontal_module_size, (diag_down_size + diag_up_size) / 2.0];
    let mean_size: f32 = sizes.iter().sum::<f32>() / sizes.len() as f32;
    let size_noise: f32 = sizes.iter().map(|s| (s - mean_size).abs()).sum();
    let run_noise = run_deviation(&vertical_runs, ratio) + run_deviation(&horizontal_runs, ratio);

    Some(FoundPattern { x: cx as f32, y: cy as f32, module_size: mean_size, count: 1, noise: size_noise + run_noise })
}

/// Merges candidate centers that lie within `module_size * tolerance` of
/// each other, averaging position weighted by match count.
pub fn merge_patterns(mut candidates: Vec<FoundPattern>, tolerance: f32) -> Vec<FoundPattern> {
    let mut merged: Vec<FoundPattern> = Vec::new();
    candidates.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap());

    'outer: for candidate in candidates {
        for existing in merged.iter_mut() {
            let distance = ((existing.x - candidate.x).powi(2) + (existing.y - candidate.y).powi(2)).sqrt();
            if distance <= existing.module_size * tolerance {
                let total = (existing.count + candidate.count) as f32;
                existing.x = (existing.x * existing.count as f32 + candidate.x * candidate.count as f32) / total;
                existing.y = (existing.y * existing.count as f32 + candidate.y * candidate.count as f32) / total;
                existing.module_size = (existing.module_size * existing.count as f32 + candidate.module_size * candidate.count as f32) / total;
                existing.noise = (existing.noise * existing.count as f32 + candidate.noise * candidate.count as f32) / total;
                existing.count += candidate.count;
                continue 'outer;
            }
        }
        merged.push(candidate);
    }
    merged
}

pub const FINDER_RATIO: [u32; 5] = [1, 1, 3, 1, 1];
pub const ALIGNMENT_RATIO: [u32; 5] = [1, 1, 1, 1, 1];

#[cfg(test)]
mod tests {
    use super::*;

    fn row_from_runs(runs: &[(bool, usize)]) -> Vec<bool> {
        let mut row = Vec::new();
        for &(dark, len) in runs {
            row.extend(std::iter::repeat(dark).take(len));
        }
        row
    }

    #[test]
    fn scan_row_finds_a_perfect_finder_ratio() {
        let row = row_from_runs(&[(false, 10), (true, 3), (false, 3), (true, 9), (false, 3), (true, 3), (false, 10)]);
        let matches = scan_row(&row, &FINDER_RATIO);
        assert!(!matches.is_empty());
    }

    #[test]
    fn scan_row_rejects_wildly_off_ratio() {
        let row = row_from_runs(&[(false, 10), (true, 1), (false, 1), (true, 1), (false, 20), (true, 1), (false, 10)]);
        let matches = scan_row(&row, &FINDER_RATIO);
        assert!(matches.is_empty());
    }

    #[test]
    fn verify_and_score_confirms_a_finder_like_cross() {
        let pattern_rows = ["1111111", "1000001", "1011101", "1011101", "1011101", "1000001", "1111111"];
        let size = 13usize;
        let mut cells = vec![false; size * size];
        for (r, row) in pattern_rows.iter().enumerate() {
            for (c, ch) in row.chars().enumerate() {
                cells[(r + 3) * size + (c + 3)] = ch == '1';
            }
        }
        let grid = |x: usize, y: usize| cells[y * size + x];
        let found = verify_and_score(&grid, size, size, 6.0, 6.0, 1.0, &FINDER_RATIO);
        assert!(found.is_some());
        assert!(found.unwrap().noise < 1.5);
    }

    #[test]
    fn verify_and_score_rejects_a_lone_horizontal_run() {
        let row = row_from_runs(&[(false, 10), (true, 3), (false, 3), (true, 9), (false, 3), (true, 3), (false, 10)]);
        let size = row.len();
        let grid = |x: usize, y: usize| y == 5 && row[x];
        let found = verify_and_score(&grid, size, 11, 15.0, 5.0, 3.0, &FINDER_RATIO);
        assert!(found.is_none());
    }

    #[test]
    fn merge_patterns_averages_nearby_hits() {
        let candidates = vec![
            FoundPattern { x: 10.0, y: 10.0, module_size: 2.0, count: 1, noise: 0.0 },
            FoundPattern { x: 10.5, y: 10.2, module_size: 2.0, count: 1, noise: 0.0 },
        ];
        let merged = merge_patterns(candidates, 1.0);
        assert_eq!(merged.len(), 1);
    }
}
