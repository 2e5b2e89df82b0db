//! Orchestrates binarization, pattern finding, finder grouping, alignment
//! search, and perspective correction into a caller-driven cursor.
//!
//! Modeled as a state machine rather than a generator (Rust has no
//! coroutines in the teacher's style): `advance(success)` is called after
//! each attempted decode, and it returns the next `Detection` to try, or
//! `None` once every finder-triple/alignment-candidate combination in the
//! current sweep has been exhausted.

use crate::alignment_search::search as search_alignment;
use crate::binarizer::{binarize, BitGrid, LuminanceImage};
use crate::error::{QrError, QrResult};
use crate::finder_grouping::{filter_candidates, group_triples, FinderTriple};
use crate::matrix::{Module, ModuleMatrix};
use crate::pattern_finder::{merge_patterns, scan_row, verify_and_score, FoundPattern, FINDER_RATIO};
use crate::perspective::{quad_to_quad, PerspectiveTransform};
use image::RgbImage;

pub struct Detection {
    pub matrix: ModuleMatrix,
}

pub struct Detector {
    grid: BitGrid,
    triples: Vec<FinderTriple>,
    triple_index: usize,
    alignment_index: usize,
    used: std::collections::HashSet<usize>,
}

fn find_finder_candidates(grid: &BitGrid) -> Vec<FoundPattern> {
    let lookup = |x: usize, y: usize| grid.get(x, y);
    let mut candidates = Vec::new();
    for y in 0..grid.height {
        let row: Vec<bool> = (0..grid.width).map(|x| grid.get(x, y)).collect();
        for (x, module_size) in scan_row(&row, &FINDER_RATIO) {
            // A raw scanline hit only confirms the horizontal ratio; verify
            // it cross-checks vertically and diagonally before trusting it.
            if let Some(found) = verify_and_score(&lookup, grid.width, grid.height, x, y as f32, module_size, &FINDER_RATIO) {
                candidates.push(found);
            }
        }
    }
    merge_patterns(candidates, 1.0)
}

/// Checks that row 6 and column 6 of a mapped symbol scan like a timing
/// line: the number of color transitions along each must fall within the
/// same tolerance used to validate finder-to-finder timing during
/// grouping, rejecting malformed or misaligned perspective samples.
fn mapping_timing_line_ok(matrix: &ModuleMatrix) -> bool {
    let size = matrix.size();
    let lower = size.saturating_sub(14).saturating_sub(2usize.max(size.saturating_sub(17) / 4));
    let upper = size + 8;

    let count = |cells: &[bool]| -> usize {
        cells.windows(2).filter(|w| w[0] != w[1]).count()
    };

    let row: Vec<bool> = (0..size).map(|c| matrix.get(6, c).is_dark()).collect();
    let col: Vec<bool> = (0..size).map(|r| matrix.get(r, 6).is_dark()).collect();
    (lower..=upper).contains(&count(&row)) && (lower..=upper).contains(&count(&col))
}

fn quad_from_triple(grid: &BitGrid, triple: &FinderTriple, alignment: Option<&FoundPattern>) -> PerspectiveTransform {
    let size = triple.estimated_size as f32;
    let (br_x, br_y) = if let Some(a) = alignment {
        (a.x, a.y)
    } else {
        (
            triple.top_right.x + triple.bottom_left.x - triple.top_left.x,
            triple.top_right.y + triple.bottom_left.y - triple.top_left.y,
        )
    };
    let _ = grid;
    quad_to_quad(
        (
            triple.top_left.x, triple.top_left.y,
            triple.top_right.x, triple.top_right.y,
            br_x, br_y,
            triple.bottom_left.x, triple.bottom_left.y,
        ),
        (3.5, 3.5, size - 3.5, 3.5, size - 3.5, size - 3.5, 3.5, size - 3.5),
    )
}

fn sample_matrix(grid: &BitGrid, transform: &PerspectiveTransform, size: usize) -> ModuleMatrix {
    let mut matrix = ModuleMatrix::new(size);
    for row in 0..size {
        for col in 0..size {
            let (px, py) = transform.transform(col as f32 + 0.5, row as f32 + 0.5);
            let (px, py) = (px.round() as i64, py.round() as i64);
            let dark = px >= 0
                && py >= 0
                && (px as usize) < grid.width
                && (py as usize) < grid.height
                && grid.get(px as usize, py as usize);
            matrix.set(row, col, if dark { Module::Dark } else { Module::Light });
        }
    }
    matrix
}

impl Detector {
    pub fn new(image: &RgbImage) -> QrResult<Self> {
        let luminance = LuminanceImage::from_rgb(image);
        let grid = binarize(&luminance)?;
        let candidates = filter_candidates(find_finder_candidates(&grid));
        let triples = {
            let lookup = |x: usize, y: usize| grid.get(x, y);
            group_triples(&candidates, &lookup, grid.width, grid.height)
        };
        Ok(Detector {
            grid,
            triples,
            triple_index: 0,
            alignment_index: 0,
            used: std::collections::HashSet::new(),
        })
    }

    /// Returns the next candidate detection, or `None` once every
    /// finder-triple/alignment-candidate pair has been tried.
    pub fn advance(&mut self, previous_succeeded: bool) -> Option<Detection> {
        if previous_succeeded {
            return None;
        }

        loop {
            if self.triple_index >= self.triples.len() {
                return None;
            }
            let key = self.triple_index;
            if self.used.contains(&key) {
                self.triple_index += 1;
                self.alignment_index = 0;
                continue;
            }

            let triple = self.triples[self.triple_index];
            let alignment_candidates = search_alignment(
                &|x, y| self.grid.get(x, y),
                self.grid.width,
                self.grid.height,
                &triple,
            );

            let alignment = alignment_candidates.get(self.alignment_index);
            let transform = quad_from_triple(&self.grid, &triple, alignment);
            let matrix = sample_matrix(&self.grid, &transform, triple.estimated_size);

            if self.alignment_index + 1 < alignment_candidates.len().max(1) {
                self.alignment_index += 1;
            } else {
                self.used.insert(key);
                self.triple_index += 1;
                self.alignment_index = 0;
            }

            if !mapping_timing_line_ok(&matrix) {
                continue;
            }

            return Some(Detection { matrix });
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.triple_index >= self.triples.len()
    }
}

pub fn detect_all(image: &RgbImage) -> QrResult<Detector> {
    Detector::new(image)
}

pub fn detection_exhausted_error() -> QrError {
    QrError::DetectionExhausted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_on_blank_image_has_no_candidates() {
        let image = RgbImage::from_pixel(50, 50, image::Rgb([255, 255, 255]));
        let detector = Detector::new(&image).unwrap();
        assert!(detector.triples.is_empty());
    }
}
