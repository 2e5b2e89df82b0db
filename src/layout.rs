//! Matrix layout: function-pattern placement, data/ECC zigzag placement,
//! masking, and mask selection. Generalizes the teacher's `generator.rs` +
//! `mask.rs`, which only interleaved a single block and only covered
//! function patterns for versions up to 20.

use crate::matrix::{Module, ModuleMatrix};
use crate::version::{ECLevel, Version};

pub const MASK_COUNT: u8 = 8;

fn mask_bit(pattern: u8, row: usize, col: usize) -> bool {
    let (r, c) = (row as i64, col as i64);
    match pattern {
        0 => (r + c) % 2 == 0,
        1 => r % 2 == 0,
        2 => c % 3 == 0,
        3 => (r + c) % 3 == 0,
        4 => (r / 2 + c / 3) % 2 == 0,
        5 => (r * c) % 2 + (r * c) % 3 == 0,
        6 => ((r * c) % 2 + (r * c) % 3) % 2 == 0,
        7 => ((r + c) % 2 + (r * c) % 3) % 2 == 0,
        _ => unreachable!("mask pattern out of range 0..8"),
    }
}

fn draw_finder(matrix: &mut ModuleMatrix, top: usize, left: usize) {
    for dr in 0..7usize {
        for dc in 0..7usize {
            let on_ring = dr == 0 || dr == 6 || dc == 0 || dc == 6;
            let in_core = (2..=4).contains(&dr) && (2..=4).contains(&dc);
            let dark = on_ring || in_core;
            matrix.set_reserved(top + dr, left + dc, if dark { Module::Dark } else { Module::Light });
        }
    }
}

fn draw_separator(matrix: &mut ModuleMatrix, top: usize, left: usize, size: usize) {
    // 8x8 region around a finder, clipped to the matrix bounds, all light.
    for dr in 0..8usize {
        for dc in 0..8usize {
            let r = top as i64 + dr as i64 - 1;
            let c = left as i64 + dc as i64 - 1;
            if r >= 0 && c >= 0 && (r as usize) < size && (c as usize) < size {
                let (r, c) = (r as usize, c as usize);
                if !matrix.is_reserved(r, c) {
                    matrix.set_reserved(r, c, Module::Light);
                }
            }
        }
    }
}

fn draw_alignment(matrix: &mut ModuleMatrix, center_row: usize, center_col: usize) {
    for dr in -2i64..=2 {
        for dc in -2i64..=2 {
            let on_ring = dr.abs() == 2 || dc.abs() == 2;
            let dark = on_ring || (dr == 0 && dc == 0);
            matrix.set_reserved(
                (center_row as i64 + dr) as usize,
                (center_col as i64 + dc) as usize,
                if dark { Module::Dark } else { Module::Light },
            );
        }
    }
}

fn draw_timing(matrix: &mut ModuleMatrix, size: usize) {
    for i in 8..size - 8 {
        let dark = i % 2 == 0;
        let module = if dark { Module::Dark } else { Module::Light };
        if !matrix.is_reserved(6, i) {
            matrix.set_reserved(6, i, module);
        }
        if !matrix.is_reserved(i, 6) {
            matrix.set_reserved(i, 6, module);
        }
    }
}

/// Draws finders, separators, timing patterns, alignment patterns, the
/// dark module, and reserves (but does not fill) the format/version info
/// areas. Must run before `place_data`.
pub fn draw_function_patterns(matrix: &mut ModuleMatrix, version: Version) {
    let size = matrix.size();

    draw_finder(matrix, 0, 0);
    draw_finder(matrix, 0, size - 7);
    draw_finder(matrix, size - 7, 0);
    draw_separator(matrix, 0, 0, size);
    draw_separator(matrix, 0, size - 7, size);
    draw_separator(matrix, size - 7, 0, size);

    draw_timing(matrix, size);

    let centers = version.alignment_centers();
    for &row in centers {
        for &col in centers {
            let (row, col) = (row as usize, col as usize);
            let near_finder = (row < 9 && col < 9)
                || (row < 9 && col >= size - 8)
                || (row >= size - 8 && col < 9);
            if !near_finder {
                draw_alignment(matrix, row, col);
            }
        }
    }

    // Dark module, always present.
    matrix.set_reserved(4 * version.value() + 9, 8, Module::Dark);

    // Reserve format-info strips (filled later by `draw_format_info`).
    for i in 0..9 {
        if i != 6 {
            matrix.set_reserved(8, i, Module::Light);
        }
        if i != 6 {
            matrix.set_reserved(i, 8, Module::Light);
        }
    }
    for i in 0..8 {
        matrix.set_reserved(8, size - 1 - i, Module::Light);
        matrix.set_reserved(size - 1 - i, 8, Module::Light);
    }

    if version.value() >= 7 {
        for r in 0..6 {
            for c in 0..3 {
                matrix.set_reserved(r, size - 11 + c, Module::Light);
                matrix.set_reserved(size - 11 + c, r, Module::Light);
            }
        }
    }
}

/// Writes the 15-bit format-info word at both canonical locations.
pub fn draw_format_info(matrix: &mut ModuleMatrix, word: u32) {
    let size = matrix.size();
    for i in 0..=5 {
        matrix.set_reserved(8, i, bit_module(word, i));
    }
    matrix.set_reserved(8, 7, bit_module(word, 6));
    matrix.set_reserved(8, 8, bit_module(word, 7));
    matrix.set_reserved(7, 8, bit_module(word, 8));
    for i in 0..=5 {
        matrix.set_reserved(5 - i, 8, bit_module(word, 9 + i));
    }

    for i in 0..8 {
        matrix.set_reserved(size - 1 - i, 8, bit_module(word, i));
    }
    for i in 0..7 {
        matrix.set_reserved(8, size - 7 + i, bit_module(word, 8 + i));
    }
}

/// Writes the 18-bit version-info word into both 6x3 blocks (v>=7 only).
pub fn draw_version_info(matrix: &mut ModuleMatrix, word: u32) {
    let size = matrix.size();
    for i in 0..18usize {
        let bit = bit_module(word, i);
        matrix.set_reserved(i / 3, size - 11 + i % 3, bit);
        matrix.set_reserved(size - 11 + i % 3, i / 3, bit);
    }
}

fn bit_module(word: u32, bit: usize) -> Module {
    if (word >> bit) & 1 != 0 {
        Module::Dark
    } else {
        Module::Light
    }
}

/// Places interleaved codeword bits into every non-reserved cell via the
/// standard zigzag walk (two columns wide, skipping the timing column),
/// bottom to top then top to bottom, alternately.
pub fn place_data(matrix: &mut ModuleMatrix, codewords: &[u8]) {
    let size = matrix.size();
    let mut bit_index = 0usize;
    let total_bits = codewords.len() * 8;
    let bit_at = |i: usize| -> Module {
        if i >= total_bits {
            return Module::Light;
        }
        let byte = codewords[i / 8];
        let bit = (byte >> (7 - (i % 8))) & 1;
        if bit != 0 { Module::Dark } else { Module::Light }
    };

    let mut col = size - 1;
    let mut going_up = true;
    loop {
        if col == 6 {
            col -= 1;
        }
        for _ in 0..2 {
            let mut row = if going_up { size - 1 } else { 0 };
            loop {
                if !matrix.is_reserved(row, col) {
                    matrix.set(row, col, bit_at(bit_index));
                    bit_index += 1;
                }
                if going_up {
                    if row == 0 {
                        break;
                    }
                    row -= 1;
                } else {
                    row += 1;
                    if row >= size {
                        break;
                    }
                }
            }
            if col == 0 {
                break;
            }
            col -= 1;
        }
        going_up = !going_up;
        if col == 0 {
            break;
        }
        col -= 1;
    }
}

/// XORs the mask formula into every non-reserved cell.
pub fn apply_mask(matrix: &mut ModuleMatrix, pattern: u8) {
    let size = matrix.size();
    for row in 0..size {
        for col in 0..size {
            if !matrix.is_reserved(row, col) && mask_bit(pattern, row, col) {
                matrix.set(row, col, matrix.get(row, col).flip());
            }
        }
    }
}

/// Evaluates the four ISO/IEC 18004 penalty rules with weights (3,3,40,10).
pub fn penalty_score(matrix: &ModuleMatrix) -> u32 {
    rule1(matrix) + rule2(matrix) + rule3(matrix) + rule4(matrix)
}

fn rule1(matrix: &ModuleMatrix) -> u32 {
    let size = matrix.size();
    let mut total = 0u32;
    for row in 0..size {
        total += run_penalty((0..size).map(|c| matrix.get(row, c).is_dark()));
    }
    for col in 0..size {
        total += run_penalty((0..size).map(|r| matrix.get(r, col).is_dark()));
    }
    total
}

fn run_penalty(cells: impl Iterator<Item = bool>) -> u32 {
    let mut total = 0u32;
    let mut run_len = 0u32;
    let mut last = None;
    for dark in cells {
        if Some(dark) == last {
            run_len += 1;
        } else {
            if run_len >= 5 {
                total += run_len - 2;
            }
            run_len = 1;
            last = Some(dark);
        }
    }
    if run_len >= 5 {
        total += run_len - 2;
    }
    total
}

fn rule2(matrix: &ModuleMatrix) -> u32 {
    let size = matrix.size();
    let mut total = 0u32;
    for row in 0..size - 1 {
        for col in 0..size - 1 {
            let a = matrix.get(row, col).is_dark();
            if a == matrix.get(row, col + 1).is_dark()
                && a == matrix.get(row + 1, col).is_dark()
                && a == matrix.get(row + 1, col + 1).is_dark()
            {
                total += 3;
            }
        }
    }
    total
}

const FINDER_LIKE: [bool; 11] = [true, false, true, true, true, false, true, false, false, false, false];

fn rule3(matrix: &ModuleMatrix) -> u32 {
    let size = matrix.size();
    let mut total = 0u32;
    for row in 0..size {
        total += finder_like_runs((0..size).map(|c| matrix.get(row, c).is_dark()).collect());
    }
    for col in 0..size {
        total += finder_like_runs((0..size).map(|r| matrix.get(r, col).is_dark()).collect());
    }
    total
}

fn finder_like_runs(cells: Vec<bool>) -> u32 {
    if cells.len() < 11 {
        return 0;
    }
    let mut count = 0u32;
    for window in cells.windows(11) {
        let forward = window.iter().copied().eq(FINDER_LIKE.iter().copied());
        let backward = window.iter().rev().copied().eq(FINDER_LIKE.iter().copied());
        let forward_inverted = window.iter().copied().map(|b| !b).eq(FINDER_LIKE.iter().copied());
        let backward_inverted = window.iter().rev().copied().map(|b| !b).eq(FINDER_LIKE.iter().copied());
        if forward || backward || forward_inverted || backward_inverted {
            count += 40;
        }
    }
    count
}

fn rule4(matrix: &ModuleMatrix) -> u32 {
    let size = matrix.size();
    let total = (size * size) as u64;
    let dark = (0..size)
        .flat_map(|r| (0..size).map(move |c| (r, c)))
        .filter(|&(r, c)| matrix.get(r, c).is_dark())
        .count() as u64;
    (((2 * dark as i64 - total as i64).unsigned_abs() * 10) / total) as u32
}

/// Tries every mask pattern and returns the lowest-penalty choice.
pub fn select_mask(template: &ModuleMatrix, codewords: &[u8]) -> (u8, ModuleMatrix) {
    let mut best: Option<(u8, u32, ModuleMatrix)> = None;
    for pattern in 0..MASK_COUNT {
        let mut candidate = template.clone();
        place_data(&mut candidate, codewords);
        apply_mask(&mut candidate, pattern);
        let score = penalty_score(&candidate);
        if best.as_ref().map_or(true, |(_, best_score, _)| score < *best_score) {
            best = Some((pattern, score, candidate));
        }
    }
    let (pattern, _, matrix) = best.expect("mask pattern count is nonzero");
    (pattern, matrix)
}

/// Formats `(level, mask)` into the 15-bit codeword via BCH(15,5) with
/// generator `x^10+x^8+x^5+x^4+x^2+x+1` (0b10100110111), XORed with the
/// fixed mask 0x5412.
pub fn encode_format_info(level: ECLevel, mask: u8) -> u32 {
    let data = ((level.bits() as u32) << 3) | mask as u32;
    let mut value = data << 10;
    let generator = 0b10100110111u32;
    for _ in 0..5 {
        if value & 0x4000 != 0 {
            value = (value << 1) ^ generator;
        } else {
            value <<= 1;
        }
    }
    ((data << 10) | (value & 0x3FF)) ^ 0x5412
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_format_info_round_trips_through_table_lookup() {
        let word = encode_format_info(ECLevel::M, 0);
        assert_eq!(crate::version::decode_format_info(word).unwrap(), (ECLevel::M, 0));
    }

    #[test]
    fn encode_format_info_matches_standard_table() {
        assert_eq!(encode_format_info(ECLevel::L, 0), crate::version::format_info_word(ECLevel::L, 0));
    }

    #[test]
    fn function_patterns_reserve_finder_corners() {
        let version = Version::new(1).unwrap();
        let mut matrix = ModuleMatrix::new(version.size());
        draw_function_patterns(&mut matrix, version);
        assert!(matrix.is_reserved(0, 0));
        assert!(matrix.is_reserved(0, version.size() - 1));
        assert!(matrix.is_reserved(version.size() - 1, 0));
    }

    #[test]
    fn mask_pattern_0_checkerboard() {
        assert!(mask_bit(0, 0, 0));
        assert!(!mask_bit(0, 0, 1));
    }

    #[test]
    fn run_penalty_scores_long_runs() {
        let cells = vec![true, true, true, true, true, true];
        assert_eq!(run_penalty(cells.into_iter()), 4);
    }

    #[test]
    fn select_mask_picks_a_valid_pattern() {
        let version = Version::new(1).unwrap();
        let mut template = ModuleMatrix::new(version.size());
        draw_function_patterns(&mut template, version);
        let codewords = vec![0u8; version.total_codewords(ECLevel::L)];
        let (pattern, _matrix) = select_mask(&template, &codewords);
        assert!(pattern < MASK_COUNT);
    }
}
