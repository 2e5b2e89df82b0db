//! Reverses `layout.rs`: reads format/version info, extracts codewords
//! from an already-binarized symbol matrix, and undoes the data mask.
//!
//! The teacher's `analyzer.rs` only read format info from a 32-entry
//! lookup table (accurate) but extracted codewords from a pre-cropped,
//! noiseless matrix with no Hamming correction and no mirror fallback;
//! this module adds both, grounded in `rizwankce-RustQR`'s
//! `decoder/format.rs` bit-flip correction strategy and ISO/IEC 18004's
//! mirrored-symbol recovery path.

use crate::error::QrResult;
use crate::layout::{apply_mask, draw_function_patterns};
use crate::matrix::{Module, ModuleMatrix};
use crate::version::{decode_format_info, decode_version_info, ECLevel, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirror {
    Direct,
    Mirrored,
}

#[derive(Debug, Clone)]
pub struct ParsedSymbol {
    pub version: Version,
    pub level: ECLevel,
    pub mask: u8,
    pub mirror: Mirror,
    pub codewords: Vec<u8>,
}

fn read_bit_word(matrix: &ModuleMatrix, coords: &[(usize, usize)]) -> u32 {
    let mut word = 0u32;
    for &(row, col) in coords {
        word <<= 1;
        if matrix.get(row, col).is_dark() {
            word |= 1;
        }
    }
    word
}

fn format_info_coords_main(size: usize) -> Vec<(usize, usize)> {
    let mut coords = Vec::with_capacity(15);
    for i in (0..=5).rev() {
        coords.push((8, i));
    }
    coords.push((8, 7));
    coords.push((8, 8));
    coords.push((7, 8));
    for i in (0..=5).rev() {
        coords.push((5 - i, 8));
    }
    let _ = size;
    coords
}

fn format_info_coords_side(size: usize) -> Vec<(usize, usize)> {
    let mut coords = Vec::with_capacity(15);
    for i in (0..8).rev() {
        coords.push((size - 1 - i, 8));
    }
    for i in 0..7 {
        coords.push((8, size - 7 + i));
    }
    coords
}

fn version_info_coords_bl(size: usize) -> Vec<(usize, usize)> {
    let mut coords = Vec::with_capacity(18);
    for i in 0..18usize {
        coords.push((size - 11 + i % 3, i / 3));
    }
    coords
}

fn version_info_coords_tr(size: usize) -> Vec<(usize, usize)> {
    let mut coords = Vec::with_capacity(18);
    for i in 0..18usize {
        coords.push((i / 3, size - 11 + i % 3));
    }
    coords
}

/// Reads both format-info replicas and returns the first that decodes
/// within Hamming distance 3, per spec.
fn read_format_info(matrix: &ModuleMatrix) -> QrResult<(ECLevel, u8)> {
    let size = matrix.size();
    let main = read_bit_word(matrix, &format_info_coords_main(size));
    if let Ok(result) = decode_format_info(main) {
        return Ok(result);
    }
    let side = read_bit_word(matrix, &format_info_coords_side(size));
    decode_format_info(side)
}

fn read_version_info(matrix: &ModuleMatrix, size_version: Version) -> QrResult<Version> {
    if size_version.value() < 7 {
        return Ok(size_version);
    }
    let size = matrix.size();
    let bl = read_bit_word(matrix, &version_info_coords_bl(size));
    if let Ok(v) = decode_version_info(bl) {
        return Ok(v);
    }
    let tr = read_bit_word(matrix, &version_info_coords_tr(size));
    decode_version_info(tr)
}

/// Walks the same zigzag order `layout::place_data` uses, collecting one
/// bit per non-reserved cell.
fn extract_data_bits(matrix: &ModuleMatrix) -> Vec<bool> {
    let size = matrix.size();
    let mut bits = Vec::new();

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
                    bits.push(matrix.get(row, col).is_dark());
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
    bits
}

fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk.iter().enumerate().fold(0u8, |byte, (i, &bit)| {
                if bit { byte | (0x80 >> i) } else { byte }
            })
        })
        .collect()
}

pub(crate) fn try_parse(matrix: &ModuleMatrix, mirror: Mirror) -> QrResult<ParsedSymbol> {
    let size_version = Version::from_size(matrix.size())?;
    let version = read_version_info(matrix, size_version)?;
    let (level, mask) = read_format_info(matrix)?;

    let mut template = ModuleMatrix::new(matrix.size());
    draw_function_patterns(&mut template, version);

    let mut working = matrix.clone();
    for row in 0..matrix.size() {
        for col in 0..matrix.size() {
            if template.is_reserved(row, col) {
                working.set_reserved(row, col, working.get(row, col));
            }
        }
    }
    apply_mask(&mut working, mask);

    let bits = extract_data_bits(&working);
    let codewords = bits_to_bytes(&bits);

    Ok(ParsedSymbol { version, level, mask, mirror, codewords })
}

pub(crate) fn mirrored(matrix: &ModuleMatrix) -> ModuleMatrix {
    let size = matrix.size();
    let mut out = ModuleMatrix::new(size);
    for row in 0..size {
        for col in 0..size {
            let value = matrix.get(row, col);
            if matrix.is_reserved(row, col) {
                out.set_reserved(col, row, value);
            } else {
                out.set(col, row, value);
            }
        }
    }
    out
}

/// Tries the matrix as read, then its transpose (mirror image), matching
/// the state machine `TryDirect -> TryMirror -> Fail`.
pub fn parse(matrix: &ModuleMatrix) -> QrResult<ParsedSymbol> {
    match try_parse(matrix, Mirror::Direct) {
        Ok(parsed) => Ok(parsed),
        Err(_) => {
            let flipped = mirrored(matrix);
            try_parse(&flipped, Mirror::Mirrored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{draw_format_info, encode_format_info, place_data, select_mask};

    #[test]
    fn parses_an_encoder_produced_symbol() {
        let version = Version::new(1).unwrap();
        let level = ECLevel::M;
        let mut template = ModuleMatrix::new(version.size());
        draw_function_patterns(&mut template, version);
        let codewords = vec![0x11u8; version.total_codewords(level)];
        let (mask, mut matrix) = select_mask(&template, &codewords);
        let word = encode_format_info(level, mask);
        draw_format_info(&mut matrix, word);

        let parsed = parse(&matrix).unwrap();
        assert_eq!(parsed.version, version);
        assert_eq!(parsed.level, level);
        assert_eq!(parsed.mask, mask);
        assert_eq!(parsed.mirror, Mirror::Direct);
    }

    #[test]
    fn version_below_7_is_read_directly_from_size() {
        let version = Version::new(3).unwrap();
        assert_eq!(read_version_info(&ModuleMatrix::new(version.size()), version).unwrap(), version);
    }
}
