//! Top-level encode facade: content + options -> finished symbol matrix.

use crate::error::{QrError, QrResult};
use crate::layout::{draw_format_info, draw_function_patterns, draw_version_info, encode_format_info, select_mask};
use crate::matrix::ModuleMatrix;
use crate::rs::encode as rs_encode;
use crate::segment::{append_segment, pad_to_capacity, Segment};
use crate::version::{ECLevel, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChoice {
    Auto,
    Fixed(usize),
}

/// Which FNC1 variant, if any, to prepend to the segment list: `Gs1` for
/// FNC1 in the first position (GS1 application data), `Aim(indicator)`
/// for FNC1 in the second position, carrying an AIM application indicator
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fnc1Hint {
    Gs1,
    Aim(u8),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeHints {
    pub fnc1: Option<Fnc1Hint>,
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub level: ECLevel,
    pub version: VersionChoice,
    pub hints: EncodeHints,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions { level: ECLevel::M, version: VersionChoice::Auto, hints: EncodeHints::default() }
    }
}

pub struct EncodedSymbol {
    pub matrix: ModuleMatrix,
    pub version: Version,
    pub level: ECLevel,
    pub mask: u8,
}

/// Builds the segment bitstream, picking the smallest version that fits
/// (or validating the caller's fixed choice), interleaves ECC blocks, lays
/// out the matrix, and selects the lowest-penalty mask.
pub fn encode(segments: &[Segment], options: &EncodeOptions) -> QrResult<EncodedSymbol> {
    if segments.is_empty() {
        return Err(QrError::IllegalContent);
    }

    let version = match options.version {
        VersionChoice::Fixed(v) => Version::new(v)?,
        VersionChoice::Auto => find_smallest_version(segments, options)?,
    };

    let mut bits = crate::bitstream::BitArray::new();
    match options.hints.fnc1 {
        Some(Fnc1Hint::Gs1) => append_segment(&mut bits, &Segment::Fnc1First, version)?,
        Some(Fnc1Hint::Aim(indicator)) => append_segment(&mut bits, &Segment::Fnc1Second(indicator), version)?,
        None => {}
    }
    for segment in segments {
        append_segment(&mut bits, segment, version)?;
    }

    let capacity_bits = version.total_data_bits(options.level);
    if bits.len() > capacity_bits {
        return Err(QrError::DataTooLarge);
    }
    pad_to_capacity(&mut bits, capacity_bits);

    let data_bytes = bits.to_bytes();
    let codewords = interleave(&data_bytes, version, options.level);

    let mut template = ModuleMatrix::new(version.size());
    draw_function_patterns(&mut template, version);
    if version.value() >= 7 {
        draw_version_info(&mut template, version.version_info());
    }

    let (mask, mut matrix) = select_mask(&template, &codewords);
    let format_word = encode_format_info(options.level, mask);
    draw_format_info(&mut matrix, format_word);
    if version.value() >= 7 {
        draw_version_info(&mut matrix, version.version_info());
    }

    Ok(EncodedSymbol { matrix, version, level: options.level, mask })
}

fn find_smallest_version(segments: &[Segment], options: &EncodeOptions) -> QrResult<Version> {
    for v in 1..=40 {
        let version = Version::new(v)?;
        let mut bits = crate::bitstream::BitArray::new();
        match options.hints.fnc1 {
            Some(Fnc1Hint::Gs1) => append_segment(&mut bits, &Segment::Fnc1First, version)?,
            Some(Fnc1Hint::Aim(indicator)) => append_segment(&mut bits, &Segment::Fnc1Second(indicator), version)?,
            None => {}
        }
        let mut ok = true;
        for segment in segments {
            if append_segment(&mut bits, segment, version).is_err() {
                ok = false;
                break;
            }
        }
        if ok && bits.len() <= version.total_data_bits(options.level) {
            return Ok(version);
        }
    }
    Err(QrError::DataTooLarge)
}

/// Splits data codewords into per-group blocks, generates Reed-Solomon
/// ECC for each, and interleaves data then ECC byte-by-byte, per
/// ISO/IEC 18004 clause 8.7.
fn interleave(data_bytes: &[u8], version: Version, level: ECLevel) -> Vec<u8> {
    let groups = version.block_groups(level);
    let ecc_len = version.ecc_codewords_per_block(level);

    let mut blocks: Vec<&[u8]> = Vec::new();
    let mut offset = 0;
    for group in &groups {
        for _ in 0..group.count {
            blocks.push(&data_bytes[offset..offset + group.data_codewords]);
            offset += group.data_codewords;
        }
    }

    let ecc_blocks: Vec<Vec<u8>> = blocks.iter().map(|block| rs_encode(block, ecc_len)).collect();

    let mut out = Vec::new();
    let max_data_len = blocks.iter().map(|b| b.len()).max().unwrap_or(0);
    for i in 0..max_data_len {
        for block in &blocks {
            if i < block.len() {
                out.push(block[i]);
            }
        }
    }
    for i in 0..ecc_len {
        for block in &ecc_blocks {
            out.push(block[i]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_a_short_numeric_message() {
        let segments = vec![Segment::Numeric("12345".into())];
        let options = EncodeOptions { level: ECLevel::L, ..Default::default() };
        let symbol = encode(&segments, &options).unwrap();
        assert_eq!(symbol.version, Version::new(1).unwrap());
    }

    #[test]
    fn rejects_empty_segment_list() {
        let options = EncodeOptions::default();
        assert!(matches!(encode(&[], &options), Err(QrError::IllegalContent)));
    }

    #[test]
    fn fixed_version_too_small_is_data_too_large() {
        let segments = vec![Segment::Byte(vec![0u8; 500], None)];
        let options = EncodeOptions { version: VersionChoice::Fixed(1), ..Default::default() };
        assert!(matches!(encode(&segments, &options), Err(QrError::DataTooLarge)));
    }

    #[test]
    fn gs1_hint_prepends_fnc1_first_segment() {
        let segments = vec![Segment::Numeric("123".into())];
        let options = EncodeOptions {
            level: ECLevel::L,
            hints: EncodeHints { fnc1: Some(Fnc1Hint::Gs1) },
            ..Default::default()
        };
        let symbol = encode(&segments, &options).unwrap();
        assert_eq!(symbol.version, Version::new(1).unwrap());
    }

    #[test]
    fn aim_hint_prepends_fnc1_second_segment() {
        let segments = vec![Segment::Numeric("123".into())];
        let options = EncodeOptions {
            level: ECLevel::L,
            hints: EncodeHints { fnc1: Some(Fnc1Hint::Aim(7)) },
            ..Default::default()
        };
        let symbol = encode(&segments, &options).unwrap();
        assert_eq!(symbol.version, Version::new(1).unwrap());
    }

    #[test]
    fn interleave_orders_data_before_ecc() {
        let version = Version::new(5).unwrap();
        let data = vec![0xAAu8; version.total_data_bits(ECLevel::Q) / 8];
        let codewords = interleave(&data, version, ECLevel::Q);
        assert_eq!(codewords.len(), version.total_codewords(ECLevel::Q));
    }
}
