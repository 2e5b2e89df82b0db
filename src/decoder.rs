//! Top-level decode facade: a detection (or raw matrix) -> content.

use crate::bitstream::BitSource;
use crate::error::{QrError, QrResult};
use crate::matrix::ModuleMatrix;
use crate::matrix_parser::{mirrored, try_parse, Mirror, ParsedSymbol};
use crate::rs::decode as rs_decode;
use crate::segment::{apply_fnc1_substitution, read_segment, Segment};
use crate::version::{ECLevel, Version};

#[derive(Debug, Default, Clone, Copy)]
pub struct DecodeOptions;

/// Which FNC1 variant, if any, was seen while decoding: `Gs1` for FNC1 in
/// the first position, `Aim(indicator)` for FNC1 in the second position
/// carrying an AIM application indicator byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fnc1Indicator {
    Gs1,
    Aim(u8),
}

pub struct DecodedSymbol {
    pub content: Vec<Segment>,
    pub codewords: Vec<u8>,
    pub symbology: String,
    pub fnc1: Option<Fnc1Indicator>,
    pub version: Version,
    pub level: ECLevel,
    pub mask: u8,
    pub mirror: Mirror,
    pub corrected_errors: usize,
}

/// Builds the AIM symbology identifier `]Q{modifier}`. The modifier
/// encodes the FNC1 x ECI combination: 0 none, 1 FNC1-first (GS1), 2
/// FNC1-first + ECI, 3 ECI only, 4/5 FNC1-second (AIM) without/with ECI,
/// each followed by its two-digit application indicator.
fn symbology_identifier(fnc1: Option<Fnc1Indicator>, eci_present: bool) -> String {
    match (fnc1, eci_present) {
        (None, false) => "]Q0".to_string(),
        (None, true) => "]Q3".to_string(),
        (Some(Fnc1Indicator::Gs1), false) => "]Q1".to_string(),
        (Some(Fnc1Indicator::Gs1), true) => "]Q2".to_string(),
        (Some(Fnc1Indicator::Aim(indicator)), false) => format!("]Q4{:02}", indicator),
        (Some(Fnc1Indicator::Aim(indicator)), true) => format!("]Q5{:02}", indicator),
    }
}

/// Runs the direct-orientation parse and RS correction; on any failure
/// from version read through RS correction, retries the whole pipeline
/// once against the mirrored matrix, matching the
/// `TryDirect -> TryMirror -> Fail` state machine.
fn parse_and_correct(matrix: &ModuleMatrix) -> QrResult<(ParsedSymbol, Vec<u8>, usize)> {
    if let Ok(parsed) = try_parse(matrix, Mirror::Direct) {
        if let Ok((corrected, corrected_errors)) = correct_codewords(&parsed.codewords, parsed.version, parsed.level) {
            return Ok((parsed, corrected, corrected_errors));
        }
    }
    let flipped = mirrored(matrix);
    let parsed = try_parse(&flipped, Mirror::Mirrored)?;
    let (corrected, corrected_errors) = correct_codewords(&parsed.codewords, parsed.version, parsed.level)?;
    Ok((parsed, corrected, corrected_errors))
}

/// Decodes an already-binarized symbol matrix end to end: format/version
/// info, codeword de-interleave + Reed-Solomon correction, and segment
/// parsing.
pub fn decode(matrix: &ModuleMatrix, _options: &DecodeOptions) -> QrResult<DecodedSymbol> {
    let (parsed, corrected, corrected_errors) = parse_and_correct(matrix)?;

    let mut source = BitSource::new(&corrected);
    let mut content = Vec::new();
    let mut fnc1: Option<Fnc1Indicator> = None;
    let mut eci_present = false;

    while let Some(segment) = read_segment(&mut source, parsed.version)? {
        match &segment {
            Segment::Fnc1First => fnc1 = Some(Fnc1Indicator::Gs1),
            Segment::Fnc1Second(modifier) => fnc1 = Some(Fnc1Indicator::Aim(*modifier)),
            Segment::Byte(_, Some(_)) => eci_present = true,
            _ => {}
        }
        let segment = match (&segment, fnc1) {
            (Segment::Byte(bytes, designator), Some(_)) => Segment::Byte(apply_fnc1_substitution(bytes), *designator),
            _ => segment,
        };
        content.push(segment);
    }

    Ok(DecodedSymbol {
        content,
        codewords: corrected,
        symbology: symbology_identifier(fnc1, eci_present),
        fnc1,
        version: parsed.version,
        level: parsed.level,
        mask: parsed.mask,
        mirror: parsed.mirror,
        corrected_errors,
    })
}

/// De-interleaves the codeword stream back into per-block data+ecc, runs
/// Reed-Solomon correction on each block, and re-concatenates the
/// corrected data codewords in original order.
fn correct_codewords(codewords: &[u8], version: Version, level: ECLevel) -> QrResult<(Vec<u8>, usize)> {
    let groups = version.block_groups(level);
    let ecc_len = version.ecc_codewords_per_block(level);
    let block_count: usize = groups.iter().map(|g| g.count).sum();

    let max_data_len = groups.iter().map(|g| g.data_codewords).max().unwrap_or(0);
    let mut data_blocks: Vec<Vec<u8>> = groups
        .iter()
        .flat_map(|g| std::iter::repeat(vec![0u8; g.data_codewords]).take(g.count))
        .collect();
    let mut ecc_blocks: Vec<Vec<u8>> = vec![vec![0u8; ecc_len]; block_count];

    let mut cursor = 0usize;
    for i in 0..max_data_len {
        for block in data_blocks.iter_mut() {
            if i < block.len() {
                block[i] = codewords[cursor];
                cursor += 1;
            }
        }
    }
    for i in 0..ecc_len {
        for block in ecc_blocks.iter_mut() {
            block[i] = codewords[cursor];
            cursor += 1;
        }
    }

    let mut corrected_data = Vec::new();
    let mut total_corrections = 0usize;
    for (data, ecc) in data_blocks.iter().zip(ecc_blocks.iter()) {
        let mut full = data.clone();
        full.extend_from_slice(ecc);
        let corrected = rs_decode(&full, ecc_len)?;
        total_corrections += data.iter().zip(corrected.iter()).filter(|(a, b)| a != b).count();
        corrected_data.extend_from_slice(&corrected[..data.len()]);
    }

    Ok((corrected_data, total_corrections))
}

pub fn require_uncorrectable() -> QrError {
    QrError::UncorrectableError
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{encode, EncodeOptions, VersionChoice};

    #[test]
    fn decodes_a_freshly_encoded_numeric_symbol() {
        let segments = vec![Segment::Numeric("12345".into())];
        let options = EncodeOptions { level: ECLevel::L, version: VersionChoice::Fixed(1), ..Default::default() };
        let symbol = encode(&segments, &options).unwrap();
        let decoded = decode(&symbol.matrix, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.content, vec![Segment::Numeric("12345".into())]);
        assert_eq!(decoded.version, symbol.version);
        assert_eq!(decoded.level, ECLevel::L);
    }

    #[test]
    fn symbology_identifier_defaults_to_no_fnc1_no_eci() {
        let segments = vec![Segment::Numeric("12345".into())];
        let options = EncodeOptions { level: ECLevel::L, version: VersionChoice::Fixed(1), ..Default::default() };
        let symbol = encode(&segments, &options).unwrap();
        let decoded = decode(&symbol.matrix, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.symbology, "]Q0");
        assert_eq!(decoded.fnc1, None);
    }

    #[test]
    fn decodes_through_a_corrected_single_byte_error() {
        let segments = vec![Segment::Alphanumeric("HELLO WORLD".into())];
        let options = EncodeOptions { level: ECLevel::H, version: VersionChoice::Fixed(2), ..Default::default() };
        let symbol = encode(&segments, &options).unwrap();

        let mut corrupted = symbol.matrix.clone();
        let size = corrupted.size();
        // Flip one data-region module to exercise RS correction.
        for row in 0..size {
            for col in 0..size {
                if !corrupted.is_reserved(row, col) {
                    let value = corrupted.get(row, col);
                    corrupted.set(row, col, value.flip());
                    break;
                }
            }
            break;
        }

        let decoded = decode(&corrupted, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.content, vec![Segment::Alphanumeric("HELLO WORLD".into())]);
    }
}
