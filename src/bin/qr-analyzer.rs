use qr_tools::decoder::{decode, DecodeOptions};
use qr_tools::detector::Detector;
use qr_tools::matrix_parser::Mirror;
use qr_tools::segment::Segment;
use serde::Serialize;
use std::env;

#[derive(Debug, Serialize)]
struct Analysis {
    file: String,
    width: u32,
    height: u32,
    detected: bool,
    attempts: usize,
    version: Option<u8>,
    level: Option<String>,
    mask: Option<u8>,
    mirrored: Option<bool>,
    corrected_errors: Option<usize>,
    fnc1: Option<String>,
    symbology: Option<String>,
    segments: Vec<String>,
    text: Option<String>,
    error: Option<String>,
}

fn segment_text(segment: &Segment) -> String {
    match segment {
        Segment::Numeric(s) => s.clone(),
        Segment::Alphanumeric(s) => s.clone(),
        Segment::Byte(bytes, _) => {
            String::from_utf8(bytes.clone()).unwrap_or_else(|_| format!("{:?}", bytes))
        }
        Segment::Kanji(bytes) => format!("kanji:{:?}", bytes),
        Segment::Hanzi(bytes) => format!("hanzi:{:?}", bytes),
        Segment::Fnc1First => "FNC1(first)".to_string(),
        Segment::Fnc1Second(modifier) => format!("FNC1(second, modifier={})", modifier),
        Segment::StructuredAppend { index, count, parity } => {
            format!("StructuredAppend(index={}, count={}, parity={:#04x})", index, count, parity)
        }
    }
}

fn analyze(filename: &str) -> Result<Analysis, Box<dyn std::error::Error>> {
    let img = image::open(filename)?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut detector = Detector::new(&rgb)?;
    let mut attempts = 0usize;
    let mut last_error: Option<String> = None;

    loop {
        match detector.advance(false) {
            None => {
                return Ok(Analysis {
                    file: filename.to_string(),
                    width,
                    height,
                    detected: false,
                    attempts,
                    version: None,
                    level: None,
                    mask: None,
                    mirrored: None,
                    corrected_errors: None,
                    fnc1: None,
                    symbology: None,
                    segments: Vec::new(),
                    text: None,
                    error: last_error,
                });
            }
            Some(detection) => {
                attempts += 1;
                match decode(&detection.matrix, &DecodeOptions::default()) {
                    Ok(decoded) => {
                        let segments: Vec<String> = decoded.content.iter().map(segment_text).collect();
                        let text = if segments.is_empty() { None } else { Some(segments.join("")) };
                        return Ok(Analysis {
                            file: filename.to_string(),
                            width,
                            height,
                            detected: true,
                            attempts,
                            version: Some(decoded.version.value() as u8),
                            level: Some(format!("{:?}", decoded.level)),
                            mask: Some(decoded.mask),
                            mirrored: Some(decoded.mirror == Mirror::Mirrored),
                            corrected_errors: Some(decoded.corrected_errors),
                            fnc1: decoded.fnc1.map(|f| match f {
                                qr_tools::decoder::Fnc1Indicator::Gs1 => "GS1".to_string(),
                                qr_tools::decoder::Fnc1Indicator::Aim(indicator) => format!("AIM({})", indicator),
                            }),
                            symbology: Some(decoded.symbology),
                            segments,
                            text,
                            error: None,
                        });
                    }
                    Err(e) => last_error = Some(e.to_string()),
                }
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <qr-code.png>", args[0]);
        std::process::exit(1);
    }

    let analysis = analyze(&args[1])?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
