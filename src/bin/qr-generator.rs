use qr_tools::encoder::{encode, EncodeHints, EncodeOptions, VersionChoice};
use qr_tools::matrix::{Module, ModuleMatrix};
use qr_tools::raster::{render, Palette};
use qr_tools::segment::Segment;
use qr_tools::version::ECLevel;
use std::env;

const ALPHANUMERIC_CHARS: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";
const MODULE_SIZE: u32 = 1;
const MARGIN: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Png,
    Svg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForcedMode {
    Numeric,
    Alphanumeric,
    Byte,
}

struct Config {
    data: String,
    output_filename: String,
    output_format: OutputFormat,
    level: ECLevel,
    forced_mode: Option<ForcedMode>,
    fixed_version: Option<usize>,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: "https://www.example.com/".to_string(),
            output_filename: "qr-code.png".to_string(),
            output_format: OutputFormat::Png,
            level: ECLevel::M,
            forced_mode: None,
            fixed_version: None,
            verbose: false,
        }
    }
}

/// Picks the narrowest mode the content fits in, mirroring the teacher's
/// preference for numeric, then alphanumeric, then byte.
fn build_segment(data: &str, forced: Option<ForcedMode>) -> Segment {
    let mode = forced.unwrap_or_else(|| {
        if !data.is_empty() && data.chars().all(|c| c.is_ascii_digit()) {
            ForcedMode::Numeric
        } else if data.chars().all(|c| ALPHANUMERIC_CHARS.contains(c)) {
            ForcedMode::Alphanumeric
        } else {
            ForcedMode::Byte
        }
    });
    match mode {
        ForcedMode::Numeric => Segment::Numeric(data.to_string()),
        ForcedMode::Alphanumeric => Segment::Alphanumeric(data.to_string()),
        ForcedMode::Byte => Segment::Byte(data.as_bytes().to_vec(), None),
    }
}

fn matrix_to_svg(matrix: &ModuleMatrix, filename: &str) -> Result<(), Box<dyn std::error::Error>> {
    let size = matrix.size();
    let scale = 10;
    let svg_size = (size as u32 + MARGIN * 2) * scale;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\" xmlns=\"http://www.w3.org/2000/svg\">\n<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n",
        svg_size, svg_size, svg_size, svg_size
    ));

    for row in 0..size {
        for col in 0..size {
            if matrix.get(row, col) == Module::Dark {
                let px = (col as u32 + MARGIN) * scale;
                let py = (row as u32 + MARGIN) * scale;
                svg.push_str(&format!(
                    "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"black\"/>\n",
                    px, py, scale, scale
                ));
            }
        }
    }

    svg.push_str("</svg>");
    std::fs::write(filename, svg)?;
    Ok(())
}

fn print_help(program_name: &str) {
    println!("Usage: {} [options]", program_name);
    println!();
    println!("Options:");
    println!("  --output, -o <file>        Output file (default: qr-code.png)");
    println!("  --png, -P                  Output PNG format (default)");
    println!("  --svg, -S                  Output SVG format");
    println!("  --data, -d <data>          Data to encode (default: https://www.example.com/)");
    println!("  --ecc-level, -l [L|M|Q|H]  Error correction level (default: M)");
    println!("  --version, -v <1-40>       Force a symbol version (default: auto)");
    println!("  --numeric, -n              Force numeric mode encoding");
    println!("  --byte-mode, -b            Force byte mode encoding");
    println!("  --alphanumeric-mode, -a    Force alphanumeric mode encoding");
    println!("  --verbose, -V              Print detailed symbol information");
    println!("  --help, -h                 Show this help message");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        print_help(&args[0]);
        return Ok(());
    }

    let mut config = Config::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" => {
                config.output_filename = require_value(&args, &mut i, "--output")?;
            }
            "--png" | "-P" => config.output_format = OutputFormat::Png,
            "--svg" | "-S" => config.output_format = OutputFormat::Svg,
            "--data" | "-d" => {
                config.data = require_value(&args, &mut i, "--data")?;
            }
            "--ecc-level" | "-l" => {
                let value = require_value(&args, &mut i, "--ecc-level")?;
                config.level = match value.as_str() {
                    "L" => ECLevel::L,
                    "M" => ECLevel::M,
                    "Q" => ECLevel::Q,
                    "H" => ECLevel::H,
                    _ => {
                        eprintln!("Invalid ECC level. Use L, M, Q, or H.");
                        std::process::exit(1);
                    }
                };
            }
            "--version" | "-v" => {
                let value = require_value(&args, &mut i, "--version")?;
                config.fixed_version = Some(value.parse().unwrap_or_else(|_| {
                    eprintln!("Invalid version. Use 1-40.");
                    std::process::exit(1);
                }));
            }
            "--numeric" | "-n" => config.forced_mode = Some(ForcedMode::Numeric),
            "--byte-mode" | "-b" => config.forced_mode = Some(ForcedMode::Byte),
            "--alphanumeric-mode" | "-a" => config.forced_mode = Some(ForcedMode::Alphanumeric),
            "--verbose" | "-V" => config.verbose = true,
            "--help" | "-h" => {
                print_help(&args[0]);
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}. Use --help for usage information.", other);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    match config.output_format {
        OutputFormat::Png if !config.output_filename.ends_with(".png") && config.output_filename != "qr-code.png" => {
            config.output_filename = format!("{}.png", config.output_filename);
        }
        OutputFormat::Svg => {
            if config.output_filename == "qr-code.png" {
                config.output_filename = "qr-code.svg".to_string();
            } else if !config.output_filename.ends_with(".svg") {
                config.output_filename = format!("{}.svg", config.output_filename);
            }
        }
        _ => {}
    }

    let segment = build_segment(&config.data, config.forced_mode);
    let options = EncodeOptions {
        level: config.level,
        version: config.fixed_version.map(VersionChoice::Fixed).unwrap_or(VersionChoice::Auto),
        hints: EncodeHints::default(),
    };
    let symbol = encode(&[segment], &options)?;

    if config.verbose {
        println!("=== QR Code Metadata ===");
        println!("Version: {} ({}x{})", symbol.version.value(), symbol.version.size(), symbol.version.size());
        println!("Error Correction: {:?}", symbol.level);
        println!("Mask Pattern: {}", symbol.mask);
        println!("Data Length: {} characters", config.data.len());
        println!();
    }

    match config.output_format {
        OutputFormat::Png => {
            let image = render(&symbol.matrix, &Palette::default(), MODULE_SIZE, MARGIN);
            image.save(&config.output_filename)?;
        }
        OutputFormat::Svg => matrix_to_svg(&symbol.matrix, &config.output_filename)?,
    }

    println!(
        "QR code saved to {} (Version {}) with mask pattern {} using {:?} error correction",
        config.output_filename,
        symbol.version.value(),
        symbol.mask,
        symbol.level
    );
    Ok(())
}

fn require_value(args: &[String], i: &mut usize, flag: &str) -> Result<String, Box<dyn std::error::Error>> {
    if *i + 1 < args.len() {
        *i += 1;
        Ok(args[*i].clone())
    } else {
        eprintln!("{} requires a value.", flag);
        std::process::exit(1);
    }
}
