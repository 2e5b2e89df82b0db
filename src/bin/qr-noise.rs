use image::Rgb;
use qr_tools::layout::{draw_function_patterns, draw_version_info};
use qr_tools::matrix::ModuleMatrix;
use qr_tools::version::Version;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::env;
use std::process;

const MARGIN: u32 = 2;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_help();
        return;
    }

    let mut input_file = String::new();
    let mut output_file = String::new();
    let mut percentage = 0.0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                if i + 1 < args.len() {
                    input_file = add_png_extension(&args[i + 1]);
                    i += 2;
                } else {
                    eprintln!("Error: --input requires a filename");
                    process::exit(1);
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    output_file = add_png_extension(&args[i + 1]);
                    i += 2;
                } else {
                    eprintln!("Error: --output requires a filename");
                    process::exit(1);
                }
            }
            "--percentage" | "-p" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<f64>() {
                        Ok(p) if (0.0..=100.0).contains(&p) => percentage = p,
                        _ => {
                            eprintln!("Error: --percentage must be a number between 0 and 100");
                            process::exit(1);
                        }
                    }
                    i += 2;
                } else {
                    eprintln!("Error: --percentage requires a number");
                    process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                process::exit(1);
            }
        }
    }

    if input_file.is_empty() || output_file.is_empty() || percentage == 0.0 {
        eprintln!("Error: --input, --output, and --percentage are required");
        process::exit(1);
    }

    if let Err(e) = add_noise(&input_file, &output_file, percentage) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    println!("Added {:.1}% noise to {} -> {}", percentage, input_file, output_file);
}

fn print_help() {
    println!("qr-noise - Add controlled noise to QR code data areas");
    println!();
    println!("Usage: qr-noise [options]");
    println!();
    println!("Options:");
    println!("  --input, -i <file>       Input PNG file");
    println!("  --output, -o <file>      Output PNG file");
    println!("  --percentage, -p <num>   Percentage of data pixels to flip (0-100)");
    println!("  --help, -h               Show this help message");
}

fn add_png_extension(filename: &str) -> String {
    if filename.ends_with(".png") {
        filename.to_string()
    } else {
        format!("{}.png", filename)
    }
}

/// Builds the same function-pattern template the encoder draws, so the
/// non-reserved cells it leaves behind are exactly the data/ECC region.
fn data_region_positions(qr_size: usize) -> Result<Vec<(usize, usize)>, Box<dyn std::error::Error>> {
    let version = Version::from_size(qr_size)?;
    let mut template = ModuleMatrix::new(version.size());
    draw_function_patterns(&mut template, version);
    if version.value() >= 7 {
        draw_version_info(&mut template, version.version_info());
    }

    let mut positions = Vec::new();
    for row in 0..qr_size {
        for col in 0..qr_size {
            if !template.is_reserved(row, col) {
                positions.push((row, col));
            }
        }
    }
    Ok(positions)
}

fn add_noise(input_file: &str, output_file: &str, percentage: f64) -> Result<(), Box<dyn std::error::Error>> {
    let img = image::open(input_file)?;
    let rgb_img = img.to_rgb8();
    let (img_width, img_height) = rgb_img.dimensions();

    let qr_size = (img_width - MARGIN * 2) as usize;
    let data_positions = data_region_positions(qr_size)?;

    let mut image_data_pixels = Vec::new();
    for (qr_row, qr_col) in data_positions {
        let img_x = qr_col as u32 + MARGIN;
        let img_y = qr_row as u32 + MARGIN;

        if img_x < img_width && img_y < img_height {
            image_data_pixels.push((img_x, img_y));
        }
    }

    let num_to_flip = ((image_data_pixels.len() as f64 * percentage / 100.0).round() as usize)
        .min(image_data_pixels.len());

    let mut rng = thread_rng();
    let selected_pixels: Vec<_> = image_data_pixels.choose_multiple(&mut rng, num_to_flip).cloned().collect();

    let mut output_img = rgb_img.clone();
    for (x, y) in selected_pixels {
        let pixel = output_img.get_pixel_mut(x, y);
        let is_black = pixel[0] < 128;

        if is_black {
            *pixel = Rgb([255, 255, 255]);
        } else {
            *pixel = Rgb([0, 0, 0]);
        }
    }

    output_img.save(output_file)?;
    Ok(())
}
