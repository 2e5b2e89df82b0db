//! Minimal raster collaborator: renders a `ModuleMatrix` into an in-memory
//! RGB image. Saving to a container format is left to the caller, as in
//! the teacher's `matrix_to_png`.

use crate::matrix::{Module, ModuleMatrix};
use image::{Rgb, RgbImage};

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub foreground: Rgb<u8>,
    pub background: Rgb<u8>,
}

impl Default for Palette {
    fn default() -> Self {
        Palette { foreground: Rgb([0, 0, 0]), background: Rgb([255, 255, 255]) }
    }
}

/// Renders each module as a `module_size`-pixel square, with a uniform
/// quiet-zone margin (in modules) around the symbol.
pub fn render(matrix: &ModuleMatrix, palette: &Palette, module_size: u32, margin: u32) -> RgbImage {
    let size = matrix.size() as u32;
    let side = (size + margin * 2) * module_size;
    let mut image = RgbImage::from_pixel(side, side, palette.background);

    for row in 0..matrix.size() {
        for col in 0..matrix.size() {
            if matrix.get(row, col) == Module::Dark {
                let px0 = (margin + col as u32) * module_size;
                let py0 = (margin + row as u32) * module_size;
                for dy in 0..module_size {
                    for dx in 0..module_size {
                        image.put_pixel(px0 + dx, py0 + dy, palette.foreground);
                    }
                }
            }
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_produces_correctly_sized_image() {
        let matrix = ModuleMatrix::new(21);
        let image = render(&matrix, &Palette::default(), 4, 2);
        assert_eq!(image.width(), (21 + 4) * 4);
        assert_eq!(image.height(), (21 + 4) * 4);
    }

    #[test]
    fn render_paints_dark_modules_with_foreground() {
        let mut matrix = ModuleMatrix::new(1);
        matrix.set(0, 0, Module::Dark);
        let image = render(&matrix, &Palette::default(), 2, 0);
        assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
    }
}
