//! Block-based binary dithering.
//!
//! The image is cut into square blocks of `pixel_size` pixels. Each block is
//! averaged, thresholded to black or white and written back uniformly. Error
//! diffusion kernels push the quantization error onto blocks not yet
//! visited; ordered dithering compares against a 4x4 Bayer threshold instead.
//!
//! Work is split into horizontal bands, one per worker. Each band owns a
//! private error buffer (band height plus look-ahead rows). Error pushed past
//! the last row of a band is dropped rather than handed to the next band, so
//! bands never wait on each other.

use image::{GrayImage, RgbaImage};

use crate::kernel::{Algorithm, KernelSpec, MAX_LOOKAHEAD, Strategy, bayer_threshold};
use crate::parallel;
use crate::tone::gray_level;

/// Threshold used by all diffusion kernels.
const MIDPOINT: f64 = 128.0;

/// Block side length for a scale factor. Anything below 1 means per-pixel.
pub fn pixel_size(scale: f64) -> usize {
    scale.round().max(1.0) as usize
}

/// Dither `img` to pure black and white using one band per pool thread.
pub fn dither(img: &RgbaImage, algorithm: Algorithm, scale: f64, invert: bool) -> GrayImage {
    dither_in_bands(img, algorithm, scale, invert, parallel::worker_count())
}

/// Dither with an explicit number of bands.
pub fn dither_in_bands(
    img: &RgbaImage,
    algorithm: Algorithm,
    scale: f64,
    invert: bool,
    bands: usize,
) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }
    let width = w as usize;
    let height = h as usize;
    let ps = pixel_size(scale);
    let rows = parallel::band_rows(height, bands, ps);
    tracing::debug!(
        width,
        height,
        algorithm = algorithm.name(),
        pixel_size = ps,
        band_rows = rows,
        invert,
        "dithering"
    );
    let band = BandCtx {
        src: img,
        width,
        height,
        ps,
        invert,
    };
    match algorithm.strategy() {
        Strategy::Ordered => {
            parallel::for_each_band(&mut *out, width, rows, |first_row, pixels| {
                band.ordered(first_row, pixels)
            });
        }
        Strategy::Diffusion(kernel) => {
            debug_assert!(kernel.lookahead() <= MAX_LOOKAHEAD);
            tracing::trace!(
                taps = kernel.taps.len(),
                weight_sum = kernel.weight_sum(),
                divisor = kernel.divisor,
                "diffusion kernel"
            );
            let err_rows = error_rows(rows, ps);
            parallel::for_each_band_with_scratch(
                &mut *out,
                width,
                rows,
                err_rows * width,
                |first_row, pixels, errors: &mut [f64]| {
                    band.diffuse(kernel, first_row, pixels, errors)
                },
            );
        }
    }
    out
}

/// Rows of error scratch per band: the band plus the deepest look-ahead any
/// kernel can reach, in pixels.
fn error_rows(band_rows: usize, ps: usize) -> usize {
    band_rows + MAX_LOOKAHEAD * ps
}

/// A block in band-local coordinates.
#[derive(Debug, Clone, Copy)]
struct Block {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl Block {
    fn len(&self) -> usize {
        self.w * self.h
    }
}

/// Read-only state shared by every band of one invocation.
struct BandCtx<'a> {
    src: &'a RgbaImage,
    width: usize,
    height: usize,
    ps: usize,
    invert: bool,
}

impl BandCtx<'_> {
    /// Visit blocks left to right, top to bottom within a band of `band_h` rows.
    fn blocks(&self, band_h: usize) -> impl Iterator<Item = Block> + '_ {
        let ps = self.ps;
        let width = self.width;
        (0..band_h).step_by(ps).flat_map(move |y| {
            (0..width).step_by(ps).map(move |x| Block {
                x,
                y,
                w: ps.min(width - x),
                h: ps.min(band_h - y),
            })
        })
    }

    fn gray_sum(&self, first_row: usize, b: Block) -> f64 {
        let mut sum = 0.0;
        for dy in 0..b.h {
            let y = (first_row + b.y + dy) as u32;
            for dx in 0..b.w {
                sum += gray_level(self.src.get_pixel((b.x + dx) as u32, y)) as f64;
            }
        }
        sum
    }

    #[inline]
    fn quantize(&self, value: f64, threshold: f64) -> u8 {
        if (value < threshold) != self.invert {
            0
        } else {
            255
        }
    }

    fn fill(&self, pixels: &mut [u8], b: Block, value: u8) {
        for dy in 0..b.h {
            let start = (b.y + dy) * self.width + b.x;
            pixels[start..start + b.w].fill(value);
        }
    }

    fn ordered(&self, first_row: usize, pixels: &mut [u8]) {
        let band_h = pixels.len() / self.width;
        for b in self.blocks(band_h) {
            let old = self.gray_sum(first_row, b) / b.len() as f64;
            let threshold = bayer_threshold((first_row + b.y) / self.ps, b.x / self.ps);
            let new = self.quantize(old, threshold);
            self.fill(pixels, b, new);
        }
    }

    fn diffuse(&self, kernel: &KernelSpec, first_row: usize, pixels: &mut [u8], errors: &mut [f64]) {
        let width = self.width;
        let ps = self.ps;
        let band_h = pixels.len() / width;
        let err_rows = errors.len() / width;
        // Rows past the image bottom never receive error.
        let live_rows = err_rows.min(self.height - first_row);
        let divisor = kernel.divisor as f64;

        for b in self.blocks(band_h) {
            let mut sum = self.gray_sum(first_row, b);
            for dy in 0..b.h {
                let start = (b.y + dy) * width + b.x;
                sum += errors[start..start + b.w].iter().sum::<f64>();
            }
            let old = sum / b.len() as f64;
            let new = self.quantize(old, MIDPOINT);
            self.fill(pixels, b, new);

            let quant_error = (old - new as f64) / divisor;
            if quant_error == 0.0 {
                continue;
            }
            for tap in kernel.taps {
                let ty = b.y + tap.drow * ps;
                let tx = b.x as isize + tap.dcol * ps as isize;
                if tx < 0 || tx as usize >= width || ty >= live_rows {
                    continue;
                }
                let tx = tx as usize;
                let share = quant_error * tap.weight as f64;
                let row_end = (ty + ps).min(live_rows);
                let col_end = (tx + ps).min(width);
                for row in errors[ty * width..row_end * width].chunks_exact_mut(width) {
                    for e in &mut row[tx..col_end] {
                        *e += share;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::BAYER_4;
    use image::{DynamicImage, Rgba};

    fn gray_image(w: u32, h: u32, f: impl Fn(u32, u32) -> u8) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let v = f(x, y);
            Rgba([v, v, v, 255])
        })
    }

    fn gradient(w: u32, h: u32) -> RgbaImage {
        gray_image(w, h, |x, y| ((x * 255 / w.max(1) + y * 37) % 256) as u8)
    }

    fn to_rgba(img: &GrayImage) -> RgbaImage {
        DynamicImage::ImageLuma8(img.clone()).to_rgba8()
    }

    fn rows_of(img: &GrayImage, first: u32, count: u32) -> Vec<u8> {
        let w = img.width() as usize;
        img.as_raw()[first as usize * w..(first + count) as usize * w].to_vec()
    }

    #[test]
    fn error_scratch_covers_two_block_rows_of_lookahead() {
        assert_eq!(error_rows(10, 1), 12);
        assert_eq!(error_rows(12, 3), 18);
        for algo in Algorithm::ALL {
            if let Strategy::Diffusion(k) = algo.strategy() {
                assert!(k.lookahead() * 4 <= error_rows(8, 4) - 8);
            }
        }
    }

    #[test]
    fn pixel_size_floors_at_one() {
        assert_eq!(pixel_size(0.0), 1);
        assert_eq!(pixel_size(0.4), 1);
        assert_eq!(pixel_size(1.0), 1);
        assert_eq!(pixel_size(2.5), 3);
        assert_eq!(pixel_size(20.0), 20);
    }

    #[test]
    fn output_is_binary_for_every_algorithm() {
        let img = gradient(37, 29);
        for algo in Algorithm::ALL {
            for scale in [0.0, 1.0, 2.6, 7.0] {
                for invert in [false, true] {
                    let out = dither(&img, algo, scale, invert);
                    assert_eq!(out.dimensions(), (37, 29));
                    assert!(
                        out.as_raw().iter().all(|v| *v == 0 || *v == 255),
                        "{algo:?} scale={scale} invert={invert}"
                    );
                }
            }
        }
    }

    #[test]
    fn binary_checkerboard_passes_through_floyd_steinberg() {
        let img = gray_image(2, 2, |x, y| if (x + y) % 2 == 0 { 0 } else { 255 });
        let out = dither(&img, Algorithm::FloydSteinberg, 1.0, false);
        assert_eq!(out.as_raw(), &vec![0, 255, 255, 0]);
    }

    #[test]
    fn mid_gray_reproduces_bayer_pattern() {
        let img = gray_image(4, 4, |_, _| 128);
        let out = dither(&img, Algorithm::Ordered, 1.0, false);
        for y in 0..4 {
            for x in 0..4 {
                let threshold = BAYER_4[y][x] as f64 / 16.0 * 255.0;
                let expected = if 128.0 < threshold { 0 } else { 255 };
                assert_eq!(out.get_pixel(x as u32, y as u32)[0], expected, "({x},{y})");
            }
        }
    }

    #[test]
    fn ordered_inversion_is_exact_complement() {
        let img = gradient(23, 19);
        for scale in [1.0, 3.0] {
            let plain = dither(&img, Algorithm::Ordered, scale, false);
            let inverted = dither(&img, Algorithm::Ordered, scale, true);
            for (a, b) in plain.as_raw().iter().zip(inverted.as_raw()) {
                assert_eq!(*a as u16 + *b as u16, 255);
            }
        }
    }

    #[test]
    fn ordered_is_idempotent_on_its_own_output() {
        let img = gradient(21, 18);
        for scale in [1.0, 2.0, 5.0] {
            let once = dither(&img, Algorithm::Ordered, scale, false);
            let twice = dither(&to_rgba(&once), Algorithm::Ordered, scale, false);
            assert_eq!(once, twice, "scale={scale}");
        }
    }

    #[test]
    fn ordered_result_does_not_depend_on_band_count() {
        let img = gradient(19, 31);
        let one = dither_in_bands(&img, Algorithm::Ordered, 2.0, false, 1);
        for bands in [2, 3, 7, 64] {
            assert_eq!(dither_in_bands(&img, Algorithm::Ordered, 2.0, false, bands), one);
        }
    }

    #[test]
    fn blocks_are_written_uniformly() {
        let img = gradient(18, 13);
        for algo in Algorithm::ALL {
            let out = dither_in_bands(&img, algo, 4.0, false, 2);
            for by in (0..13).step_by(4) {
                for bx in (0..18).step_by(4) {
                    let v = out.get_pixel(bx, by)[0];
                    for y in by..(by + 4).min(13) {
                        for x in bx..(bx + 4).min(18) {
                            assert_eq!(out.get_pixel(x, y)[0], v, "{algo:?} ({x},{y})");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn bands_match_isolated_single_band_runs() {
        let (w, h) = (17u32, 23u32);
        let img = gradient(w, h);
        for algo in [
            Algorithm::FloydSteinberg,
            Algorithm::Atkinson,
            Algorithm::Stucki,
            Algorithm::Sierra,
        ] {
            for scale in [1.0, 2.0] {
                let bands = 3;
                let ps = pixel_size(scale);
                let rows = parallel::band_rows(h as usize, bands, ps) as u32;
                let banded = dither_in_bands(&img, algo, scale, false, bands);
                let reference = dither_in_bands(&img, algo, scale, false, 1);
                // the first band has no upstream neighbour to lose error from
                assert_eq!(rows_of(&banded, 0, rows), rows_of(&reference, 0, rows));

                let mut first = 0;
                while first < h {
                    let count = rows.min(h - first);
                    let slice = image::imageops::crop_imm(&img, 0, first, w, count).to_image();
                    let alone = dither_in_bands(&slice, algo, scale, false, 1);
                    assert_eq!(
                        rows_of(&banded, first, count),
                        alone.into_raw(),
                        "{algo:?} scale={scale} band at row {first}"
                    );
                    first += rows;
                }
            }
        }
    }

    #[test]
    fn floyd_steinberg_preserves_average_tone() {
        let img = gray_image(32, 32, |_, _| 64);
        let out = dither_in_bands(&img, Algorithm::FloydSteinberg, 1.0, false, 1);
        let white = out.as_raw().iter().filter(|v| **v == 255).count() as f64;
        let ratio = white / (32.0 * 32.0);
        assert!((ratio - 0.25).abs() < 0.05, "ratio {ratio}");
    }

    #[test]
    fn unknown_selector_uses_floyd_steinberg() {
        let img = gradient(15, 12);
        let fallback = dither_in_bands(&img, Algorithm::from_name("bogus"), 1.0, false, 2);
        let fs = dither_in_bands(&img, Algorithm::FloydSteinberg, 1.0, false, 2);
        assert_eq!(fallback, fs);
    }

    #[test]
    fn invert_flips_diffusion_thresholds() {
        let img = gray_image(4, 4, |_, _| 255);
        let out = dither(&img, Algorithm::Sierra, 1.0, true);
        assert!(out.as_raw().iter().all(|v| *v == 0));
        let dark = gray_image(4, 4, |_, _| 0);
        let out = dither(&dark, Algorithm::Atkinson, 1.0, true);
        assert!(out.as_raw().iter().all(|v| *v == 255));
    }

    #[test]
    fn empty_image_produces_empty_output() {
        let img = RgbaImage::new(0, 0);
        let out = dither(&img, Algorithm::Stucki, 3.0, false);
        assert_eq!(out.dimensions(), (0, 0));
        let wide = RgbaImage::new(5, 0);
        assert_eq!(dither(&wide, Algorithm::Ordered, 1.0, false).dimensions(), (5, 0));
    }
}
