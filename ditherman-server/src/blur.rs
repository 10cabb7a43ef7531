//! Separable Gaussian blur over the gray channel.
//!
//! Two 1-D passes (horizontal then vertical). Samples that fall outside the
//! image are skipped and the remaining weights renormalised, so edges are not
//! darkened the way zero padding would.

use image::{Rgba, RgbaImage};

use crate::parallel;
use crate::tone::gray_level;

/// Precomputed, normalised 1-D Gaussian weights.
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    weights: Vec<f64>,
    offset: usize,
}

impl GaussianKernel {
    /// Kernel for `radius > 0`: `ceil(3r)` taps (forced odd), sigma `r / 2`.
    pub fn new(radius: f64) -> Self {
        let mut size = (radius * 3.0).ceil().max(1.0) as usize;
        if size % 2 == 0 {
            size += 1;
        }
        let offset = size / 2;
        let sigma = radius / 2.0;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let mut weights: Vec<f64> = (0..size)
            .map(|i| {
                let x = i as f64 - offset as f64;
                (-(x * x) / two_sigma_sq).exp()
            })
            .collect();
        let sum: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }
        Self { weights, offset }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Convolve position `at` of a line of `len` samples read through
    /// `sample`, renormalising over the in-bounds taps. The result is
    /// clamped and truncated.
    #[inline]
    fn convolve(&self, at: usize, len: usize, sample: impl Fn(usize) -> u8) -> u8 {
        let mut sum = 0.0;
        let mut total = 0.0;
        for (k, w) in self.weights.iter().enumerate() {
            let Some(i) = (at + k).checked_sub(self.offset) else {
                continue;
            };
            if i >= len {
                continue;
            }
            sum += sample(i) as f64 * w;
            total += w;
        }
        if total > 0.0 {
            (sum / total).clamp(0.0, 255.0) as u8
        } else {
            0
        }
    }
}

/// Blur `img` with the given radius. A radius `<= 0` returns `img` untouched.
///
/// The result is gray with opaque alpha.
pub fn blur(img: RgbaImage, radius: f64) -> RgbaImage {
    if radius <= 0.0 {
        return img;
    }
    let kernel = GaussianKernel::new(radius);
    let (w, h) = img.dimensions();
    let (width, height) = (w as usize, h as usize);
    if width == 0 || height == 0 {
        return img;
    }
    let rows = parallel::band_rows(height, parallel::worker_count(), 1);
    tracing::trace!(width, height, radius, taps = kernel.len(), "gaussian blur");

    let mut horizontal = vec![0u8; width * height];
    parallel::for_each_band(&mut horizontal, width, rows, |first_row, band| {
        let mut line = vec![0u8; width];
        for (r, out) in band.chunks_mut(width).enumerate() {
            let y = (first_row + r) as u32;
            for (x, g) in line.iter_mut().enumerate() {
                *g = gray_level(img.get_pixel(x as u32, y));
            }
            for (x, px) in out.iter_mut().enumerate() {
                *px = kernel.convolve(x, width, |i| line[i]);
            }
        }
    });

    // `horizontal` is complete here; every column is now readable.
    let mut out = RgbaImage::new(w, h);
    parallel::for_each_band(&mut *out, width * 4, rows, |first_row, band| {
        for (r, row) in band.chunks_mut(width * 4).enumerate() {
            let y = first_row + r;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let v = kernel.convolve(y, height, |i| horizontal[i * width + x]);
                px.copy_from_slice(&Rgba([v, v, v, 255]).0);
            }
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_image(w: u32, h: u32, f: impl Fn(u32, u32) -> u8) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let v = f(x, y);
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn kernel_is_odd_symmetric_and_normalised() {
        for (radius, size) in [(0.1, 1), (1.0, 3), (2.0, 7), (2.5, 9), (10.0, 31)] {
            let k = GaussianKernel::new(radius);
            assert_eq!(k.len(), size, "radius {radius}");
            let sum: f64 = k.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            let wts = &k.weights;
            for i in 0..wts.len() / 2 {
                assert!((wts[i] - wts[wts.len() - 1 - i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn zero_radius_is_identity() {
        let img = RgbaImage::from_fn(5, 4, |x, y| Rgba([x as u8 * 40, y as u8 * 30, 7, 99]));
        assert_eq!(blur(img.clone(), 0.0), img);
        assert_eq!(blur(img.clone(), -1.0), img);
    }

    #[test]
    fn uniform_image_survives_edge_renormalisation() {
        let img = gray_image(13, 11, |_, _| 200);
        let out = blur(img, 4.0);
        // truncation may lose one level per pass
        assert!(out.pixels().all(|p| (198..=200).contains(&p[0]) && p[3] == 255));
    }

    #[test]
    fn edge_sample_is_truncated() {
        // 255 / (1 + e^-2) = 224.6
        let k = GaussianKernel::new(1.0);
        let line = [0u8, 0, 255];
        assert_eq!(k.convolve(2, 3, |i| line[i]), 224);
    }

    #[test]
    fn both_passes_truncate() {
        let img = gray_image(16, 16, |x, y| (x * 13 + y * 3) as u8);
        let radius = 1.5;
        let out = blur(img.clone(), radius);

        let k = GaussianKernel::new(radius);
        let line = |at: usize, len: usize, sample: &dyn Fn(usize) -> u8| {
            let (mut sum, mut total) = (0.0f64, 0.0f64);
            for (i, w) in k.weights.iter().enumerate() {
                let pos = at as isize + i as isize - k.offset as isize;
                if pos >= 0 && (pos as usize) < len {
                    sum += sample(pos as usize) as f64 * *w;
                    total += *w;
                }
            }
            (sum / total).clamp(0.0, 255.0) as u8
        };
        let mut horizontal = vec![0u8; 16 * 16];
        for y in 0..16 {
            for x in 0..16 {
                horizontal[y * 16 + x] =
                    line(x, 16, &|i| gray_level(img.get_pixel(i as u32, y as u32)));
            }
        }
        for y in 0..16 {
            for x in 0..16 {
                let want = line(y, 16, &|i| horizontal[i * 16 + x]);
                assert_eq!(out.get_pixel(x as u32, y as u32)[0], want, "({x}, {y})");
            }
        }
    }

    #[test]
    fn impulse_spreads_symmetrically() {
        let img = gray_image(9, 9, |x, y| if x == 4 && y == 4 { 255 } else { 0 });
        let out = blur(img, 1.5);
        let at = |x: u32, y: u32| out.get_pixel(x, y)[0];
        assert!(at(4, 4) > at(3, 4));
        assert!(at(3, 4) > 0);
        assert_eq!(at(3, 4), at(5, 4));
        assert_eq!(at(4, 3), at(4, 5));
        assert!(at(4, 3) > 0);
        assert_eq!(at(0, 0), 0);
    }

    #[test]
    fn bounds_and_alpha_after_blur() {
        let img = RgbaImage::from_fn(6, 3, |x, _| Rgba([x as u8 * 50, 0, 0, 10]));
        let out = blur(img, 2.0);
        assert_eq!(out.dimensions(), (6, 3));
        assert!(out.pixels().all(|p| p[3] == 255 && p[0] == p[1] && p[1] == p[2]));
    }
}
