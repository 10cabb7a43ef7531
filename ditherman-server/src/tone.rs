//! Tone shaping: contrast S-curve, midtone gamma, highlight roll-off and a
//! soft luminance cutoff, applied to the perceptual luminance of each pixel.

use image::{DynamicImage, Rgba, RgbaImage};
use std::f64::consts::PI;

use crate::parallel;

/// Width of the soft cutoff below the luminance threshold.
const THRESHOLD_TRANSITION: f64 = 0.1;

/// Luminance in [0, 1] from 8-bit RGB.
#[inline(always)]
pub fn base_luminance(r: u8, g: u8, b: u8) -> f64 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0
}

/// Rounded 8-bit gray level of an RGBA pixel.
#[inline(always)]
pub fn gray_level(px: &Rgba<u8>) -> u8 {
    (base_luminance(px[0], px[1], px[2]) * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Clamp to [0, 1] and truncate to an 8-bit gray level.
#[inline(always)]
pub fn to_gray(lum: f64) -> u8 {
    (lum.clamp(0.0, 1.0) * 255.0) as u8
}

/// Normalised tone parameters. Inputs are the raw slider values in [0, 100].
#[derive(Debug, Clone, Copy)]
pub struct ToneCurve {
    contrast: f64,
    contrast_factor: f64,
    midtones: f64,
    highlights: f64,
    luminance: f64,
}

impl ToneCurve {
    pub fn new(contrast: f64, midtones: f64, highlights: f64, luminance: f64) -> Self {
        let c = (contrast - 50.0) / 50.0;
        Self {
            contrast: c,
            contrast_factor: ((c + 1.0) * PI / 4.0).tan(),
            midtones: midtones / 100.0,
            highlights: highlights / 100.0,
            luminance: luminance / 100.0,
        }
    }

    /// True when every stage is a no-op.
    pub fn is_neutral(&self) -> bool {
        self.contrast == 0.0
            && self.midtones == 0.5
            && self.highlights <= 0.0
            && self.luminance <= 0.0
    }

    /// Map one luminance value through all stages, in order.
    pub fn apply(&self, mut lum: f64) -> f64 {
        if self.contrast != 0.0 {
            lum = 0.5 + ((lum - 0.5) * self.contrast_factor).atan() / PI * 2.0 * 0.5;
        }

        if self.midtones != 0.5 {
            let gamma = 1.0 + (self.midtones - 0.5) * 2.0;
            if gamma != 0.0 {
                lum = lum.powf(1.0 / gamma);
            }
        }

        // Boost shrinks towards white so highlights never clip.
        if self.highlights > 0.0 && lum > 0.5 {
            let factor = (lum - 0.5) / 0.5;
            let boost = factor * self.highlights;
            lum += (1.0 - lum) * boost * (1.0 - factor);
        }

        if self.luminance > 0.0 && lum < self.luminance {
            let factor = (self.luminance - lum) / THRESHOLD_TRANSITION;
            if factor > 1.0 {
                lum = 0.0;
            } else {
                lum *= 1.0 - factor;
            }
        }

        lum.clamp(0.0, 1.0)
    }
}

/// Produce a gray RGBA copy of `img` with the curve applied. Alpha is kept.
pub fn adjust(img: &DynamicImage, curve: &ToneCurve) -> RgbaImage {
    let mut buf = img.to_rgba8();
    let (w, h) = buf.dimensions();
    let stride = w as usize * 4;
    let rows = parallel::band_rows(h as usize, parallel::worker_count(), 1);
    let neutral = curve.is_neutral();
    parallel::for_each_band(&mut *buf, stride, rows, |_, band| {
        for px in band.chunks_exact_mut(4) {
            let lum = base_luminance(px[0], px[1], px[2]);
            let gray = to_gray(if neutral { lum } else { curve.apply(lum) });
            px[0] = gray;
            px[1] = gray;
            px[2] = gray;
        }
    });
    buf
}
