use std::time::Instant;

use image::{DynamicImage, GrayImage};

use crate::blur::blur;
use crate::dither::dither;
use crate::params::DitherParams;
use crate::tone::{ToneCurve, adjust};

/// Run the full chain: tone adjustment, optional blur, then dithering.
///
/// Each stage completes over the whole image before the next one starts.
pub fn process(base: &DynamicImage, params: &DitherParams) -> GrayImage {
    let start = Instant::now();
    let curve = ToneCurve::new(
        params.contrast,
        params.midtones,
        params.highlights,
        params.luminance_threshold,
    );
    let mut img = adjust(base, &curve);
    let toned_ms = start.elapsed().as_millis();

    if params.blur > 0.0 {
        img = blur(img, params.blur);
    }
    let blurred_ms = start.elapsed().as_millis();

    let out = dither(&img, params.algorithm, params.scale, params.invert);
    tracing::debug!(
        width = out.width(),
        height = out.height(),
        algorithm = params.algorithm.name(),
        toned_ms,
        blurred_ms,
        total_ms = start.elapsed().as_millis(),
        "pipeline finished"
    );
    out
}
