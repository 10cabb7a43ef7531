//! Request parameters for a dithering run.

use std::collections::HashMap;

use crate::error::ApiError;
use crate::kernel::Algorithm;

/// Validated parameters; every numeric field is already clamped to its range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DitherParams {
    pub algorithm: Algorithm,
    /// Block size factor in [0, 20].
    pub scale: f64,
    pub invert: bool,
    /// [0, 100], 50 is neutral.
    pub contrast: f64,
    /// [0, 100], 50 is neutral.
    pub midtones: f64,
    /// [0, 100], 0 is neutral.
    pub highlights: f64,
    /// [0, 100], 0 is neutral.
    pub luminance_threshold: f64,
    /// Gaussian radius in [0, 10], 0 disables the blur.
    pub blur: f64,
}

impl Default for DitherParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::FloydSteinberg,
            scale: 1.0,
            invert: false,
            contrast: 50.0,
            midtones: 50.0,
            highlights: 50.0,
            luminance_threshold: 50.0,
            blur: 0.0,
        }
    }
}

impl DitherParams {
    /// Build from multipart text fields. Missing or empty fields take their
    /// defaults; numbers are clamped; unparsable numbers are rejected.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ApiError> {
        let d = Self::default();
        let get = |key: &str| fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let number = |key: &str, name: &'static str, default: f64, max: f64| {
            match get(key) {
                None => Ok(default),
                Some(raw) => match raw.parse::<f64>() {
                    Ok(v) if !v.is_nan() => Ok(v.clamp(0.0, max)),
                    _ => Err(ApiError::InvalidParam(name)),
                },
            }
        };
        Ok(Self {
            algorithm: get("algorithm")
                .map(Algorithm::from_name)
                .unwrap_or(d.algorithm),
            invert: get("invert").is_some_and(|v| matches!(v, "1" | "true" | "on")),
            scale: number("scale", "scale", d.scale, 20.0)?,
            contrast: number("contrast", "contrast", d.contrast, 100.0)?,
            midtones: number("midtones", "midtones", d.midtones, 100.0)?,
            highlights: number("highlights", "highlights", d.highlights, 100.0)?,
            luminance_threshold: number(
                "luminanceThreshold",
                "luminance",
                d.luminance_threshold,
                100.0,
            )?,
            blur: number("blur", "blur", d.blur, 10.0)?,
        })
    }
}
