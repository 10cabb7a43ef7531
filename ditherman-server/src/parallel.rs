//! Fork/join helpers over disjoint row bands.
//!
//! Every helper hands each worker an exclusive `&mut` slice covering a
//! contiguous run of rows and returns only once all bands are done, so
//! consecutive calls are separated by a full barrier.

use rayon::prelude::*;

/// Number of bands to split work into: one per pool thread.
pub fn worker_count() -> usize {
    rayon::current_num_threads().max(1)
}

/// Rows per band when splitting `height` rows into at most `bands` bands.
///
/// The result is a multiple of `align` (so dithering blocks never straddle
/// two bands) and never zero.
pub fn band_rows(height: usize, bands: usize, align: usize) -> usize {
    let align = align.max(1);
    let units = height.div_ceil(align);
    let per_band = units.div_ceil(bands.max(1)).max(1);
    per_band * align
}

/// Run `f(first_row, band)` over `out` split into bands of `rows_per_band`
/// rows of `stride` elements each.
pub fn for_each_band<T, F>(out: &mut [T], stride: usize, rows_per_band: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    if out.is_empty() || stride == 0 || rows_per_band == 0 {
        return;
    }
    out.par_chunks_mut(stride * rows_per_band)
        .enumerate()
        .for_each(|(i, band)| f(i * rows_per_band, band));
}

/// Like [`for_each_band`], but also hands every band its own slice of
/// `scratch_per_band` elements carved out of a single zeroed arena.
pub fn for_each_band_with_scratch<T, S, F>(
    out: &mut [T],
    stride: usize,
    rows_per_band: usize,
    scratch_per_band: usize,
    f: F,
) where
    T: Send,
    S: Default + Clone + Send,
    F: Fn(usize, &mut [T], &mut [S]) + Sync + Send,
{
    if out.is_empty() || stride == 0 || rows_per_band == 0 || scratch_per_band == 0 {
        return;
    }
    let band_len = stride * rows_per_band;
    let bands = out.len().div_ceil(band_len);
    let mut arena = vec![S::default(); bands * scratch_per_band];
    out.par_chunks_mut(band_len)
        .zip(arena.par_chunks_mut(scratch_per_band))
        .enumerate()
        .for_each(|(i, (band, scratch))| f(i * rows_per_band, band, scratch));
}
