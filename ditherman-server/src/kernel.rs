//! Static coefficient tables for the dithering algorithms.
//!
//! Error-diffusion kernels are expressed as (row, col, weight) taps in block
//! units together with a divisor; ordered dithering uses a single 4x4 Bayer
//! index matrix.

/// One propagation target of an error-diffusion kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tap {
    /// Rows below the current block (0 = same row).
    pub drow: usize,
    /// Columns relative to the current block.
    pub dcol: isize,
    pub weight: u8,
}

/// Error-diffusion kernel. Each tap receives `error * weight / divisor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSpec {
    pub taps: &'static [Tap],
    pub divisor: u8,
}

impl KernelSpec {
    /// Sum of all tap weights. Equal to `divisor` when the kernel conserves
    /// the full quantization error.
    pub fn weight_sum(&self) -> u32 {
        self.taps.iter().map(|t| t.weight as u32).sum()
    }

    /// Deepest row offset any tap reaches.
    pub fn lookahead(&self) -> usize {
        self.taps.iter().map(|t| t.drow).max().unwrap_or(0)
    }
}

macro_rules! kernel {
    ($name:ident, $div:expr, [ $( ($dr:expr, $dc:expr, $w:expr) ),* $(,)? ]) => {
        pub const $name: KernelSpec = KernelSpec {
            taps: &[ $( Tap { drow: $dr, dcol: $dc, weight: $w } ),* ],
            divisor: $div,
        };
    };
}

//      X   7
//  3   5   1
kernel!(
    FLOYD_STEINBERG,
    16,
    [(0, 1, 7), (1, -1, 3), (1, 0, 5), (1, 1, 1)]
);

// Drops 2/8 of the error on purpose.
//      X   1   1
//  1   1   1
//      1
kernel!(
    ATKINSON,
    8,
    [
        (0, 1, 1),
        (0, 2, 1),
        (1, -1, 1),
        (1, 0, 1),
        (1, 1, 1),
        (2, 0, 1)
    ]
);

//          X   8   4
//  2   4   8   4   2
//  1   2   4   2   1
kernel!(
    STUCKI,
    42,
    [
        (0, 1, 8),
        (0, 2, 4),
        (1, -2, 2),
        (1, -1, 4),
        (1, 0, 8),
        (1, 1, 4),
        (1, 2, 2),
        (2, -2, 1),
        (2, -1, 2),
        (2, 0, 4),
        (2, 1, 2),
        (2, 2, 1)
    ]
);

//          X   5   3
//  2   4   5   4   2
//      2   3   2
kernel!(
    SIERRA,
    32,
    [
        (0, 1, 5),
        (0, 2, 3),
        (1, -2, 2),
        (1, -1, 4),
        (1, 0, 5),
        (1, 1, 4),
        (1, 2, 2),
        (2, -1, 2),
        (2, 0, 3),
        (2, 1, 2)
    ]
);

/// Deepest look-ahead of any supported kernel, in blocks.
pub const MAX_LOOKAHEAD: usize = 2;

#[rustfmt::skip]
pub const BAYER_4: [[u8; 4]; 4] = [
    [ 0,  8,  2, 10],
    [12,  4, 14,  6],
    [ 3, 11,  1,  9],
    [15,  7, 13,  5],
];

/// Threshold in [0, 255) for the block at (`block_row`, `block_col`).
#[inline(always)]
pub fn bayer_threshold(block_row: usize, block_col: usize) -> f64 {
    BAYER_4[block_row % 4][block_col % 4] as f64 / 16.0 * 255.0
}

/// Supported dithering algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    FloydSteinberg,
    Ordered,
    Atkinson,
    Stucki,
    Sierra,
}

/// How an [`Algorithm`] turns a block average into black or white.
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    Diffusion(&'static KernelSpec),
    Ordered,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::FloydSteinberg,
        Algorithm::Ordered,
        Algorithm::Atkinson,
        Algorithm::Stucki,
        Algorithm::Sierra,
    ];

    /// Resolve a selector string. Unrecognised names map to Floyd-Steinberg.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.name() == name)
            .unwrap_or_else(|| {
                tracing::debug!(algorithm = %name, "unknown algorithm; using floyd-steinberg");
                Algorithm::FloydSteinberg
            })
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::FloydSteinberg => "floyd-steinberg",
            Algorithm::Ordered => "ordered",
            Algorithm::Atkinson => "atkinson",
            Algorithm::Stucki => "stucki",
            Algorithm::Sierra => "sierra",
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            Algorithm::FloydSteinberg => Strategy::Diffusion(&FLOYD_STEINBERG),
            Algorithm::Atkinson => Strategy::Diffusion(&ATKINSON),
            Algorithm::Stucki => Strategy::Diffusion(&STUCKI),
            Algorithm::Sierra => Strategy::Diffusion(&SIERRA),
            Algorithm::Ordered => Strategy::Ordered,
        }
    }
}
