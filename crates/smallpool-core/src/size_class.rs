//! Size class bands for small allocations.
//!
//! Byte counts `1..=SMALL_OBJECT_THRESHOLD` fall into six bands. Each band
//! rounds requests up to its own alignment unit:
//!
//! | Band        | Unit | Classes |
//! |-------------|------|---------|
//! | 1..=128     | 8    | 0..=15  |
//! | 129..=256   | 16   | 16..=23 |
//! | 257..=512   | 32   | 24..=31 |
//! | 513..=1024  | 64   | 32..=39 |
//! | 1025..=2048 | 128  | 40..=47 |
//! | 2049..=4096 | 256  | 48..=55 |
//!
//! Class indices are contiguous across band boundaries and exactly fill
//! `0..NUM_SIZE_CLASSES`.

use crate::config::{NUM_SIZE_CLASSES, SMALL_OBJECT_THRESHOLD};

/// One alignment band.
#[derive(Debug, Clone, Copy)]
struct Band {
    /// Largest byte count in the band (inclusive).
    upper: usize,
    /// Alignment unit for the band.
    unit: usize,
    /// Class index of the band's first slot size.
    first_class: usize,
}

const BANDS: [Band; 6] = [
    Band { upper: 128, unit: 8, first_class: 0 },
    Band { upper: 256, unit: 16, first_class: 16 },
    Band { upper: 512, unit: 32, first_class: 24 },
    Band { upper: 1024, unit: 64, first_class: 32 },
    Band { upper: 2048, unit: 128, first_class: 40 },
    Band { upper: 4096, unit: 256, first_class: 48 },
];

const fn band_lower(band: usize) -> usize {
    if band == 0 { 0 } else { BANDS[band - 1].upper }
}

const fn band_for_bytes(bytes: usize) -> usize {
    let mut i = 0;
    while i < BANDS.len() - 1 {
        if bytes <= BANDS[i].upper {
            return i;
        }
        i += 1;
    }
    BANDS.len() - 1
}

/// Returns the alignment unit for `bytes`.
///
/// Counts above the last band use the last band's unit, which keeps
/// [`round_up`] meaningful for growth-size arithmetic.
#[must_use]
pub const fn align(bytes: usize) -> usize {
    BANDS[band_for_bytes(bytes)].unit
}

/// Rounds `bytes` up to a multiple of its band's alignment unit.
///
/// For `1..=SMALL_OBJECT_THRESHOLD` this is the slot size of the class
/// `bytes` maps to.
#[must_use]
pub const fn round_up(bytes: usize) -> usize {
    let unit = align(bytes);
    (bytes + unit - 1) & !(unit - 1)
}

/// Computes the size class for `bytes`.
///
/// Zero is treated as one byte. Callers must keep `bytes` at or below
/// [`SMALL_OBJECT_THRESHOLD`].
#[must_use]
pub const fn class_index(bytes: usize) -> usize {
    debug_assert!(bytes <= SMALL_OBJECT_THRESHOLD);
    let bytes = if bytes == 0 { 1 } else { bytes };
    let band = band_for_bytes(bytes);
    let b = BANDS[band];
    b.first_class + (bytes - band_lower(band)).div_ceil(b.unit) - 1
}

/// Returns the slot size served for `class`.
#[must_use]
pub const fn slot_size(class: usize) -> usize {
    debug_assert!(class < NUM_SIZE_CLASSES);
    let mut band = BANDS.len() - 1;
    while BANDS[band].first_class > class {
        band -= 1;
    }
    let b = BANDS[band];
    band_lower(band) + (class - b.first_class + 1) * b.unit
}

/// Returns the largest class whose slot size does not exceed `bytes`, or
/// `None` if `bytes` is smaller than the smallest slot.
#[must_use]
pub const fn floor_class(bytes: usize) -> Option<usize> {
    if bytes >= SMALL_OBJECT_THRESHOLD {
        return Some(NUM_SIZE_CLASSES - 1);
    }
    if bytes < slot_size(0) {
        return None;
    }
    let class = class_index(bytes);
    if slot_size(class) == bytes {
        Some(class)
    } else {
        Some(class - 1)
    }
}
