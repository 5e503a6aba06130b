//! Q17 Doppler window tables sized for the accelerator's window RAM.

use crate::config::{required_window_size, WINDOW_COEFF_BYTES, WINDOW_FRAC_BITS};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window shapes the generator knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowShape {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
}

impl WindowShape {
    fn value(self, n: usize, len: usize) -> f64 {
        if len <= 1 {
            return 1.0;
        }
        let x = 2.0 * PI * n as f64 / (len - 1) as f64;
        match self {
            WindowShape::Rectangular => 1.0,
            WindowShape::Hann => 0.5 - 0.5 * x.cos(),
            WindowShape::Hamming => 0.54 - 0.46 * x.cos(),
            WindowShape::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
        }
    }
}

/// Coefficient table for `num_chirps` chirps.
///
/// With `symmetric` only the first `ceil(num_chirps / 2)` coefficients are
/// produced; the accelerator mirrors the rest, including the unmirrored centre
/// tap of an odd-length window.
pub fn generate(shape: WindowShape, num_chirps: usize, symmetric: bool) -> Vec<i32> {
    let len = required_window_size(num_chirps, symmetric) / WINDOW_COEFF_BYTES;
    let one = f64::from(1u32 << WINDOW_FRAC_BITS);
    (0..len)
        .map(|n| {
            let q = (shape.value(n, num_chirps) * one).round();
            // 1.0 itself does not fit the coefficient's signed range
            (q as i32).min((1 << WINDOW_FRAC_BITS) - 1)
        })
        .collect()
}

/// Coefficient applied to chirp `n` of `len` for a stored table.
pub fn coefficient(table: &[i32], n: usize, len: usize, symmetric: bool) -> Option<i32> {
    let i = if symmetric && n >= (len + 1) / 2 {
        len.checked_sub(1 + n)?
    } else {
        n
    };
    table.get(i).copied()
}
