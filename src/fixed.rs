//! Fixed-point arithmetic of the accelerator's window/FFT/magnitude datapath.

use crate::config::WINDOW_FRAC_BITS;
use std::f64::consts::PI;

/// Fractional bits of a twiddle factor.
pub const TWIDDLE_FRAC_BITS: u32 = 15;

/// Complex value inside the FFT datapath.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cplx {
    pub re: i32,
    pub im: i32,
}

/// Precomputed twiddles plus a working buffer for FFTs up to `2^max_log2`.
#[derive(Debug, Clone)]
pub struct FftEngine {
    max_log2: u8,
    /// `e^{-2πik/N}` for k in 0..N/2, N the maximum size.
    twiddles: Vec<Cplx>,
    work: Vec<Cplx>,
    saturations: u64,
}

impl FftEngine {
    pub fn new(max_log2: u8) -> Self {
        let n = 1usize << max_log2;
        let one = f64::from(1u32 << TWIDDLE_FRAC_BITS) - 1.0;
        let twiddles = (0..n / 2)
            .map(|k| {
                let angle = -2.0 * PI * k as f64 / n as f64;
                Cplx {
                    re: (angle.cos() * one).round() as i32,
                    im: (angle.sin() * one).round() as i32,
                }
            })
            .collect();
        Self {
            max_log2,
            twiddles,
            work: vec![Cplx::default(); n],
            saturations: 0,
        }
    }

    pub fn max_log2(&self) -> u8 {
        self.max_log2
    }

    /// Datapath overflows clamped so far.
    pub fn saturations(&self) -> u64 {
        self.saturations
    }

    /// Working buffer for an FFT of `2^log2` points, zero filled.
    pub fn input(&mut self, log2: u8) -> &mut [Cplx] {
        let n = 1usize << log2;
        let buf = &mut self.work[..n];
        buf.fill(Cplx::default());
        buf
    }

    /// In-place radix-2 DIT FFT over the first `2^log2` working entries.
    ///
    /// Bit k of `scaling` halves the output of stage k with round-half-up.
    pub fn transform(&mut self, log2: u8, scaling: u16) -> &[Cplx] {
        let n = 1usize << log2;
        let stride_base = self.twiddles.len() * 2;
        let buf = &mut self.work[..n];
        bit_reverse(buf, log2);

        let mut saturations = 0u64;
        for stage in 0..log2 {
            let len = 2usize << stage;
            let half = len / 2;
            let step = stride_base / len;
            let scale = scaling & (1 << stage) != 0;
            for start in (0..n).step_by(len) {
                for j in 0..half {
                    let w = self.twiddles[j * step];
                    let a = buf[start + j];
                    let b = buf[start + j + half];
                    let t_re = round_shift(
                        i64::from(b.re) * i64::from(w.re) - i64::from(b.im) * i64::from(w.im),
                        TWIDDLE_FRAC_BITS,
                    );
                    let t_im = round_shift(
                        i64::from(b.re) * i64::from(w.im) + i64::from(b.im) * i64::from(w.re),
                        TWIDDLE_FRAC_BITS,
                    );
                    let mut top = (i64::from(a.re) + t_re, i64::from(a.im) + t_im);
                    let mut bot = (i64::from(a.re) - t_re, i64::from(a.im) - t_im);
                    if scale {
                        top = (round_shift(top.0, 1), round_shift(top.1, 1));
                        bot = (round_shift(bot.0, 1), round_shift(bot.1, 1));
                    }
                    buf[start + j] = Cplx {
                        re: clamp_i32(top.0, &mut saturations),
                        im: clamp_i32(top.1, &mut saturations),
                    };
                    buf[start + j + half] = Cplx {
                        re: clamp_i32(bot.0, &mut saturations),
                        im: clamp_i32(bot.1, &mut saturations),
                    };
                }
            }
        }
        self.saturations += saturations;
        &self.work[..n]
    }
}

/// Multiply a 16-bit sample by a Q17 window coefficient.
pub fn apply_window(x: i16, coeff: i32) -> i32 {
    round_shift(i64::from(x) * i64::from(coeff), WINDOW_FRAC_BITS) as i32
}

/// Magnitude rounded to the nearest integer, saturated to u16.
pub fn magnitude(c: Cplx) -> (u16, bool) {
    let mag = (f64::from(c.re)).hypot(f64::from(c.im)).round();
    if mag > f64::from(u16::MAX) {
        (u16::MAX, true)
    } else {
        (mag as u16, false)
    }
}

/// Saturating sum of u16 cells read from fallible storage.
///
/// The sum is carried in u32 and clipped once at the end; the flag reports
/// the clip.
pub fn accumulate<E>(
    values: impl IntoIterator<Item = Result<u16, E>>,
) -> Result<(u16, bool), E> {
    let mut sum = 0u32;
    for v in values {
        sum = sum.saturating_add(u32::from(v?));
    }
    Ok(match u16::try_from(sum) {
        Ok(v) => (v, false),
        Err(_) => (u16::MAX, true),
    })
}

fn round_shift(v: i64, bits: u32) -> i64 {
    (v + (1 << (bits - 1))) >> bits
}

fn clamp_i32(v: i64, saturations: &mut u64) -> i32 {
    match i32::try_from(v) {
        Ok(v) => v,
        Err(_) => {
            *saturations += 1;
            if v < 0 {
                i32::MIN
            } else {
                i32::MAX
            }
        }
    }
}

fn bit_reverse(buf: &mut [Cplx], log2: u8) {
    if log2 == 0 {
        return;
    }
    for i in 0..buf.len() {
        let j = (i.reverse_bits() >> (usize::BITS - u32::from(log2))) as usize;
        if i < j {
            buf.swap(i, j);
        }
    }
}
