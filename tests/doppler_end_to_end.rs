use dopplerproc::cube::{Cmplx16ImRe, SampleIndex};
use dopplerproc::harness::SimRig;
use dopplerproc::window::{self, WindowShape};
use dopplerproc::FirstStageScaling;
use std::f64::consts::PI;

const AMPLITUDE: f64 = 3000.0;

/// Tone at Doppler bin `range % chirps` with a per-antenna phase.
fn tone(chirps: usize) -> impl FnMut(SampleIndex) -> Cmplx16ImRe {
    move |i| {
        let f = (i.range % chirps) as f64;
        let phase = 2.0 * PI * f * i.chirp as f64 / chirps as f64
            + 0.3 * (i.tx * 4 + i.rx) as f64
            + 0.1 * i.range as f64;
        Cmplx16ImRe::new(
            (AMPLITUDE * phase.cos()).round() as i16,
            (AMPLITUDE * phase.sin()).round() as i16,
        )
    }
}

/// Floating-point model: per-antenna windowed DFT magnitude, summed.
fn reference(rig: &SimRig, table: &[i32], symmetric: bool, divisor: f64) -> Vec<u16> {
    let dims = rig.cube.dims();
    let bins = rig.matrix.num_doppler_bins();
    let chirps = dims.num_doppler_chirps;
    let mut out = Vec::with_capacity(dims.num_range_bins * bins);
    for range in 0..dims.num_range_bins {
        for k in 0..bins {
            let mut sum = 0.0;
            for tx in 0..dims.num_tx_antennas {
                for rx in 0..dims.num_rx_antennas {
                    let (mut re, mut im) = (0.0, 0.0);
                    for n in 0..chirps {
                        let s = rig.cube.sample(SampleIndex { tx, rx, range, chirp: n });
                        let w = window::coefficient(table, n, chirps, symmetric).unwrap() as f64
                            / f64::from(1u32 << 17);
                        let angle = -2.0 * PI * (k * n) as f64 / bins as f64;
                        let (xr, xi) = (f64::from(s.real) * w, f64::from(s.imag) * w);
                        re += xr * angle.cos() - xi * angle.sin();
                        im += xr * angle.sin() + xi * angle.cos();
                    }
                    sum += (re.hypot(im) / divisor).round();
                }
            }
            out.push(sum.min(f64::from(u16::MAX)) as u16);
        }
    }
    out
}

fn assert_close(actual: &[u16], expected: &[u16], tolerance: u16) {
    assert_eq!(actual.len(), expected.len());
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            a.abs_diff(e) <= tolerance,
            "cell {i}: got {a}, expected {e} (tolerance {tolerance})"
        );
    }
}

fn peak(row: &[u16]) -> usize {
    row.iter()
        .enumerate()
        .max_by_key(|(_, v)| **v)
        .map(|(i, _)| i)
        .unwrap()
}

#[test]
fn two_tx_four_rx_matches_reference() {
    let table = window::generate(WindowShape::Hann, 16, true);
    let mut rig = SimRig::with_builder(|b| {
        b.antennas(2, 4)
            .range_bins(16)
            .doppler(16, 16)
            .window(table.clone(), true)
    })
    .unwrap();
    assert_eq!(rig.unit.resource_usage().unwrap().param_sets, 6);
    assert_eq!(rig.unit.plan().unwrap().num_param_sets(), 6);

    rig.fill_cube(tone(16));
    let out = rig.process().unwrap();
    assert_eq!(out.stats.range_bins_processed, 16);
    assert_eq!(out.stats.frames_processed, 1);

    let expected = reference(&rig, &table, true, 16.0);
    // a few LSB of rounding per antenna, eight antennas per cell
    assert_close(rig.matrix.cells(), &expected, 3 * 8);
    for range in 0..16 {
        assert_eq!(peak(rig.matrix.row(range).unwrap()), range);
    }
}

#[test]
fn odd_range_count_fills_every_row() {
    let table = window::generate(WindowShape::Hamming, 8, false);
    let mut rig = SimRig::with_builder(|b| {
        b.antennas(3, 2)
            .range_bins(5)
            .doppler(8, 16)
            .window(table.clone(), false)
    })
    .unwrap();
    rig.fill_cube(tone(8));
    rig.process().unwrap();

    let expected = reference(&rig, &table, false, 16.0);
    assert_close(rig.matrix.cells(), &expected, 3 * 6);
    for range in 0..5 {
        assert!(rig.matrix.row(range).unwrap().iter().any(|&v| v > 0));
    }
}

#[test]
fn odd_chirp_count_with_symmetric_window() {
    let table = window::generate(WindowShape::Hann, 15, true);
    assert_eq!(table.len(), 8);
    let mut rig = SimRig::with_builder(|b| {
        b.antennas(2, 2)
            .range_bins(6)
            .doppler(15, 16)
            .window(table.clone(), true)
    })
    .unwrap();
    rig.fill_cube(tone(15));
    rig.process().unwrap();

    // the centre tap is stored once and never mirrored
    let expected = reference(&rig, &table, true, 16.0);
    assert_close(rig.matrix.cells(), &expected, 3 * 4);
}

#[test]
fn accelerator_holds_the_planned_paramsets() {
    let mut rig = SimRig::new(3, 2, 4, 8, 8).unwrap();
    rig.process().unwrap();
    let plan = rig.unit.plan().unwrap();
    for half in &plan.halves {
        for (i, ps) in half.param_sets.iter().enumerate() {
            assert_eq!(
                rig.unit.accelerator().param_set(half.first_param_set + i),
                Some(ps)
            );
        }
    }
    let end = plan.first_param_set() + plan.num_param_sets();
    assert_eq!(rig.unit.accelerator().param_set(end), None);
}

#[test]
fn single_range_bin_uses_ping_only() {
    let mut rig = SimRig::new(1, 4, 1, 16, 16).unwrap();
    rig.fill_cube(tone(16));
    let out = rig.process().unwrap();
    assert_eq!(out.stats.range_bins_processed, 1);
    assert_eq!(peak(rig.matrix.row(0).unwrap()), 0);
}

#[test]
fn unscaled_first_stage_doubles_output() {
    let build = |scaling| {
        let mut rig = SimRig::with_builder(|b| {
            b.antennas(2, 4)
                .range_bins(4)
                .doppler(16, 16)
                .window(window::generate(WindowShape::Hann, 16, true), true)
                .first_stage_scaling(scaling)
        })
        .unwrap();
        rig.fill_cube(tone(16));
        rig.process().unwrap();
        rig.matrix
    };
    let scaled = build(FirstStageScaling::Enabled);
    let unscaled = build(FirstStageScaling::Disabled);
    for range in 0..4 {
        let a = scaled.row(range).unwrap();
        let b = unscaled.row(range).unwrap();
        let p = peak(a);
        assert_eq!(p, peak(b));
        let ratio = f64::from(b[p]) / f64::from(a[p]);
        assert!((ratio - 2.0).abs() < 0.01, "range {range}: ratio {ratio}");
    }
}

#[test]
fn repeated_frames_are_identical() {
    let mut rig = SimRig::new(2, 2, 8, 16, 32).unwrap();
    rig.fill_cube(tone(16));
    rig.process().unwrap();
    let first = rig.matrix.clone();
    rig.matrix.clear();
    let out = rig.process().unwrap();
    assert_eq!(rig.matrix, first);
    assert_eq!(out.stats.frames_processed, 2);
    assert_eq!(rig.unit.accelerator().stats().saturations, 0);
}
