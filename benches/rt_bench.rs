use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dopplerproc::harness::SimRig;
use dopplerproc::Cmplx16ImRe;

fn tone_rig(tx: u8, rx: u8, range: u16, chirps: u16) -> SimRig {
    let mut rig = SimRig::new(tx, rx, range, chirps, chirps).unwrap();
    rig.fill_cube(|i| {
        let phase = (i.range * i.chirp) as f64 * 0.4;
        Cmplx16ImRe::new((phase.cos() * 2000.0) as i16, (phase.sin() * 2000.0) as i16)
    });
    rig
}

fn bench_process_frame(c: &mut Criterion) {
    let mut rig = tone_rig(2, 4, 64, 32);
    c.bench_function("process_frame_2tx4rx_64x32", |b| {
        b.iter(|| {
            let out = rig.process().unwrap();
            black_box(&rig.matrix);
            black_box(out);
        })
    });
}

fn bench_worst_case_antennas(c: &mut Criterion) {
    let mut rig = tone_rig(3, 4, 128, 64);
    c.bench_function("process_frame_3tx4rx_128x64", |b| {
        b.iter(|| {
            rig.process().unwrap();
            black_box(&rig.matrix);
        })
    });
}

criterion_group!(benches, bench_process_frame, bench_worst_case_antennas);
criterion_main!(benches);
