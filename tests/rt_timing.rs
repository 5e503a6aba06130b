use dopplerproc::harness::SimRig;
use std::time::Instant;

#[test]
fn rt_timing_stability() {
    // largest antenna count at a modest frame size
    let mut rig = SimRig::new(3, 4, 64, 32, 32).unwrap();
    rig.fill_cube(|i| dopplerproc::Cmplx16ImRe::new(i.chirp as i16 * 50, -(i.range as i16)));

    let start = Instant::now();
    for _ in 0..100 {
        rig.process().unwrap();
    }
    let duration = start.elapsed();
    // Assert bounded: well under the frame rate of a debug build
    assert!(duration.as_secs() < 10, "Execution took too long: {:?}", duration);

    let stats = rig.unit.stats();
    assert_eq!(stats.frames_processed, 100);
    assert_eq!(stats.range_bins_processed, 64);
}
