//! Configurations loaded from JSON, the way a host tool would hand them over.

use dopplerproc::harness::RIG_TIMEOUT;
use dopplerproc::sim;
use dopplerproc::window::{self, WindowShape};
use dopplerproc::{
    CubeDims, DetMatrixFormat, DetectionMatrix, DopplerConfig, DopplerProc, EdmaCfg,
    EdmaPingPong, HwResources, HwaCfg, InitParams, RadarCube, RadarCubeFormat, StaticConfig,
};
use serde_json::json;

fn channels(first: u8) -> EdmaPingPong {
    let shadow = 64 + u16::from(first);
    serde_json::from_value(json!({
        "ping": { "channel": first, "shadow_param_id": shadow, "event_queue": 0 },
        "pong": { "channel": first + 1, "shadow_param_id": shadow + 1, "event_queue": 0 },
    }))
    .unwrap()
}

#[test]
fn json_configuration_runs_a_frame() {
    let static_cfg: StaticConfig = serde_json::from_value(json!({
        "num_tx_antennas": 2,
        "num_rx_antennas": 2,
        "num_virtual_antennas": 4,
        "num_range_bins": 6,
        "num_doppler_chirps": 8,
        "num_doppler_bins": 8,
        "log2_num_doppler_bins": 3,
    }))
    .unwrap();
    let hwa_cfg: HwaCfg = serde_json::from_value(json!({
        "window_symmetric": true,
        "window": window::generate(WindowShape::Rectangular, 8, true),
        "win_ram_offset": 16,
        "first_stage_scaling": "Enabled",
        "num_param_sets": 6,
        "param_set_start_idx": 4,
    }))
    .unwrap();
    let buffers = json!({
        "radar_cube": { "format": "TxRangeChirpRx", "data_size": 2 * 2 * 6 * 8 * 4 },
        "det_matrix": { "format": "RangeMajor", "data_size": 6 * 8 * 2 },
    });

    let (hwa, edma) = sim::default_platform();
    let cfg = DopplerConfig {
        hw_res: HwResources {
            edma: EdmaCfg {
                handle: edma,
                input: channels(10),
                output: channels(12),
                hot_signature: channels(14),
            },
            hwa: hwa_cfg,
            radar_cube: serde_json::from_value(buffers["radar_cube"].clone()).unwrap(),
            det_matrix: serde_json::from_value(buffers["det_matrix"].clone()).unwrap(),
        },
        static_cfg,
    };

    let mut unit = DopplerProc::init(InitParams::new(hwa).with_timeout(RIG_TIMEOUT)).unwrap();
    unit.config(cfg).unwrap();
    assert_eq!(unit.plan().unwrap().first_param_set(), 4);

    let dims = CubeDims {
        num_tx_antennas: 2,
        num_rx_antennas: 2,
        num_range_bins: 6,
        num_doppler_chirps: 8,
    };
    let cube = RadarCube::from_fn(RadarCubeFormat::TxRangeChirpRx, dims, |_| {
        dopplerproc::Cmplx16ImRe::new(100, 0)
    });
    let mut matrix = DetectionMatrix::zeroed(DetMatrixFormat::RangeMajor, 6, 8);
    let out = unit.process(&cube, &mut matrix).unwrap();
    assert_eq!(out.stats.range_bins_processed, 6);
    assert_eq!(
        &unit.accelerator().window_ram()[16..20],
        window::generate(WindowShape::Rectangular, 8, true).as_slice()
    );
    // a constant input lands entirely in the zero Doppler bin
    for range in 0..6 {
        let row = matrix.row(range).unwrap();
        assert!(row[0] > 0);
        assert!(row[1..].iter().all(|&v| v <= row[0] / 8));
    }
    let mover = unit.mover().unwrap();
    assert!(mover.chain(dopplerproc::hw::ChannelId(14)).is_some());
}

#[test]
fn static_config_round_trips_through_json() {
    let s = StaticConfig {
        num_tx_antennas: 3,
        num_rx_antennas: 4,
        num_virtual_antennas: 12,
        num_range_bins: 256,
        num_doppler_chirps: 32,
        num_doppler_bins: 64,
        log2_num_doppler_bins: 6,
    };
    let text = serde_json::to_string(&s).unwrap();
    assert_eq!(serde_json::from_str::<StaticConfig>(&text).unwrap(), s);
}

#[test]
fn unknown_format_is_rejected_by_the_loader() {
    let r = serde_json::from_value::<dopplerproc::RadarCubeDesc>(json!({
        "format": "ChirpMajor",
        "data_size": 64,
    }));
    assert!(r.is_err());
}
