//! Resource validation run by `config` before any descriptor is built.
//!
//! Checks run in a fixed order so a configuration that breaks several rules
//! always reports the same error.

use crate::config::{
    required_param_sets, required_window_size, DopplerConfig, MAX_NUM_HWA_PARAMSET,
};
use crate::cube::{DetMatrixFormat, RadarCubeFormat, CELL_BYTES, SAMPLE_BYTES};
use crate::error::{DopplerError, DopplerResult};
use crate::hw::{HwaCapacity, MoverCapacity};
use crate::invariant_ppt::{
    assert_invariant, BANK_CAPACITY, CHANNELS_DISTINCT, CONFIG_VALIDATED, PARAMSET_BUDGET,
    WINDOW_SIZE_MATCH,
};

/// Resources an accepted configuration will occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUsage {
    pub param_sets: usize,
    pub input_bytes_per_bank: usize,
    pub output_bytes_per_bank: usize,
    pub window_coeffs: usize,
}

/// Validate `cfg` against the accelerator and mover limits.
pub fn validate<M>(
    cfg: &DopplerConfig<M>,
    hwa: &HwaCapacity,
    mover: &MoverCapacity,
) -> DopplerResult<ResourceUsage> {
    let s = &cfg.static_cfg;
    let hw = &cfg.hw_res;
    let tx = usize::from(s.num_tx_antennas);
    let rx = usize::from(s.num_rx_antennas);
    let range = usize::from(s.num_range_bins);
    let chirps = usize::from(s.num_doppler_chirps);
    let bins = usize::from(s.num_doppler_bins);

    if tx == 0 || rx == 0 || range == 0 || chirps == 0 || bins == 0 {
        return Err(DopplerError::InvalidArgument(
            "antenna, range and Doppler counts must be non-zero",
        ));
    }
    if usize::from(s.num_virtual_antennas) != tx * rx {
        return Err(DopplerError::InvalidArgument("virtual antennas must equal tx * rx"));
    }
    if !bins.is_power_of_two() || u32::from(s.log2_num_doppler_bins) != bins.trailing_zeros() {
        return Err(DopplerError::InvalidArgument(
            "Doppler bins must be 2^log2_num_doppler_bins",
        ));
    }
    if bins < chirps {
        return Err(DopplerError::InvalidArgument("fewer Doppler bins than chirps"));
    }
    if s.log2_num_doppler_bins > hwa.max_fft_size_log2 {
        return Err(DopplerError::InvalidArgument(
            "FFT size exceeds the accelerator maximum",
        ));
    }
    check_channels(cfg, mover)?;
    if hw.hwa.window.is_empty() {
        return Err(DopplerError::InvalidArgument("empty window"));
    }

    if hw.radar_cube.format != RadarCubeFormat::TxRangeChirpRx {
        return Err(DopplerError::UnsupportedCubeFormat);
    }
    if hw.det_matrix.format != DetMatrixFormat::RangeMajor {
        return Err(DopplerError::UnsupportedMatrixFormat);
    }
    if hw.radar_cube.data_size < tx * rx * range * chirps * SAMPLE_BYTES {
        return Err(DopplerError::InvalidArgument("radar cube smaller than its dimensions"));
    }
    let matrix_bytes = range * bins * CELL_BYTES;
    if hw.det_matrix.data_size < matrix_bytes {
        return Err(DopplerError::InsufficientMatrixSize {
            required: matrix_bytes,
            available: hw.det_matrix.data_size,
        });
    }

    let input_bytes = s.input_bytes();
    let output_bytes = s.output_bytes();
    let worst = input_bytes.max(output_bytes);
    if worst > hwa.mem_bank_bytes {
        return Err(DopplerError::ExceedsHwaMemory {
            required: worst,
            available: hwa.mem_bank_bytes,
        });
    }
    assert_invariant(BANK_CAPACITY, worst <= hwa.mem_bank_bytes, "row fits one bank", None);

    let expected = required_window_size(chirps, hw.hwa.window_symmetric);
    if hw.hwa.window_size() != expected {
        return Err(DopplerError::BadWindowSize {
            expected,
            actual: hw.hwa.window_size(),
        });
    }
    assert_invariant(WINDOW_SIZE_MATCH, true, "window size formula", None);

    let window_end = (hw.hwa.win_ram_offset as usize).saturating_add(hw.hwa.window.len());
    if window_end > hwa.window_ram_len {
        return Err(DopplerError::InsufficientHwaResources("window RAM"));
    }

    let needed = required_param_sets(tx);
    // the grant must be exactly the job count, not merely enough
    if needed > MAX_NUM_HWA_PARAMSET || usize::from(hw.hwa.num_param_sets) != needed {
        return Err(DopplerError::InsufficientHwaResources("paramsets"));
    }
    let start = hw.hwa.param_set_start_idx as usize;
    if start.saturating_add(needed) > hwa.num_param_sets {
        return Err(DopplerError::InsufficientHwaResources("paramset range"));
    }
    assert_invariant(PARAMSET_BUDGET, needed <= MAX_NUM_HWA_PARAMSET, "paramset budget", None);

    assert_invariant(CONFIG_VALIDATED, true, "configuration accepted", None);
    Ok(ResourceUsage {
        param_sets: needed,
        input_bytes_per_bank: input_bytes,
        output_bytes_per_bank: output_bytes,
        window_coeffs: hw.hwa.window.len(),
    })
}

fn check_channels<M>(cfg: &DopplerConfig<M>, mover: &MoverCapacity) -> DopplerResult<()> {
    let channels = cfg.hw_res.edma.channels();
    for (i, ch) in channels.iter().enumerate() {
        if ch.channel >= mover.num_channels {
            return Err(DopplerError::InvalidArgument("mover channel out of range"));
        }
        if channels[..i].iter().any(|other| other.channel == ch.channel) {
            return Err(DopplerError::InvalidArgument("mover channel assigned twice"));
        }
    }
    assert_invariant(CHANNELS_DISTINCT, true, "six distinct channels", None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DopplerConfigBuilder;
    use crate::config::FirstStageScaling;
    use crate::sim::{DEFAULT_HWA_CAPACITY, DEFAULT_MOVER_CAPACITY};
    use crate::window::{self, WindowShape};

    fn base() -> DopplerConfigBuilder<()> {
        DopplerConfigBuilder::new(())
            .antennas(2, 4)
            .range_bins(32)
            .doppler(16, 16)
            .window(window::generate(WindowShape::Hann, 16, true), true)
            .first_stage_scaling(FirstStageScaling::Enabled)
    }

    fn check(cfg: &DopplerConfig<()>) -> DopplerResult<ResourceUsage> {
        validate(cfg, &DEFAULT_HWA_CAPACITY, &DEFAULT_MOVER_CAPACITY)
    }

    #[test]
    fn accepts_reference_configuration() {
        let usage = check(&base().build().unwrap()).unwrap();
        assert_eq!(usage.param_sets, 6);
        assert_eq!(usage.input_bytes_per_bank, 512);
        assert_eq!(usage.output_bytes_per_bank, 256);
    }

    #[test]
    fn argument_errors_come_first() {
        let mut cfg = base().build().unwrap();
        cfg.static_cfg.num_virtual_antennas = 7;
        cfg.hw_res.radar_cube.format = RadarCubeFormat::RangeChirpTxRx;
        assert!(matches!(check(&cfg), Err(DopplerError::InvalidArgument(_))));
    }

    #[test]
    fn non_power_of_two_bins_rejected() {
        let mut cfg = base().build().unwrap();
        cfg.static_cfg.num_doppler_bins = 24;
        assert!(matches!(check(&cfg), Err(DopplerError::InvalidArgument(_))));
    }

    #[test]
    fn format_errors() {
        let mut cfg = base().build().unwrap();
        cfg.hw_res.radar_cube.format = RadarCubeFormat::RangeVirtAntChirp;
        assert_eq!(check(&cfg), Err(DopplerError::UnsupportedCubeFormat));

        let mut cfg = base().build().unwrap();
        cfg.hw_res.det_matrix.format = DetMatrixFormat::DopplerMajor;
        assert_eq!(check(&cfg), Err(DopplerError::UnsupportedMatrixFormat));
    }

    #[test]
    fn matrix_too_small() {
        let mut cfg = base().build().unwrap();
        cfg.hw_res.det_matrix.data_size -= 2;
        assert_eq!(
            check(&cfg),
            Err(DopplerError::InsufficientMatrixSize {
                required: 32 * 16 * 2,
                available: 32 * 16 * 2 - 2,
            })
        );
    }

    #[test]
    fn window_size_mismatch() {
        let cfg = base()
            .window(window::generate(WindowShape::Hann, 16, false), true)
            .build()
            .unwrap();
        assert_eq!(
            check(&cfg),
            Err(DopplerError::BadWindowSize {
                expected: 32,
                actual: 64
            })
        );
    }

    #[test]
    fn bank_overflow() {
        let cfg = base()
            .antennas(3, 4)
            .doppler(512, 512)
            .window(window::generate(WindowShape::Hann, 512, true), true)
            .build()
            .unwrap();
        assert_eq!(
            check(&cfg),
            Err(DopplerError::ExceedsHwaMemory {
                required: 3 * 4 * 512 * 4,
                available: DEFAULT_HWA_CAPACITY.mem_bank_bytes,
            })
        );
    }

    #[test]
    fn paramset_shortage() {
        let cfg = base().param_sets(0, 5).build().unwrap();
        assert_eq!(
            check(&cfg),
            Err(DopplerError::InsufficientHwaResources("paramsets"))
        );

        let slots = DEFAULT_HWA_CAPACITY.num_param_sets as u32;
        let cfg = base().param_sets(slots - 4, 6).build().unwrap();
        assert_eq!(
            check(&cfg),
            Err(DopplerError::InsufficientHwaResources("paramset range"))
        );
    }

    #[test]
    fn oversized_paramset_grant_rejected() {
        let cfg = base().param_sets(0, 8).build().unwrap();
        assert_eq!(
            check(&cfg),
            Err(DopplerError::InsufficientHwaResources("paramsets"))
        );
    }

    #[test]
    fn duplicate_channel_rejected() {
        let mut cfg = base().build().unwrap();
        cfg.hw_res.edma.output.pong.channel = cfg.hw_res.edma.input.ping.channel;
        assert!(matches!(check(&cfg), Err(DopplerError::InvalidArgument(_))));
    }

    #[test]
    fn window_ram_overflow() {
        let cfg = base().window_ram_offset(2044).build().unwrap();
        assert_eq!(
            check(&cfg),
            Err(DopplerError::InsufficientHwaResources("window RAM"))
        );
    }
}
