//! Configuration handed to the unit at `init` and `config` time.

use crate::cube::{DetMatrixDesc, RadarCubeDesc, SAMPLE_BYTES};
use crate::hw::ChannelId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Paramsets the unit can ever need: (1 per TX antenna + 1 for the sum) × 2 halves.
pub const MAX_NUM_HWA_PARAMSET: usize = 8;

/// Largest TX antenna count that fits [`MAX_NUM_HWA_PARAMSET`].
pub const MAX_TX_ANTENNAS: usize = (MAX_NUM_HWA_PARAMSET - 2) / 2;

/// Memory banks the unit needs: ping/pong input and ping/pong FFT output.
pub const NUM_HWA_MEMBANKS: usize = 4;

/// Bytes per window coefficient.
pub const WINDOW_COEFF_BYTES: usize = std::mem::size_of::<i32>();

/// Fractional bits of a window coefficient (1.0 == 1 << 17).
pub const WINDOW_FRAC_BITS: u32 = 17;

/// Paramsets required for `num_tx_antennas`.
pub const fn required_param_sets(num_tx_antennas: usize) -> usize {
    2 * num_tx_antennas + 2
}

/// Window table size in bytes for a chirp count and symmetry.
///
/// A symmetric window stores only its first `ceil(chirps / 2)` coefficients.
pub const fn required_window_size(num_doppler_chirps: usize, symmetric: bool) -> usize {
    let coeffs = if symmetric {
        (num_doppler_chirps + 1) / 2
    } else {
        num_doppler_chirps
    };
    coeffs * WINDOW_COEFF_BYTES
}

/// Whether the first radix-2 stage divides by two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FirstStageScaling {
    Disabled = 0,
    Enabled = 1,
}

impl FirstStageScaling {
    /// Butterfly mask for an FFT of `2^log2` points; later stages always scale.
    pub const fn butterfly_mask(self, log2: u8) -> u16 {
        let all = ((1u32 << log2) - 1) as u16;
        match self {
            FirstStageScaling::Enabled => all,
            FirstStageScaling::Disabled => all & !1,
        }
    }
}

/// Algorithm dimensions.
///
/// Must satisfy, for one accelerator memory bank:
/// `tx * rx * chirps * 4 <= bank` and `tx * rx * bins * 2 <= bank`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaticConfig {
    pub num_tx_antennas: u8,
    pub num_rx_antennas: u8,
    pub num_virtual_antennas: u8,
    pub num_range_bins: u16,
    pub num_doppler_chirps: u16,
    pub num_doppler_bins: u16,
    pub log2_num_doppler_bins: u8,
}

impl StaticConfig {
    /// Bytes of one range bin's input (all virtual antennas, all chirps).
    pub fn input_bytes(&self) -> usize {
        self.num_tx_antennas as usize
            * self.num_rx_antennas as usize
            * self.num_doppler_chirps as usize
            * SAMPLE_BYTES
    }

    /// Bytes of one range bin's per-antenna magnitudes.
    pub fn output_bytes(&self) -> usize {
        self.num_tx_antennas as usize
            * self.num_rx_antennas as usize
            * self.num_doppler_bins as usize
            * std::mem::size_of::<u16>()
    }
}

/// Accelerator-side resources and window setup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HwaCfg {
    pub window_symmetric: bool,
    /// Q17 coefficients, length per [`required_window_size`].
    pub window: Vec<i32>,
    /// Window RAM offset, in coefficients.
    pub win_ram_offset: u32,
    pub first_stage_scaling: FirstStageScaling,
    /// Paramsets granted to the unit, starting at `param_set_start_idx`.
    pub num_param_sets: u8,
    pub param_set_start_idx: u32,
}

impl HwaCfg {
    pub fn window_size(&self) -> usize {
        self.window.len() * WINDOW_COEFF_BYTES
    }
}

/// One mover channel assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdmaChannelCfg {
    pub channel: u8,
    pub shadow_param_id: u16,
    pub event_queue: u8,
}

impl EdmaChannelCfg {
    pub fn id(&self) -> ChannelId {
        ChannelId(self.channel)
    }
}

/// Channel assignment of one transfer role for both halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdmaPingPong {
    pub ping: EdmaChannelCfg,
    pub pong: EdmaChannelCfg,
}

/// Mover handle plus its three transfer roles.
#[derive(Debug, Clone)]
pub struct EdmaCfg<M> {
    pub handle: M,
    /// Radar cube → scratch.
    pub input: EdmaPingPong,
    /// Scratch → detection matrix.
    pub output: EdmaPingPong,
    /// Completion event source.
    pub hot_signature: EdmaPingPong,
}

impl<M> EdmaCfg<M> {
    /// All six channel assignments, input ping first.
    pub fn channels(&self) -> [EdmaChannelCfg; 6] {
        [
            self.input.ping,
            self.input.pong,
            self.output.ping,
            self.output.pong,
            self.hot_signature.ping,
            self.hot_signature.pong,
        ]
    }
}

/// Hardware resources granted to the unit.
#[derive(Debug, Clone)]
pub struct HwResources<M> {
    pub edma: EdmaCfg<M>,
    pub hwa: HwaCfg,
    pub radar_cube: RadarCubeDesc,
    pub det_matrix: DetMatrixDesc,
}

/// Full argument of `config`.
#[derive(Debug, Clone)]
pub struct DopplerConfig<M> {
    pub hw_res: HwResources<M>,
    pub static_cfg: StaticConfig,
}

/// Argument of `init`.
#[derive(Debug, Clone)]
pub struct InitParams<A> {
    pub hwa: A,
    /// Bound on each completion wait; `None` blocks indefinitely.
    pub completion_timeout: Option<Duration>,
}

impl<A> InitParams<A> {
    pub fn new(hwa: A) -> Self {
        Self {
            hwa,
            completion_timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = Some(timeout);
        self
    }
}
