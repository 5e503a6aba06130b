//! Builder API for Doppler configurations.
//!
//! Derives the redundant fields of [`StaticConfig`] and the buffer descriptors
//! from the primary dimensions. Nothing is checked against hardware here;
//! `config` does that.

use crate::config::{
    required_param_sets, DopplerConfig, EdmaCfg, EdmaChannelCfg, EdmaPingPong, FirstStageScaling,
    HwResources, HwaCfg, StaticConfig,
};
use crate::cube::{
    DetMatrixDesc, DetMatrixFormat, RadarCubeDesc, RadarCubeFormat, CELL_BYTES, SAMPLE_BYTES,
};
use thiserror::Error;

/// Builder-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("{0} does not fit its field")]
    OutOfRange(&'static str),
}

/// The configuration builder.
#[derive(Debug, Clone)]
pub struct DopplerConfigBuilder<M> {
    handle: M,
    antennas: Option<(u8, u8)>,
    range_bins: Option<u16>,
    doppler: Option<(u16, u16)>,
    window: Option<(Vec<i32>, bool)>,
    win_ram_offset: u32,
    scaling: FirstStageScaling,
    param_sets: Option<(u32, u8)>,
    channels: Option<[EdmaPingPong; 3]>,
    first_channel: u8,
    cube_format: RadarCubeFormat,
    matrix_format: DetMatrixFormat,
}

impl<M> DopplerConfigBuilder<M> {
    /// Create a new builder around a mover handle.
    pub fn new(handle: M) -> Self {
        Self {
            handle,
            antennas: None,
            range_bins: None,
            doppler: None,
            window: None,
            win_ram_offset: 0,
            scaling: FirstStageScaling::Enabled,
            param_sets: None,
            channels: None,
            first_channel: 0,
            cube_format: RadarCubeFormat::TxRangeChirpRx,
            matrix_format: DetMatrixFormat::RangeMajor,
        }
    }

    pub fn antennas(mut self, tx: u8, rx: u8) -> Self {
        self.antennas = Some((tx, rx));
        self
    }

    pub fn range_bins(mut self, n: u16) -> Self {
        self.range_bins = Some(n);
        self
    }

    /// Chirps per frame and Doppler FFT size.
    pub fn doppler(mut self, chirps: u16, bins: u16) -> Self {
        self.doppler = Some((chirps, bins));
        self
    }

    pub fn window(mut self, coeffs: Vec<i32>, symmetric: bool) -> Self {
        self.window = Some((coeffs, symmetric));
        self
    }

    pub fn window_ram_offset(mut self, offset: u32) -> Self {
        self.win_ram_offset = offset;
        self
    }

    pub fn first_stage_scaling(mut self, scaling: FirstStageScaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Paramset grant. Defaults to exactly what the antenna count needs, from 0.
    pub fn param_sets(mut self, start: u32, count: u8) -> Self {
        self.param_sets = Some((start, count));
        self
    }

    /// Explicit input, output and hot-signature channel pairs.
    pub fn channels(
        mut self,
        input: EdmaPingPong,
        output: EdmaPingPong,
        hot_signature: EdmaPingPong,
    ) -> Self {
        self.channels = Some([input, output, hot_signature]);
        self
    }

    /// Assign six consecutive channels starting at `first` (the default is 0).
    pub fn sequential_channels(mut self, first: u8) -> Self {
        self.channels = None;
        self.first_channel = first;
        self
    }

    pub fn cube_format(mut self, format: RadarCubeFormat) -> Self {
        self.cube_format = format;
        self
    }

    pub fn matrix_format(mut self, format: DetMatrixFormat) -> Self {
        self.matrix_format = format;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<DopplerConfig<M>, BuilderError> {
        let (tx, rx) = self.antennas.ok_or(BuilderError::MissingField("antennas"))?;
        let range = self
            .range_bins
            .ok_or(BuilderError::MissingField("range_bins"))?;
        let (chirps, bins) = self.doppler.ok_or(BuilderError::MissingField("doppler"))?;
        let (window, window_symmetric) =
            self.window.ok_or(BuilderError::MissingField("window"))?;

        let virt = tx
            .checked_mul(rx)
            .ok_or(BuilderError::OutOfRange("tx * rx"))?;
        let (param_set_start_idx, num_param_sets) = match self.param_sets {
            Some(grant) => grant,
            None => {
                let n = u8::try_from(required_param_sets(usize::from(tx)))
                    .map_err(|_| BuilderError::OutOfRange("paramset count"))?;
                (0, n)
            }
        };
        let [input, output, hot_signature] = match self.channels {
            Some(c) => c,
            None => sequential(self.first_channel)?,
        };

        let static_cfg = StaticConfig {
            num_tx_antennas: tx,
            num_rx_antennas: rx,
            num_virtual_antennas: virt,
            num_range_bins: range,
            num_doppler_chirps: chirps,
            num_doppler_bins: bins,
            log2_num_doppler_bins: bins.trailing_zeros() as u8,
        };
        let cube_bytes = usize::from(tx)
            * usize::from(rx)
            * usize::from(range)
            * usize::from(chirps)
            * SAMPLE_BYTES;
        let matrix_bytes = usize::from(range) * usize::from(bins) * CELL_BYTES;

        Ok(DopplerConfig {
            hw_res: HwResources {
                edma: EdmaCfg {
                    handle: self.handle,
                    input,
                    output,
                    hot_signature,
                },
                hwa: HwaCfg {
                    window_symmetric,
                    window,
                    win_ram_offset: self.win_ram_offset,
                    first_stage_scaling: self.scaling,
                    num_param_sets,
                    param_set_start_idx,
                },
                radar_cube: RadarCubeDesc {
                    format: self.cube_format,
                    data_size: cube_bytes,
                },
                det_matrix: DetMatrixDesc {
                    format: self.matrix_format,
                    data_size: matrix_bytes,
                },
            },
            static_cfg,
        })
    }
}

fn sequential(first: u8) -> Result<[EdmaPingPong; 3], BuilderError> {
    let ch = |i: u8| -> Result<EdmaChannelCfg, BuilderError> {
        let channel = first
            .checked_add(i)
            .ok_or(BuilderError::OutOfRange("channel"))?;
        Ok(EdmaChannelCfg {
            channel,
            shadow_param_id: 64 + u16::from(channel),
            event_queue: 0,
        })
    };
    Ok([
        EdmaPingPong {
            ping: ch(0)?,
            pong: ch(1)?,
        },
        EdmaPingPong {
            ping: ch(2)?,
            pong: ch(3)?,
        },
        EdmaPingPong {
            ping: ch(4)?,
            pong: ch(5)?,
        },
    ])
}
