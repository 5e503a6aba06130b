//! Simulated rig: a configured unit on the software accelerator and mover,
//! with its own cube and matrix. Used by tests and benches.

use crate::builder::DopplerConfigBuilder;
use crate::config::InitParams;
use crate::cube::{
    Cmplx16ImRe, CubeDims, DetMatrixFormat, DetectionMatrix, RadarCube, RadarCubeFormat,
    SampleIndex,
};
use crate::error::{DopplerError, DopplerResult};
use crate::invariant_rt::drain_invariant_signals;
use crate::sim::{self, SimulatedEdma, SimulatedHwa};
use crate::unit::{DopplerProc, OutParams};
use crate::window::{self, WindowShape};
use rtrb::Consumer;
use std::time::Duration;

/// Completion wait bound used by the rig; the simulation never needs to block.
pub const RIG_TIMEOUT: Duration = Duration::from_secs(1);

pub type SimUnit = DopplerProc<SimulatedHwa, SimulatedEdma>;

/// A configured unit plus its input and output buffers.
pub struct SimRig {
    pub unit: SimUnit,
    pub cube: RadarCube,
    pub matrix: DetectionMatrix,
    pub invariants: Consumer<u8>,
}

impl SimRig {
    /// Rig with a symmetric Hann window.
    pub fn new(tx: u8, rx: u8, range: u16, chirps: u16, bins: u16) -> DopplerResult<Self> {
        Self::with_builder(|b| {
            b.antennas(tx, rx)
                .range_bins(range)
                .doppler(chirps, bins)
                .window(window::generate(WindowShape::Hann, chirps as usize, true), true)
        })
    }

    /// Rig whose configuration is finished by `f`.
    pub fn with_builder(
        f: impl FnOnce(DopplerConfigBuilder<SimulatedEdma>) -> DopplerConfigBuilder<SimulatedEdma>,
    ) -> DopplerResult<Self> {
        let (hwa, edma) = sim::default_platform();
        let cfg = f(DopplerConfigBuilder::new(edma))
            .build()
            .map_err(|_| DopplerError::InvalidArgument("incomplete rig configuration"))?;
        let s = cfg.static_cfg;
        let (mut unit, invariants) =
            DopplerProc::init_with_invariants(InitParams::new(hwa).with_timeout(RIG_TIMEOUT))?;
        unit.config(cfg)?;

        let dims = CubeDims {
            num_tx_antennas: usize::from(s.num_tx_antennas),
            num_rx_antennas: usize::from(s.num_rx_antennas),
            num_range_bins: usize::from(s.num_range_bins),
            num_doppler_chirps: usize::from(s.num_doppler_chirps),
        };
        Ok(Self {
            unit,
            cube: RadarCube::zeroed(RadarCubeFormat::TxRangeChirpRx, dims),
            matrix: DetectionMatrix::zeroed(
                DetMatrixFormat::RangeMajor,
                usize::from(s.num_range_bins),
                usize::from(s.num_doppler_bins),
            ),
            invariants,
        })
    }

    /// Replace the cube contents sample by sample.
    pub fn fill_cube(&mut self, f: impl FnMut(SampleIndex) -> Cmplx16ImRe) {
        self.cube = RadarCube::from_fn(self.cube.format(), self.cube.dims(), f);
    }

    pub fn process(&mut self) -> DopplerResult<OutParams> {
        self.unit.process(&self.cube, &mut self.matrix)
    }

    /// Invariant IDs signalled since the last call.
    pub fn signals(&mut self) -> Vec<u8> {
        drain_invariant_signals(&mut self.invariants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_basic() {
        let mut rig = SimRig::new(1, 1, 2, 4, 4).unwrap();
        let out = rig.process().unwrap();
        assert_eq!(out.stats.range_bins_processed, 2);
        assert!(rig.matrix.cells().iter().all(|&c| c == 0));
    }
}
