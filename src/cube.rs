//! Radar cube and detection matrix buffers.
//!
//! Both buffers are owned by the caller. The unit only ever sees them for the
//! duration of one `process` call: the cube by shared reference, the matrix by
//! exclusive reference.

use serde::{Deserialize, Serialize};

/// Bytes per complex sample in the radar cube.
pub const SAMPLE_BYTES: usize = 4;

/// Bytes per detection matrix cell.
pub const CELL_BYTES: usize = 2;

/// Complex 16-bit sample, imaginary part first in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct Cmplx16ImRe {
    pub imag: i16,
    pub real: i16,
}

impl Cmplx16ImRe {
    pub const fn new(real: i16, imag: i16) -> Self {
        Self { imag, real }
    }

    pub fn to_le_bytes(self) -> [u8; SAMPLE_BYTES] {
        let im = self.imag.to_le_bytes();
        let re = self.real.to_le_bytes();
        [im[0], im[1], re[0], re[1]]
    }

    pub fn from_le_bytes(bytes: [u8; SAMPLE_BYTES]) -> Self {
        Self {
            imag: i16::from_le_bytes([bytes[0], bytes[1]]),
            real: i16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// Memory layouts a radar cube may be stored in.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadarCubeFormat {
    /// x[tx][range][chirp][rx]
    TxRangeChirpRx,
    /// x[range][chirp][tx][rx]
    RangeChirpTxRx,
    /// x[range][virtual antenna][chirp]
    RangeVirtAntChirp,
}

/// Memory layouts a detection matrix may be stored in.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetMatrixFormat {
    /// x[range][doppler]
    RangeMajor,
    /// x[doppler][range]
    DopplerMajor,
}

/// Dimensions of a radar cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeDims {
    pub num_tx_antennas: usize,
    pub num_rx_antennas: usize,
    pub num_range_bins: usize,
    pub num_doppler_chirps: usize,
}

impl CubeDims {
    pub fn num_samples(&self) -> usize {
        self.num_tx_antennas * self.num_rx_antennas * self.num_range_bins * self.num_doppler_chirps
    }
}

/// Position of one sample in the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleIndex {
    pub tx: usize,
    pub rx: usize,
    pub range: usize,
    pub chirp: usize,
}

/// What the unit is told about the cube at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RadarCubeDesc {
    pub format: RadarCubeFormat,
    /// Buffer size in bytes.
    pub data_size: usize,
}

/// What the unit is told about the detection matrix at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetMatrixDesc {
    pub format: DetMatrixFormat,
    /// Buffer size in bytes.
    pub data_size: usize,
}

/// 3-D buffer of complex range-FFT samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadarCube {
    format: RadarCubeFormat,
    dims: CubeDims,
    data: Vec<Cmplx16ImRe>,
}

impl RadarCube {
    pub fn zeroed(format: RadarCubeFormat, dims: CubeDims) -> Self {
        Self {
            format,
            dims,
            data: vec![Cmplx16ImRe::default(); dims.num_samples()],
        }
    }

    /// Build a cube by evaluating `f` at every sample position.
    pub fn from_fn(
        format: RadarCubeFormat,
        dims: CubeDims,
        mut f: impl FnMut(SampleIndex) -> Cmplx16ImRe,
    ) -> Self {
        let mut cube = Self::zeroed(format, dims);
        for tx in 0..dims.num_tx_antennas {
            for range in 0..dims.num_range_bins {
                for chirp in 0..dims.num_doppler_chirps {
                    for rx in 0..dims.num_rx_antennas {
                        let idx = SampleIndex {
                            tx,
                            rx,
                            range,
                            chirp,
                        };
                        let pos = cube.position(idx);
                        cube.data[pos] = f(idx);
                    }
                }
            }
        }
        cube
    }

    pub fn format(&self) -> RadarCubeFormat {
        self.format
    }

    pub fn dims(&self) -> CubeDims {
        self.dims
    }

    pub fn desc(&self) -> RadarCubeDesc {
        RadarCubeDesc {
            format: self.format,
            data_size: self.data.len() * SAMPLE_BYTES,
        }
    }

    pub fn samples(&self) -> &[Cmplx16ImRe] {
        &self.data
    }

    pub fn sample(&self, idx: SampleIndex) -> Cmplx16ImRe {
        self.data[self.position(idx)]
    }

    /// Linear sample position of `idx` under this cube's layout.
    pub fn position(&self, idx: SampleIndex) -> usize {
        let d = &self.dims;
        match self.format {
            RadarCubeFormat::TxRangeChirpRx => {
                ((idx.tx * d.num_range_bins + idx.range) * d.num_doppler_chirps + idx.chirp)
                    * d.num_rx_antennas
                    + idx.rx
            }
            RadarCubeFormat::RangeChirpTxRx => {
                ((idx.range * d.num_doppler_chirps + idx.chirp) * d.num_tx_antennas + idx.tx)
                    * d.num_rx_antennas
                    + idx.rx
            }
            RadarCubeFormat::RangeVirtAntChirp => {
                let virt = idx.tx * d.num_rx_antennas + idx.rx;
                (idx.range * d.num_tx_antennas * d.num_rx_antennas + virt) * d.num_doppler_chirps
                    + idx.chirp
            }
        }
    }
}

/// 2-D buffer of accumulated Doppler magnitudes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionMatrix {
    format: DetMatrixFormat,
    num_range_bins: usize,
    num_doppler_bins: usize,
    data: Vec<u16>,
}

impl DetectionMatrix {
    pub fn zeroed(format: DetMatrixFormat, num_range_bins: usize, num_doppler_bins: usize) -> Self {
        Self {
            format,
            num_range_bins,
            num_doppler_bins,
            data: vec![0; num_range_bins * num_doppler_bins],
        }
    }

    pub fn format(&self) -> DetMatrixFormat {
        self.format
    }

    pub fn num_range_bins(&self) -> usize {
        self.num_range_bins
    }

    pub fn num_doppler_bins(&self) -> usize {
        self.num_doppler_bins
    }

    pub fn desc(&self) -> DetMatrixDesc {
        DetMatrixDesc {
            format: self.format,
            data_size: self.data.len() * CELL_BYTES,
        }
    }

    pub fn cells(&self) -> &[u16] {
        &self.data
    }

    pub fn cells_mut(&mut self) -> &mut [u16] {
        &mut self.data
    }

    pub fn get(&self, range: usize, doppler: usize) -> u16 {
        match self.format {
            DetMatrixFormat::RangeMajor => self.data[range * self.num_doppler_bins + doppler],
            DetMatrixFormat::DopplerMajor => self.data[doppler * self.num_range_bins + range],
        }
    }

    /// One range bin's Doppler spectrum; only contiguous for `RangeMajor`.
    pub fn row(&self, range: usize) -> Option<&[u16]> {
        match self.format {
            DetMatrixFormat::RangeMajor => {
                let start = range * self.num_doppler_bins;
                self.data.get(start..start + self.num_doppler_bins)
            }
            DetMatrixFormat::DopplerMajor => None,
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}
