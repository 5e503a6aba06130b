//! Doppler processing unit for FMCW radar.
//!
//! Turns a radar cube of range-FFT samples into a detection matrix: for every
//! range bin, each virtual antenna's chirp sequence is windowed, Doppler-FFT'd
//! and reduced to magnitudes, and the magnitudes are summed across antennas.
//! The work is expressed as accelerator paramsets and mover transfer chains,
//! compiled once per configuration and replayed per frame with ping/pong
//! double buffering.
//!
//! ```ignore
//! let (hwa, edma) = dopplerproc::sim::default_platform();
//! let mut unit = DopplerProc::init(InitParams::new(hwa))?;
//! unit.config(DopplerConfigBuilder::new(edma)
//!     .antennas(2, 4)
//!     .range_bins(64)
//!     .doppler(16, 16)
//!     .window(window::generate(WindowShape::Hann, 16, true), true)
//!     .build()?)?;
//! let out = unit.process(&cube, &mut matrix)?;
//! ```

pub mod builder;
pub mod config;
pub mod cube;
pub mod error;
pub mod fixed;
#[doc(hidden)]
pub mod harness;
pub mod hw;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod invariant_rt;
pub mod plan;
pub mod rt;
pub mod signal;
pub mod sim;
pub mod states;
pub mod unit;
pub mod validate;
pub mod window;

pub use builder::{BuilderError, DopplerConfigBuilder};
pub use config::{
    DopplerConfig, EdmaCfg, EdmaChannelCfg, EdmaPingPong, FirstStageScaling, HwResources,
    HwaCfg, InitParams, StaticConfig,
};
pub use cube::{
    Cmplx16ImRe, CubeDims, DetMatrixDesc, DetMatrixFormat, DetectionMatrix, RadarCube,
    RadarCubeDesc, RadarCubeFormat,
};
pub use error::{DopplerError, DopplerResult, HwError};
pub use hw::{Accelerator, Mover};
pub use states::UnitState;
pub use unit::{DopplerProc, DopplerStats, OutParams};
pub use window::WindowShape;
