//! Error types for the Doppler processing unit and its hardware capabilities.

use crate::hw::{ChannelId, CompletionToken};
use thiserror::Error;

/// Base of the numeric error codes reported by [`DopplerError::code`].
pub const DOPPLER_PROC_ERRNO_BASE: i32 = -3000;

/// Result type for unit operations.
pub type DopplerResult<T> = Result<T, DopplerError>;

/// Result type for accelerator and mover operations.
pub type HwResult<T> = Result<T, HwError>;

/// Errors reported by the Doppler processing unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DopplerError {
    /// An argument is out of range or inconsistent, or the handle was released.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A buffer could not be allocated.
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// The handle is mid-frame (or a frame failed and the handle awaits deinit).
    #[error("processing already in progress")]
    InProgress,

    /// Not enough accelerator paramsets, window RAM or memory banks.
    #[error("insufficient accelerator resources: {0}")]
    InsufficientHwaResources(&'static str),

    /// The completion primitive could not be created.
    #[error("completion signal could not be created")]
    SemaphoreCreation,

    /// The completion wait returned something other than the awaited token.
    #[error("unexpected completion: expected {expected:?}, got {got:?}")]
    UnexpectedCompletion {
        expected: CompletionToken,
        got: CompletionToken,
    },

    /// A per-antenna row does not fit in one accelerator memory bank.
    #[error("configuration needs {required} bytes but a memory bank holds {available}")]
    ExceedsHwaMemory { required: usize, available: usize },

    /// The radar cube layout is not supported by this unit.
    #[error("unsupported radar cube format")]
    UnsupportedCubeFormat,

    /// The detection matrix layout is not supported by this unit.
    #[error("unsupported detection matrix format")]
    UnsupportedMatrixFormat,

    /// The detection matrix buffer is too small for the configuration.
    #[error("detection matrix holds {available} bytes, {required} required")]
    InsufficientMatrixSize { required: usize, available: usize },

    /// The window table length does not match the chirp count and symmetry.
    #[error("window is {actual} bytes, expected {expected}")]
    BadWindowSize { expected: usize, actual: usize },

    /// `process` was called before a successful `config`.
    #[error("unit not configured")]
    NotConfigured,

    /// A bounded completion wait expired.
    #[error("timed out waiting for completion {0:?}")]
    Timeout(CompletionToken),

    /// The accelerator or mover reported a fault.
    #[error("hardware fault: {0}")]
    Hardware(#[from] HwError),
}

impl DopplerError {
    /// Stable numeric code, offset from [`DOPPLER_PROC_ERRNO_BASE`].
    pub fn code(&self) -> i32 {
        let offset = match self {
            DopplerError::InvalidArgument(_) => 1,
            DopplerError::OutOfMemory { .. } => 2,
            DopplerError::InProgress => 3,
            DopplerError::InsufficientHwaResources(_) => 4,
            DopplerError::SemaphoreCreation => 5,
            DopplerError::UnexpectedCompletion { .. } => 6,
            DopplerError::ExceedsHwaMemory { .. } => 7,
            DopplerError::UnsupportedCubeFormat => 8,
            DopplerError::UnsupportedMatrixFormat => 9,
            DopplerError::InsufficientMatrixSize { .. } => 10,
            DopplerError::BadWindowSize { .. } => 11,
            DopplerError::NotConfigured => 12,
            DopplerError::Timeout(_) => 13,
            DopplerError::Hardware(_) => 14,
        };
        DOPPLER_PROC_ERRNO_BASE - offset
    }

    /// Fatal errors leave the handle unusable until it is deinitialized.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DopplerError::SemaphoreCreation
                | DopplerError::UnexpectedCompletion { .. }
                | DopplerError::Timeout(_)
                | DopplerError::Hardware(_)
        )
    }
}

/// Faults raised by an accelerator or mover backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HwError {
    /// Paramset index beyond the accelerator's table.
    #[error("paramset {0} out of range")]
    ParamSetOutOfRange(usize),

    /// A paramset in a started chain was never programmed.
    #[error("paramset {0} not configured")]
    ParamSetUnconfigured(usize),

    /// Window coefficients do not fit the window RAM.
    #[error("window RAM overflow: offset {offset} + {len} coefficients")]
    WindowRamOverflow { offset: usize, len: usize },

    /// FFT size exceeds what the accelerator supports.
    #[error("FFT size 2^{0} not supported")]
    FftSizeUnsupported(u8),

    /// An access fell outside the addressed memory region.
    #[error("address out of range: offset {offset} len {len}")]
    AddressOutOfRange { offset: i64, len: usize },

    /// An access was not aligned to the region's element size.
    #[error("misaligned access at offset {0}")]
    Misaligned(u32),

    /// Channel id beyond the mover's channel count.
    #[error("channel {0:?} out of range")]
    ChannelOutOfRange(ChannelId),

    /// A started channel has no chain loaded.
    #[error("channel {0:?} not configured")]
    ChannelNotConfigured(ChannelId),

    /// A chain was started more times than its frame count.
    #[error("channel {0:?} exhausted its frames")]
    ChainExhausted(ChannelId),

    /// A chain has more links than the mover supports.
    #[error("too many links for channel {0:?}")]
    TooManyLinks(ChannelId),

    /// A triggered job or transfer ran without its trigger being raised.
    #[error("trigger on channel {0:?} was never raised")]
    TriggerNotRaised(ChannelId),

    /// A chained channel was started directly, or a chain loops.
    #[error("channel {0:?} chained incorrectly")]
    BadChain(ChannelId),

    /// The completion queue is full or closed.
    #[error("completion {0:?} could not be posted")]
    CompletionLost(CompletionToken),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_header_order() {
        assert_eq!(
            DopplerError::InvalidArgument("x").code(),
            DOPPLER_PROC_ERRNO_BASE - 1
        );
        assert_eq!(
            DopplerError::BadWindowSize {
                expected: 32,
                actual: 64
            }
            .code(),
            DOPPLER_PROC_ERRNO_BASE - 11
        );
        assert_eq!(
            DopplerError::ExceedsHwaMemory {
                required: 1,
                available: 0
            }
            .code(),
            DOPPLER_PROC_ERRNO_BASE - 7
        );
    }

    #[test]
    fn config_errors_are_not_fatal() {
        assert!(!DopplerError::UnsupportedCubeFormat.is_fatal());
        assert!(!DopplerError::InsufficientHwaResources("paramsets").is_fatal());
        assert!(DopplerError::Timeout(CompletionToken(0)).is_fatal());
        assert!(DopplerError::from(HwError::ChainExhausted(ChannelId(3))).is_fatal());
    }

    #[test]
    fn display_mentions_sizes() {
        let err = DopplerError::InsufficientMatrixSize {
            required: 512,
            available: 256,
        };
        assert_eq!(err.to_string(), "detection matrix holds 256 bytes, 512 required");
    }
}
