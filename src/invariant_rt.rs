//! RT-safe invariant signaling for the per-frame processing path.
//!
//! This module provides a two-tier invariant system:
//! - **Tier 1 (RT-safe)**: Lock-free signaling of invariant IDs from the orchestrator
//! - **Tier 2 (Non-RT)**: Verification and contract testing on the caller side
//!
//! RT code **signals facts**. Non-RT code **judges correctness**.
//!
//! Unlike [`crate::invariant_ppt`], nothing here allocates or locks in the
//! signaling path, and a full queue drops the signal instead of blocking.
//!
//! # Example
//!
//! ```ignore
//! // orchestrator: a half's completion arrived with the expected token
//! signal_invariant(&mut invariant_tx, INV_COMPLETION_MATCHED);
//!
//! // caller side
//! let signals = drain_invariant_signals(&mut invariant_rx);
//! assert!(signals.contains(&INV_COMPLETION_MATCHED));
//! ```

use rtrb::{Consumer, Producer, RingBuffer};

// ============================================================================
// RT-Safe Invariant IDs (Tier 1)
// ============================================================================

/// A range bin was staged into a half's input bank.
pub const INV_INPUT_STAGED: u8 = 1;

/// The accelerator chain of a half ran to completion.
pub const INV_COMPUTE_ISSUED: u8 = 2;

/// A half's accumulated row was moved into the detection matrix.
pub const INV_OUTPUT_ISSUED: u8 = 3;

/// A completion arrived carrying the awaited half's token.
pub const INV_COMPLETION_MATCHED: u8 = 4;

/// A half's banks were refilled only after its previous completion was awaited.
pub const INV_SCRATCH_REUSE_ORDERED: u8 = 5;

/// Every range bin of the frame reached the detection matrix.
pub const INV_FRAME_COMPLETE: u8 = 6;

// ============================================================================
// Invariant Signal Queue
// ============================================================================

/// Capacity for invariant signal queue.
/// The orchestrator signals each ID at most once per frame, so the queue
/// holds dozens of frames between drains regardless of frame length.
pub const INVARIANT_QUEUE_CAPACITY: usize = 256;

/// Creates a new invariant signal queue pair.
///
/// Returns (producer for the orchestrator, consumer for the caller).
pub fn new_invariant_queue() -> (Producer<u8>, Consumer<u8>) {
    RingBuffer::new(INVARIANT_QUEUE_CAPACITY)
}

/// Signals an invariant was checked in the RT path.
///
/// # RT Safety
/// - No allocation
/// - No locking
/// - No panics
/// - If queue is full, signal is dropped (preferable to blocking)
#[inline]
pub fn signal_invariant(tx: &mut Producer<u8>, id: u8) {
    let _ = tx.push(id);
}

// ============================================================================
// Non-RT Verification (Tier 2)
// ============================================================================

/// Drains all pending invariant signals from the queue.
pub fn drain_invariant_signals(rx: &mut Consumer<u8>) -> Vec<u8> {
    let mut signals = Vec::with_capacity(INVARIANT_QUEUE_CAPACITY);
    while let Ok(id) = rx.pop() {
        signals.push(id);
    }
    signals
}

/// Counts occurrences of each invariant ID in a signal list.
pub fn count_invariant_signals(signals: &[u8]) -> [usize; 256] {
    let mut counts = [0usize; 256];
    for &id in signals {
        counts[id as usize] += 1;
    }
    counts
}

/// Contract verification: asserts that required invariants were signaled.
///
/// # Panics
/// Panics if any required invariant was not signaled at least once.
#[cfg(any(test, feature = "ppt"))]
pub fn contract_test_rt(contract_name: &str, signals: &[u8], required: &[u8]) {
    let counts = count_invariant_signals(signals);
    let missing: Vec<&str> = required
        .iter()
        .filter(|&&id| counts[id as usize] == 0)
        .map(|&id| invariant_name(id))
        .collect();

    if !missing.is_empty() {
        let present: Vec<&str> = signals
            .iter()
            .map(|&id| invariant_name(id))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        panic!(
            "RT Contract '{}' missing invariants: {:?}. Present: {:?}",
            contract_name, missing, present
        );
    }
}

/// Maps invariant ID to human-readable name (for diagnostics only).
pub const fn invariant_name(id: u8) -> &'static str {
    match id {
        INV_INPUT_STAGED => "INPUT_STAGED",
        INV_COMPUTE_ISSUED => "COMPUTE_ISSUED",
        INV_OUTPUT_ISSUED => "OUTPUT_ISSUED",
        INV_COMPLETION_MATCHED => "COMPLETION_MATCHED",
        INV_SCRATCH_REUSE_ORDERED => "SCRATCH_REUSE_ORDERED",
        INV_FRAME_COMPLETE => "FRAME_COMPLETE",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_queue_roundtrip() {
        let (mut tx, mut rx) = new_invariant_queue();

        signal_invariant(&mut tx, INV_INPUT_STAGED);
        signal_invariant(&mut tx, INV_COMPUTE_ISSUED);
        signal_invariant(&mut tx, INV_INPUT_STAGED);

        let signals = drain_invariant_signals(&mut rx);
        assert_eq!(
            signals,
            vec![INV_INPUT_STAGED, INV_COMPUTE_ISSUED, INV_INPUT_STAGED]
        );
    }

    #[test]
    #[should_panic(expected = "missing invariants")]
    fn test_contract_fails_when_invariants_missing() {
        contract_test_rt(
            "incomplete frame",
            &[INV_INPUT_STAGED],
            &[INV_INPUT_STAGED, INV_FRAME_COMPLETE],
        );
    }

    #[test]
    fn test_queue_handles_overflow_gracefully() {
        let (mut tx, mut rx) = new_invariant_queue();
        for _ in 0..INVARIANT_QUEUE_CAPACITY + 100 {
            signal_invariant(&mut tx, INV_COMPLETION_MATCHED);
        }
        assert_eq!(
            drain_invariant_signals(&mut rx).len(),
            INVARIANT_QUEUE_CAPACITY
        );
    }

    #[test]
    fn test_invariant_names() {
        assert_eq!(invariant_name(INV_SCRATCH_REUSE_ORDERED), "SCRATCH_REUSE_ORDERED");
        assert_eq!(invariant_name(255), "UNKNOWN");
    }
}
