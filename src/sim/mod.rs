//! Software-simulated accelerator and mover.
//!
//! The two engines share a [`TriggerFabric`]: the mover raises DMA triggers
//! the accelerator's `Dma`-triggered paramsets consume, and the accelerator
//! raises the triggers of accelerator-triggered transfer chains. A job or
//! transfer whose trigger was never raised fails instead of hanging, which is
//! what a misbuilt descriptor chain would do on silicon.

mod edma;
mod hwa;

pub use edma::{EdmaStats, SimulatedEdma};
pub use hwa::{HwaStats, SimulatedHwa};

use crate::hw::{ChannelId, HwaCapacity, MoverCapacity};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Accelerator limits of the reference device.
pub const DEFAULT_HWA_CAPACITY: HwaCapacity = HwaCapacity {
    num_param_sets: 16,
    num_mem_banks: 4,
    mem_bank_bytes: 16 * 1024,
    window_ram_len: 2048,
    max_fft_size_log2: 10,
};

/// Mover limits of the reference device.
pub const DEFAULT_MOVER_CAPACITY: MoverCapacity = MoverCapacity { num_channels: 64 };

/// Pending-trigger counters between the two engines.
#[derive(Debug)]
pub struct TriggerFabric {
    to_hwa: Vec<AtomicU32>,
    to_mover: Vec<AtomicU32>,
}

impl TriggerFabric {
    pub fn new(num_channels: u8) -> Self {
        let lines = || (0..num_channels).map(|_| AtomicU32::new(0)).collect();
        Self {
            to_hwa: lines(),
            to_mover: lines(),
        }
    }

    /// Mover finished a link of `channel`.
    pub fn raise_dma(&self, channel: ChannelId) {
        if let Some(line) = self.to_hwa.get(channel.0 as usize) {
            line.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Accelerator finished a job that triggers `channel`.
    pub fn raise_accel(&self, channel: ChannelId) {
        if let Some(line) = self.to_mover.get(channel.0 as usize) {
            line.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn take_dma(&self, channel: ChannelId) -> bool {
        self.to_hwa
            .get(channel.0 as usize)
            .is_some_and(take_one)
    }

    pub fn take_accel(&self, channel: ChannelId) -> bool {
        self.to_mover
            .get(channel.0 as usize)
            .is_some_and(take_one)
    }

    /// Outstanding DMA triggers on `channel`.
    pub fn pending_dma(&self, channel: ChannelId) -> u32 {
        self.to_hwa
            .get(channel.0 as usize)
            .map_or(0, |l| l.load(Ordering::Acquire))
    }

    pub fn clear(&self) {
        for line in self.to_hwa.iter().chain(&self.to_mover) {
            line.store(0, Ordering::Release);
        }
    }
}

fn take_one(line: &AtomicU32) -> bool {
    line.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1))
        .is_ok()
}

/// A simulated accelerator and mover wired to the same trigger fabric.
pub fn platform(hwa: HwaCapacity, mover: MoverCapacity) -> (SimulatedHwa, SimulatedEdma) {
    let fabric = Arc::new(TriggerFabric::new(mover.num_channels));
    (
        SimulatedHwa::new(hwa, Arc::clone(&fabric)),
        SimulatedEdma::new(mover, fabric),
    )
}

/// [`platform`] with the reference device limits.
pub fn default_platform() -> (SimulatedHwa, SimulatedEdma) {
    platform(DEFAULT_HWA_CAPACITY, DEFAULT_MOVER_CAPACITY)
}
