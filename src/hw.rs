//! Capability interfaces for the accelerator and the mover, and the
//! descriptors both engines consume.
//!
//! Register layouts are deliberately absent: a backend turns a [`ParamSet`]
//! or [`TransferChain`] into whatever its hardware needs. The simulated
//! backends in [`crate::sim`] execute them in software.

use crate::cube::{Cmplx16ImRe, DetectionMatrix, RadarCube, CELL_BYTES, SAMPLE_BYTES};
use crate::error::{HwError, HwResult};
use crossbeam_channel::Sender;

/// Largest number of links in one transfer chain (one per TX antenna).
pub const MAX_CHAIN_LINKS: usize = 3;

/// Mover channel number. Also names the DMA trigger line between engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u8);

/// Identifies which completion-bearing chain raised a completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionToken(pub u8);

/// Static limits of an accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwaCapacity {
    /// Total paramset slots.
    pub num_param_sets: usize,
    pub num_mem_banks: usize,
    pub mem_bank_bytes: usize,
    /// Window RAM size in coefficients.
    pub window_ram_len: usize,
    pub max_fft_size_log2: u8,
}

/// Static limits of a mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoverCapacity {
    pub num_channels: u8,
}

/// What starts a paramset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwaTrigger {
    /// Runs as soon as the previous paramset in the chain finished.
    Immediate,
    /// Waits for the mover to raise the trigger of this channel.
    Dma(ChannelId),
}

/// Window stage of an FFT job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowRef {
    /// Offset into window RAM, in coefficients.
    pub ram_offset: u32,
    /// Only the first half (rounded up) is stored; the rest is mirrored.
    pub symmetric: bool,
}

/// Operation performed by a paramset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobOp {
    /// Window each complex vector, FFT it and store the magnitude as u16.
    FftMagnitude {
        window: Option<WindowRef>,
        fft_size_log2: u8,
        /// Bit k enables divide-by-two after radix-2 stage k (stage 0 first).
        butterfly_scaling: u16,
    },
    /// Sum `bcnt` u16 rows element-wise into one row, saturating.
    Accumulate,
}

/// Strided addressing in scratch memory.
///
/// `acnt` elements spaced `aidx` bytes apart form one vector; `bcnt` vectors
/// are spaced `bidx` bytes apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strided {
    pub addr: u32,
    pub acnt: u16,
    pub aidx: u16,
    pub bcnt: u16,
    pub bidx: u16,
}

/// One accelerator job descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamSet {
    pub trigger: HwaTrigger,
    pub op: JobOp,
    pub src: Strided,
    pub dst: Strided,
    /// Mover channel whose accelerator trigger is raised when this job ends.
    pub dma_trigger_out: Option<ChannelId>,
}

/// Memory regions reachable by the mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemRegion {
    RadarCube,
    Scratch,
    DetMatrix,
}

/// Byte address within a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Addr {
    pub region: MemRegion,
    pub offset: u32,
}

impl Addr {
    pub const fn new(region: MemRegion, offset: u32) -> Self {
        Self { region, offset }
    }
}

/// One 3-D transfer: `ccnt` frames of `bcnt` rows of `acnt` bytes.
///
/// Every `start` of the owning channel moves one frame; frame `c` row `b`
/// begins at `src + c*src_cidx + b*src_bidx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferParams {
    pub src: Addr,
    pub dst: Addr,
    pub acnt: u16,
    pub bcnt: u16,
    pub ccnt: u16,
    pub src_bidx: i32,
    pub dst_bidx: i32,
    pub src_cidx: i32,
    pub dst_cidx: i32,
}

/// What starts a transfer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferTrigger {
    /// Started by the host.
    Software,
    /// Fires when the accelerator raises this channel's trigger.
    Accelerator,
    /// Fires when the channel chaining to it completes.
    Chained,
}

/// A mover chain bound to one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferChain {
    pub channel: ChannelId,
    pub trigger: TransferTrigger,
    pub links: heapless::Vec<TransferParams, MAX_CHAIN_LINKS>,
    /// Raise the accelerator DMA trigger for `channel` after every link.
    pub trigger_accel: bool,
    pub chain_to: Option<ChannelId>,
    pub completion: Option<CompletionToken>,
    /// Parameter RAM slot reloaded into the channel between frames.
    pub shadow_param_id: u16,
    pub event_queue: u8,
}

/// Accelerator capability.
pub trait Accelerator {
    fn capacity(&self) -> HwaCapacity;

    /// Soft reset: drop pending triggers, keep programmed paramsets.
    fn reset(&mut self);

    fn load_window(&mut self, ram_offset: usize, coeffs: &[i32]) -> HwResult<()>;

    fn configure(&mut self, index: usize, param_set: &ParamSet) -> HwResult<()>;

    /// Execute paramsets `first..first + count` in order against `scratch`.
    fn run(&mut self, first: usize, count: usize, scratch: &mut ScratchMemory) -> HwResult<()>;
}

/// Mover capability.
pub trait Mover {
    fn capacity(&self) -> MoverCapacity;

    /// Load `chain` into its channel and rewind it to frame 0.
    fn configure(&mut self, chain: &TransferChain) -> HwResult<()>;

    /// Move the next frame of `channel`, then of every channel it chains to.
    fn start(&mut self, channel: ChannelId, mem: &mut MemoryView<'_>) -> HwResult<()>;
}

impl<T: Accelerator + ?Sized> Accelerator for &mut T {
    fn capacity(&self) -> HwaCapacity {
        (**self).capacity()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn load_window(&mut self, ram_offset: usize, coeffs: &[i32]) -> HwResult<()> {
        (**self).load_window(ram_offset, coeffs)
    }

    fn configure(&mut self, index: usize, param_set: &ParamSet) -> HwResult<()> {
        (**self).configure(index, param_set)
    }

    fn run(&mut self, first: usize, count: usize, scratch: &mut ScratchMemory) -> HwResult<()> {
        (**self).run(first, count, scratch)
    }
}

impl<T: Mover + ?Sized> Mover for &mut T {
    fn capacity(&self) -> MoverCapacity {
        (**self).capacity()
    }

    fn configure(&mut self, chain: &TransferChain) -> HwResult<()> {
        (**self).configure(chain)
    }

    fn start(&mut self, channel: ChannelId, mem: &mut MemoryView<'_>) -> HwResult<()> {
        (**self).start(channel, mem)
    }
}

/// The accelerator's internal memory banks, owned by the processing unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchMemory {
    bank_bytes: usize,
    bytes: Vec<u8>,
}

impl ScratchMemory {
    /// Allocate zeroed banks; `None` if the allocation cannot be satisfied.
    pub fn try_new(num_banks: usize, bank_bytes: usize) -> Option<Self> {
        let len = num_banks.checked_mul(bank_bytes)?;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len).ok()?;
        bytes.resize(len, 0);
        Some(Self { bank_bytes, bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bank_bytes(&self) -> usize {
        self.bank_bytes
    }

    /// Byte address of the start of `bank`.
    pub fn bank_base(&self, bank: usize) -> u32 {
        (bank * self.bank_bytes) as u32
    }

    fn range(&self, offset: u32, len: usize) -> HwResult<std::ops::Range<usize>> {
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(HwError::AddressOutOfRange {
                offset: i64::from(offset),
                len,
            })?;
        Ok(start..end)
    }

    pub fn read(&self, offset: u32, out: &mut [u8]) -> HwResult<()> {
        let r = self.range(offset, out.len())?;
        out.copy_from_slice(&self.bytes[r]);
        Ok(())
    }

    pub fn write(&mut self, offset: u32, data: &[u8]) -> HwResult<()> {
        let r = self.range(offset, data.len())?;
        self.bytes[r].copy_from_slice(data);
        Ok(())
    }

    pub fn read_cmplx(&self, offset: u32) -> HwResult<Cmplx16ImRe> {
        let mut b = [0u8; SAMPLE_BYTES];
        self.read(offset, &mut b)?;
        Ok(Cmplx16ImRe::from_le_bytes(b))
    }

    pub fn read_u16(&self, offset: u32) -> HwResult<u16> {
        let mut b = [0u8; CELL_BYTES];
        self.read(offset, &mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    pub fn write_u16(&mut self, offset: u32, value: u16) -> HwResult<()> {
        self.write(offset, &value.to_le_bytes())
    }
}

/// Everything a mover may touch while a frame is in flight.
pub struct MemoryView<'a> {
    pub cube: &'a RadarCube,
    pub scratch: &'a mut ScratchMemory,
    pub matrix: &'a mut DetectionMatrix,
    pub completion: &'a Sender<CompletionToken>,
}

impl MemoryView<'_> {
    /// Fill `out` from `addr`.
    pub fn read(&self, addr: Addr, out: &mut [u8]) -> HwResult<()> {
        match addr.region {
            MemRegion::Scratch => self.scratch.read(addr.offset, out),
            MemRegion::RadarCube => {
                check_aligned(addr.offset, out.len(), SAMPLE_BYTES)?;
                let first = addr.offset as usize / SAMPLE_BYTES;
                let samples = self
                    .cube
                    .samples()
                    .get(first..first + out.len() / SAMPLE_BYTES)
                    .ok_or(HwError::AddressOutOfRange {
                        offset: i64::from(addr.offset),
                        len: out.len(),
                    })?;
                for (chunk, s) in out.chunks_exact_mut(SAMPLE_BYTES).zip(samples) {
                    chunk.copy_from_slice(&s.to_le_bytes());
                }
                Ok(())
            }
            MemRegion::DetMatrix => {
                check_aligned(addr.offset, out.len(), CELL_BYTES)?;
                let first = addr.offset as usize / CELL_BYTES;
                let cells = self
                    .matrix
                    .cells()
                    .get(first..first + out.len() / CELL_BYTES)
                    .ok_or(HwError::AddressOutOfRange {
                        offset: i64::from(addr.offset),
                        len: out.len(),
                    })?;
                for (chunk, c) in out.chunks_exact_mut(CELL_BYTES).zip(cells) {
                    chunk.copy_from_slice(&c.to_le_bytes());
                }
                Ok(())
            }
        }
    }

    /// Store `data` at `addr`. The radar cube is read-only.
    pub fn write(&mut self, addr: Addr, data: &[u8]) -> HwResult<()> {
        match addr.region {
            MemRegion::Scratch => self.scratch.write(addr.offset, data),
            MemRegion::RadarCube => Err(HwError::AddressOutOfRange {
                offset: i64::from(addr.offset),
                len: data.len(),
            }),
            MemRegion::DetMatrix => {
                check_aligned(addr.offset, data.len(), CELL_BYTES)?;
                let first = addr.offset as usize / CELL_BYTES;
                let cells = self
                    .matrix
                    .cells_mut()
                    .get_mut(first..first + data.len() / CELL_BYTES)
                    .ok_or(HwError::AddressOutOfRange {
                        offset: i64::from(addr.offset),
                        len: data.len(),
                    })?;
                for (c, chunk) in cells.iter_mut().zip(data.chunks_exact(CELL_BYTES)) {
                    *c = u16::from_le_bytes([chunk[0], chunk[1]]);
                }
                Ok(())
            }
        }
    }
}

fn check_aligned(offset: u32, len: usize, unit: usize) -> HwResult<()> {
    if offset as usize % unit != 0 || len % unit != 0 {
        return Err(HwError::Misaligned(offset));
    }
    Ok(())
}
