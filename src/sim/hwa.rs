use super::TriggerFabric;
use crate::cube::CELL_BYTES;
use crate::error::{HwError, HwResult};
use crate::fixed::{self, Cplx, FftEngine};
use crate::hw::{
    Accelerator, HwaCapacity, HwaTrigger, JobOp, ParamSet, ScratchMemory, Strided, WindowRef,
};
use crate::window;
use std::sync::Arc;

/// Counters kept by [`SimulatedHwa`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HwaStats {
    pub jobs_run: u64,
    pub vectors_processed: u64,
    /// Values clamped anywhere in the datapath.
    pub saturations: u64,
    pub resets: u64,
}

/// Software model of the FFT accelerator.
#[derive(Debug)]
pub struct SimulatedHwa {
    capacity: HwaCapacity,
    fabric: Arc<TriggerFabric>,
    param_sets: Vec<Option<ParamSet>>,
    window_ram: Vec<i32>,
    fft: FftEngine,
    stats: HwaStats,
}

impl SimulatedHwa {
    pub fn new(capacity: HwaCapacity, fabric: Arc<TriggerFabric>) -> Self {
        Self {
            param_sets: vec![None; capacity.num_param_sets],
            window_ram: vec![0; capacity.window_ram_len],
            fft: FftEngine::new(capacity.max_fft_size_log2),
            stats: HwaStats::default(),
            capacity,
            fabric,
        }
    }

    pub fn stats(&self) -> HwaStats {
        HwaStats {
            saturations: self.stats.saturations + self.fft.saturations(),
            ..self.stats
        }
    }

    pub fn fabric(&self) -> &Arc<TriggerFabric> {
        &self.fabric
    }

    /// Programmed contents of a paramset slot.
    pub fn param_set(&self, index: usize) -> Option<&ParamSet> {
        self.param_sets.get(index).and_then(Option::as_ref)
    }

    pub fn window_ram(&self) -> &[i32] {
        &self.window_ram
    }

    fn fft_magnitude(
        &mut self,
        ps: &ParamSet,
        window_ref: Option<WindowRef>,
        log2: u8,
        scaling: u16,
        scratch: &mut ScratchMemory,
    ) -> HwResult<()> {
        let Strided {
            addr: src,
            acnt,
            aidx,
            bcnt,
            bidx,
        } = ps.src;
        if log2 > self.fft.max_log2() {
            return Err(HwError::FftSizeUnsupported(log2));
        }
        let n = 1usize << log2;
        if acnt as usize > n || ps.dst.acnt as usize > n {
            return Err(HwError::FftSizeUnsupported(log2));
        }
        for b in 0..u32::from(bcnt) {
            let base = src + b * u32::from(bidx);
            let input = self.fft.input(log2);
            for (a, slot) in input.iter_mut().take(acnt as usize).enumerate() {
                let x = scratch.read_cmplx(base + a as u32 * u32::from(aidx))?;
                *slot = match window_ref {
                    Some(w) => {
                        let table = self
                            .window_ram
                            .get(w.ram_offset as usize..)
                            .unwrap_or_default();
                        let coeff = window::coefficient(table, a, acnt as usize, w.symmetric)
                            .ok_or(HwError::WindowRamOverflow {
                                offset: w.ram_offset as usize,
                                len: acnt as usize,
                            })?;
                        Cplx {
                            re: fixed::apply_window(x.real, coeff),
                            im: fixed::apply_window(x.imag, coeff),
                        }
                    }
                    None => Cplx {
                        re: i32::from(x.real),
                        im: i32::from(x.imag),
                    },
                };
            }

            let spectrum = self.fft.transform(log2, scaling);
            let out_base = ps.dst.addr + b * u32::from(ps.dst.bidx);
            let mut clipped = 0u64;
            for (k, &bin) in spectrum.iter().take(ps.dst.acnt as usize).enumerate() {
                let (mag, sat) = fixed::magnitude(bin);
                clipped += u64::from(sat);
                scratch.write_u16(out_base + k as u32 * u32::from(ps.dst.aidx), mag)?;
            }
            self.stats.saturations += clipped;
            self.stats.vectors_processed += 1;
        }
        Ok(())
    }

    fn accumulate(&mut self, ps: &ParamSet, scratch: &mut ScratchMemory) -> HwResult<()> {
        let src = ps.src;
        for a in 0..u32::from(src.acnt) {
            let col = src.addr + a * u32::from(src.aidx);
            let rows = (0..u32::from(src.bcnt)).map(|b| col + b * u32::from(src.bidx));
            let (value, sat) = fixed::accumulate(rows.map(|off| scratch.read_u16(off)))?;
            self.stats.saturations += u64::from(sat);
            let dst_aidx = if ps.dst.aidx == 0 {
                CELL_BYTES as u32
            } else {
                u32::from(ps.dst.aidx)
            };
            scratch.write_u16(ps.dst.addr + a * dst_aidx, value)?;
        }
        self.stats.vectors_processed += 1;
        Ok(())
    }
}

impl Accelerator for SimulatedHwa {
    fn capacity(&self) -> HwaCapacity {
        self.capacity
    }

    fn reset(&mut self) {
        self.fabric.clear();
        self.stats.resets += 1;
    }

    fn load_window(&mut self, ram_offset: usize, coeffs: &[i32]) -> HwResult<()> {
        let overflow = HwError::WindowRamOverflow {
            offset: ram_offset,
            len: coeffs.len(),
        };
        let end = ram_offset.checked_add(coeffs.len()).ok_or(overflow.clone())?;
        self.window_ram
            .get_mut(ram_offset..end)
            .ok_or(overflow)?
            .copy_from_slice(coeffs);
        Ok(())
    }

    fn configure(&mut self, index: usize, param_set: &ParamSet) -> HwResult<()> {
        if let JobOp::FftMagnitude { fft_size_log2, .. } = param_set.op {
            if fft_size_log2 > self.capacity.max_fft_size_log2 {
                return Err(HwError::FftSizeUnsupported(fft_size_log2));
            }
        }
        let slot = self
            .param_sets
            .get_mut(index)
            .ok_or(HwError::ParamSetOutOfRange(index))?;
        *slot = Some(*param_set);
        Ok(())
    }

    fn run(&mut self, first: usize, count: usize, scratch: &mut ScratchMemory) -> HwResult<()> {
        for index in first..first + count {
            let ps = *self
                .param_sets
                .get(index)
                .ok_or(HwError::ParamSetOutOfRange(index))?
                .as_ref()
                .ok_or(HwError::ParamSetUnconfigured(index))?;

            if let HwaTrigger::Dma(channel) = ps.trigger {
                if !self.fabric.take_dma(channel) {
                    return Err(HwError::TriggerNotRaised(channel));
                }
            }

            match ps.op {
                JobOp::FftMagnitude {
                    window,
                    fft_size_log2,
                    butterfly_scaling,
                } => self.fft_magnitude(&ps, window, fft_size_log2, butterfly_scaling, scratch)?,
                JobOp::Accumulate => self.accumulate(&ps, scratch)?,
            }
            self.stats.jobs_run += 1;

            if let Some(channel) = ps.dma_trigger_out {
                self.fabric.raise_accel(channel);
            }
        }
        Ok(())
    }
}
