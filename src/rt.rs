//! RT module: replays a descriptor plan for one frame.
//!
//! Ping handles the even range bins and pong the odd ones. While one half
//! computes, the other half's input is staged, so the accelerator never waits
//! for the mover between range bins.
//!
//! RT invariants are signalled once per frame each, so a frame of any length
//! costs at most six queue slots. Per-range-bin counts live in [`FrameReport`].

// IMPORTANT: Do not call the PPT invariant layer or log from this module; it runs per frame.

use crate::error::{DopplerError, DopplerResult};
use crate::hw::{Accelerator, MemoryView, Mover};
use crate::invariant_rt::{
    signal_invariant, INV_COMPLETION_MATCHED, INV_COMPUTE_ISSUED, INV_FRAME_COMPLETE,
    INV_INPUT_STAGED, INV_OUTPUT_ISSUED, INV_SCRATCH_REUSE_ORDERED,
};
use crate::plan::{DescriptorPlan, Half, HalfPlan};
use crate::signal::CompletionSignal;
use rtrb::Producer;

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Range bins whose completion was observed.
    pub range_bins: u32,
    pub completions: u32,
    /// Tokens left over from an earlier frame and discarded.
    pub stale_tokens: u32,
}

/// Completions issued but not yet awaited, oldest first.
struct Outstanding {
    queue: heapless::Deque<Half, 2>,
}

impl Outstanding {
    fn new() -> Self {
        Self {
            queue: heapless::Deque::new(),
        }
    }

    fn issued(&mut self, half: Half) -> DopplerResult<()> {
        // a half reissued before it was settled
        self.queue
            .push_back(half)
            .map_err(|_| DopplerError::InProgress)
    }

    fn contains(&self, half: Half) -> bool {
        self.queue.iter().any(|&h| h == half)
    }
}

/// Per-frame orchestration state borrowed from the unit.
pub struct Orchestrator<'p, 's, A, M> {
    plan: &'p DescriptorPlan,
    hwa: &'s mut A,
    mover: &'s mut M,
    signal: &'s CompletionSignal,
    invariants: Option<&'s mut Producer<u8>>,
    /// Bit `id` set once invariant `id` was signalled this frame.
    signalled: u8,
}

impl<'p, 's, A: Accelerator, M: Mover> Orchestrator<'p, 's, A, M> {
    pub fn new(
        plan: &'p DescriptorPlan,
        hwa: &'s mut A,
        mover: &'s mut M,
        signal: &'s CompletionSignal,
        invariants: Option<&'s mut Producer<u8>>,
    ) -> Self {
        Self {
            plan,
            hwa,
            mover,
            signal,
            invariants,
            signalled: 0,
        }
    }

    fn mark(&mut self, id: u8) {
        let bit = 1u8 << (id & 7);
        if self.signalled & bit != 0 {
            return;
        }
        if let Some(tx) = self.invariants.as_deref_mut() {
            signal_invariant(tx, id);
            self.signalled |= bit;
        }
    }

    /// Load every descriptor of the plan into the engines.
    fn program(&mut self) -> DopplerResult<()> {
        self.hwa.reset();
        self.hwa
            .load_window(self.plan.win_ram_offset as usize, &self.plan.window)?;
        for half in &self.plan.halves {
            for (i, ps) in half.param_sets.iter().enumerate() {
                self.hwa.configure(half.first_param_set + i, ps)?;
            }
        }
        for chain in self.plan.chains() {
            self.mover.configure(chain)?;
        }
        Ok(())
    }

    /// Wait, in issue order, until `half` has no completion pending.
    fn settle(
        &mut self,
        pending: &mut Outstanding,
        half: Half,
        report: &mut FrameReport,
    ) -> DopplerResult<()> {
        while pending.contains(half) {
            let Some(oldest) = pending.queue.pop_front() else {
                break;
            };
            self.signal.wait_for(oldest.token())?;
            report.completions += 1;
            report.range_bins += 1;
            self.mark(INV_COMPLETION_MATCHED);
        }
        Ok(())
    }

    fn stage_input(&mut self, half: &HalfPlan, mem: &mut MemoryView<'_>) -> DopplerResult<()> {
        self.mover.start(half.input.channel, mem)?;
        self.mark(INV_INPUT_STAGED);
        Ok(())
    }

    fn compute(&mut self, half: &HalfPlan, mem: &mut MemoryView<'_>) -> DopplerResult<()> {
        self.hwa
            .run(half.first_param_set, half.param_sets.len(), &mut *mem.scratch)?;
        self.mark(INV_COMPUTE_ISSUED);
        Ok(())
    }

    fn drain_output(
        &mut self,
        half: &HalfPlan,
        pending: &mut Outstanding,
        mem: &mut MemoryView<'_>,
    ) -> DopplerResult<()> {
        self.mover.start(half.output.channel, mem)?;
        pending.issued(half.half)?;
        self.mark(INV_OUTPUT_ISSUED);
        Ok(())
    }

    /// Process every range bin of the frame into `mem.matrix`.
    pub fn run_frame(&mut self, mem: &mut MemoryView<'_>) -> DopplerResult<FrameReport> {
        let plan = self.plan;
        let ping = plan.half(Half::Ping);
        let pong = plan.half(Half::Pong);
        let mut report = FrameReport::default();
        let mut pending = Outstanding::new();
        self.signalled = 0;

        self.program()?;
        report.stale_tokens = self.signal.drain() as u32;

        for g in 0..ping.num_groups {
            if g > 0 {
                self.settle(&mut pending, Half::Ping, &mut report)?;
                self.mark(INV_SCRATCH_REUSE_ORDERED);
            }
            self.stage_input(ping, mem)?;
            self.compute(ping, mem)?;

            let pong_busy = g < pong.num_groups;
            if pong_busy {
                if g > 0 {
                    self.settle(&mut pending, Half::Pong, &mut report)?;
                    self.mark(INV_SCRATCH_REUSE_ORDERED);
                }
                self.stage_input(pong, mem)?;
            }

            self.drain_output(ping, &mut pending, mem)?;

            if pong_busy {
                self.compute(pong, mem)?;
                self.drain_output(pong, &mut pending, mem)?;
            }
        }

        self.settle(&mut pending, Half::Ping, &mut report)?;
        self.settle(&mut pending, Half::Pong, &mut report)?;

        if report.range_bins == u32::from(plan.num_range_bins) {
            self.mark(INV_FRAME_COMPLETE);
        }
        Ok(report)
    }
}
