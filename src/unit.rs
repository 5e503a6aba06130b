//! The Doppler processing unit handle: `init`, `config`, `process`, `deinit`.

use crate::config::{DopplerConfig, InitParams, StaticConfig, NUM_HWA_MEMBANKS};
use crate::cube::{DetMatrixDesc, DetectionMatrix, RadarCube, RadarCubeDesc};
use crate::error::{DopplerError, DopplerResult};
use crate::hw::{Accelerator, MemoryView, Mover, ScratchMemory};
use crate::invariant_ppt::{assert_invariant, LIFECYCLE_TRANSITION};
use crate::invariant_rt::new_invariant_queue;
use crate::plan::DescriptorPlan;
use crate::rt::{FrameReport, Orchestrator};
use crate::signal::CompletionSignal;
use crate::states::UnitState;
use crate::validate::{validate, ResourceUsage};
use rtrb::{Consumer, Producer};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Running statistics of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DopplerStats {
    /// Wall time of the last `process`, in microseconds.
    pub processing_time_us: u32,
    pub frames_processed: u64,
    /// Range bins written by the last `process`.
    pub range_bins_processed: u32,
}

/// Result of `process`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutParams {
    pub stats: DopplerStats,
}

/// Everything installed by a successful `config`.
#[derive(Debug)]
struct Installed<M> {
    plan: DescriptorPlan,
    mover: M,
    static_cfg: StaticConfig,
    radar_cube: RadarCubeDesc,
    det_matrix: DetMatrixDesc,
    usage: ResourceUsage,
}

/// One Doppler processing unit bound to an accelerator.
pub struct DopplerProc<A, M> {
    hwa: A,
    state: UnitState,
    signal: CompletionSignal,
    scratch: Option<ScratchMemory>,
    installed: Option<Installed<M>>,
    stats: DopplerStats,
    invariants: Option<Producer<u8>>,
}

impl<A: Accelerator, M: Mover> DopplerProc<A, M> {
    /// Create a handle around an accelerator.
    pub fn init(params: InitParams<A>) -> DopplerResult<Self> {
        let caps = params.hwa.capacity();
        if caps.num_mem_banks < NUM_HWA_MEMBANKS {
            return Err(DopplerError::InsufficientHwaResources("memory banks"));
        }
        let signal = CompletionSignal::new(params.completion_timeout)?;
        info!(
            param_sets = caps.num_param_sets,
            bank_bytes = caps.mem_bank_bytes,
            timeout = ?signal.timeout(),
            "doppler unit initialized"
        );
        Ok(Self {
            hwa: params.hwa,
            state: UnitState::Idle,
            signal,
            scratch: None,
            installed: None,
            stats: DopplerStats::default(),
            invariants: None,
        })
    }

    /// [`init`](Self::init), plus the consumer end of the per-frame invariant queue.
    pub fn init_with_invariants(params: InitParams<A>) -> DopplerResult<(Self, Consumer<u8>)> {
        let mut unit = Self::init(params)?;
        let (tx, rx) = new_invariant_queue();
        unit.invariants = Some(tx);
        Ok((unit, rx))
    }

    /// Validate `cfg` and install its descriptor plan.
    ///
    /// On error the previously installed plan, if any, stays in effect.
    pub fn config(&mut self, cfg: DopplerConfig<M>) -> DopplerResult<()> {
        self.state.check_configurable()?;
        let caps = self.hwa.capacity();
        let usage = validate(&cfg, &caps, &cfg.hw_res.edma.handle.capacity()).map_err(|e| {
            warn!(error = %e, "configuration rejected");
            e
        })?;

        if self.scratch.is_none() {
            let bytes = NUM_HWA_MEMBANKS * caps.mem_bank_bytes;
            self.scratch = Some(
                ScratchMemory::try_new(NUM_HWA_MEMBANKS, caps.mem_bank_bytes)
                    .ok_or(DopplerError::OutOfMemory { bytes })?,
            );
        }

        let plan = DescriptorPlan::build(
            &cfg.static_cfg,
            &cfg.hw_res.hwa,
            &cfg.hw_res.edma,
            caps.mem_bank_bytes,
        )?;
        let DopplerConfig { hw_res, static_cfg } = cfg;
        self.installed = Some(Installed {
            plan,
            mover: hw_res.edma.handle,
            static_cfg,
            radar_cube: hw_res.radar_cube,
            det_matrix: hw_res.det_matrix,
            usage,
        });
        assert_invariant(
            LIFECYCLE_TRANSITION,
            matches!(self.state, UnitState::Idle | UnitState::Ready),
            "config from Idle or Ready",
            None,
        );
        self.state = UnitState::Ready;
        info!(
            tx = static_cfg.num_tx_antennas,
            rx = static_cfg.num_rx_antennas,
            range_bins = static_cfg.num_range_bins,
            doppler_bins = static_cfg.num_doppler_bins,
            param_sets = usage.param_sets,
            "doppler unit configured"
        );
        Ok(())
    }

    /// Run one frame: `cube` in, one summed Doppler row per range bin out.
    pub fn process(
        &mut self,
        cube: &RadarCube,
        matrix: &mut DetectionMatrix,
    ) -> DopplerResult<OutParams> {
        self.state.check_processable()?;
        let installed = self.installed.as_mut().ok_or(DopplerError::NotConfigured)?;
        let scratch = self.scratch.as_mut().ok_or(DopplerError::NotConfigured)?;
        check_buffers(installed, cube, matrix)?;

        self.state = UnitState::Running;
        let start = Instant::now();
        let mut orchestrator = Orchestrator::new(
            &installed.plan,
            &mut self.hwa,
            &mut installed.mover,
            &self.signal,
            self.invariants.as_mut(),
        );
        let mut mem = MemoryView {
            cube,
            scratch,
            matrix,
            completion: self.signal.sender(),
        };
        // a failed frame leaves the handle Running until deinit
        let report: FrameReport = orchestrator.run_frame(&mut mem)?;
        let elapsed = start.elapsed();

        self.stats = DopplerStats {
            processing_time_us: u32::try_from(elapsed.as_micros()).unwrap_or(u32::MAX),
            frames_processed: self.stats.frames_processed + 1,
            range_bins_processed: report.range_bins,
        };
        self.state = UnitState::Ready;
        debug!(
            us = self.stats.processing_time_us,
            range_bins = report.range_bins,
            stale_tokens = report.stale_tokens,
            "frame processed"
        );
        Ok(OutParams { stats: self.stats })
    }

    /// Release the plan, the mover and the scratch memory.
    pub fn deinit(&mut self) -> DopplerResult<()> {
        if self.state.is_released() {
            return Err(DopplerError::InvalidArgument("handle already released"));
        }
        let drained = self.signal.drain();
        self.installed = None;
        self.scratch = None;
        self.invariants = None;
        self.state = UnitState::Released;
        assert_invariant(LIFECYCLE_TRANSITION, self.installed.is_none(), "deinit releases", None);
        info!(frames = self.stats.frames_processed, drained, "doppler unit released");
        Ok(())
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn stats(&self) -> DopplerStats {
        self.stats
    }

    pub fn accelerator(&self) -> &A {
        &self.hwa
    }

    pub fn mover(&self) -> Option<&M> {
        self.installed.as_ref().map(|i| &i.mover)
    }

    pub fn plan(&self) -> Option<&DescriptorPlan> {
        self.installed.as_ref().map(|i| &i.plan)
    }

    pub fn resource_usage(&self) -> Option<ResourceUsage> {
        self.installed.as_ref().map(|i| i.usage)
    }
}

fn check_buffers<M>(
    installed: &Installed<M>,
    cube: &RadarCube,
    matrix: &DetectionMatrix,
) -> DopplerResult<()> {
    let s = &installed.static_cfg;
    let dims = cube.dims();
    if cube.format() != installed.radar_cube.format
        || cube.desc().data_size < installed.radar_cube.data_size
        || dims.num_tx_antennas != usize::from(s.num_tx_antennas)
        || dims.num_rx_antennas != usize::from(s.num_rx_antennas)
        || dims.num_range_bins != usize::from(s.num_range_bins)
        || dims.num_doppler_chirps != usize::from(s.num_doppler_chirps)
    {
        return Err(DopplerError::InvalidArgument("radar cube does not match configuration"));
    }
    if matrix.format() != installed.det_matrix.format
        || matrix.num_range_bins() != usize::from(s.num_range_bins)
        || matrix.num_doppler_bins() != usize::from(s.num_doppler_bins)
    {
        return Err(DopplerError::InvalidArgument(
            "detection matrix does not match configuration",
        ));
    }
    Ok(())
}
