//! Plan module: compile a validated configuration into descriptor tables.
//!
//! The plan is pure data. Building it twice from the same configuration yields
//! equal plans, and the orchestrator only replays it.

use crate::config::{
    EdmaCfg, EdmaChannelCfg, EdmaPingPong, HwaCfg, StaticConfig, MAX_TX_ANTENNAS,
};
use crate::cube::{CELL_BYTES, SAMPLE_BYTES};
use crate::error::{DopplerError, DopplerResult};
use crate::hw::{
    Addr, ChannelId, CompletionToken, HwaTrigger, JobOp, MemRegion, ParamSet, Strided,
    TransferChain, TransferParams, TransferTrigger, WindowRef,
};
use crate::invariant_ppt::{assert_invariant, PING_PONG_PARTITION, PLAN_SOUNDNESS};
use tracing::debug;

/// One of the two alternating buffer sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Half {
    Ping,
    Pong,
}

impl Half {
    pub const BOTH: [Half; 2] = [Half::Ping, Half::Pong];

    pub const fn index(self) -> usize {
        match self {
            Half::Ping => 0,
            Half::Pong => 1,
        }
    }

    /// Token carried by this half's completion event.
    pub const fn token(self) -> CompletionToken {
        CompletionToken(self.index() as u8)
    }

    const fn input_bank(self) -> usize {
        self.index()
    }

    const fn output_bank(self) -> usize {
        2 + self.index()
    }
}

/// Descriptors owned by one half.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HalfPlan {
    pub half: Half,
    /// Accelerator slot of the first paramset of this half.
    pub first_param_set: usize,
    /// One FFT job per TX antenna followed by the accumulate job.
    pub param_sets: heapless::Vec<ParamSet, { MAX_TX_ANTENNAS + 1 }>,
    pub input: TransferChain,
    pub output: TransferChain,
    pub hot_signature: TransferChain,
    /// Range bins this half processes.
    pub num_groups: u16,
}

impl HalfPlan {
    pub fn is_active(&self) -> bool {
        self.num_groups > 0
    }

    pub fn chains(&self) -> [&TransferChain; 3] {
        [&self.input, &self.output, &self.hot_signature]
    }
}

/// The compiled plan: paramsets, transfer chains and window for both halves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorPlan {
    pub halves: [HalfPlan; 2],
    pub window: Vec<i32>,
    pub win_ram_offset: u32,
    pub num_range_bins: u16,
}

/// Addressing derived once from the static configuration.
struct Geometry {
    tx: u32,
    rx: u32,
    range: u32,
    chirps: u32,
    bins: u32,
    log2: u8,
    bank_bytes: u32,
}

impl Geometry {
    /// Bytes of one TX antenna's chirps for one range bin.
    fn tx_input_bytes(&self) -> u32 {
        self.chirps * self.rx * SAMPLE_BYTES as u32
    }

    /// Bytes of one TX antenna's magnitudes.
    fn tx_output_bytes(&self) -> u32 {
        self.rx * self.bins * CELL_BYTES as u32
    }

    fn row_bytes(&self) -> u32 {
        self.bins * CELL_BYTES as u32
    }

    fn bank(&self, bank: usize) -> u32 {
        bank as u32 * self.bank_bytes
    }
}

fn field(v: u32, what: &'static str) -> DopplerResult<u16> {
    u16::try_from(v).map_err(|_| DopplerError::InvalidArgument(what))
}

fn stride(v: u32, what: &'static str) -> DopplerResult<i32> {
    i32::try_from(v).map_err(|_| DopplerError::InvalidArgument(what))
}

impl DescriptorPlan {
    /// Create a plan from an already validated configuration.
    pub fn build<M>(
        cfg: &StaticConfig,
        hwa: &HwaCfg,
        edma: &EdmaCfg<M>,
        bank_bytes: usize,
    ) -> DopplerResult<Self> {
        let geo = Geometry {
            tx: u32::from(cfg.num_tx_antennas),
            rx: u32::from(cfg.num_rx_antennas),
            range: u32::from(cfg.num_range_bins),
            chirps: u32::from(cfg.num_doppler_chirps),
            bins: u32::from(cfg.num_doppler_bins),
            log2: cfg.log2_num_doppler_bins,
            bank_bytes: u32::try_from(bank_bytes)
                .map_err(|_| DopplerError::InvalidArgument("bank size"))?,
        };
        if geo.tx == 0 || geo.tx as usize > MAX_TX_ANTENNAS {
            return Err(DopplerError::InsufficientHwaResources("paramsets"));
        }

        let base = hwa.param_set_start_idx as usize;
        let per_half = geo.tx as usize + 1;
        let ping = build_half(Half::Ping, &geo, hwa, edma, base)?;
        let pong = build_half(Half::Pong, &geo, hwa, edma, base + per_half)?;

        assert_invariant(
            PLAN_SOUNDNESS,
            ping.first_param_set + ping.param_sets.len() == pong.first_param_set
                && pong.first_param_set + pong.param_sets.len()
                    == base + usize::from(hwa.num_param_sets),
            "halves exactly tile the granted paramset range",
            None,
        );
        assert_invariant(
            PING_PONG_PARTITION,
            u32::from(ping.num_groups) + u32::from(pong.num_groups) == geo.range
                && ping.num_groups >= pong.num_groups,
            "ping and pong together cover every range bin",
            None,
        );
        debug!(
            ping_groups = ping.num_groups,
            pong_groups = pong.num_groups,
            first_param_set = base,
            param_sets = 2 * per_half,
            "descriptor plan built"
        );

        Ok(Self {
            halves: [ping, pong],
            window: hwa.window.clone(),
            win_ram_offset: hwa.win_ram_offset,
            num_range_bins: cfg.num_range_bins,
        })
    }

    pub fn half(&self, half: Half) -> &HalfPlan {
        &self.halves[half.index()]
    }

    pub fn first_param_set(&self) -> usize {
        self.halves[0].first_param_set
    }

    pub fn num_param_sets(&self) -> usize {
        self.halves.iter().map(|h| h.param_sets.len()).sum()
    }

    /// All six chains, ping roles first.
    pub fn chains(&self) -> impl Iterator<Item = &TransferChain> {
        self.halves.iter().flat_map(|h| h.chains())
    }
}

fn build_half<M>(
    half: Half,
    geo: &Geometry,
    hwa: &HwaCfg,
    edma: &EdmaCfg<M>,
    first_param_set: usize,
) -> DopplerResult<HalfPlan> {
    let pick = |pair: &EdmaPingPong| match half {
        Half::Ping => pair.ping,
        Half::Pong => pair.pong,
    };
    let input_ch = pick(&edma.input);
    let output_ch = pick(&edma.output);
    let signal_ch = pick(&edma.hot_signature);

    let r0 = half.index() as u32;
    // ping takes the even range bins, pong the odd ones
    let num_groups = field((geo.range + 1 - r0) / 2, "range bins")?;
    let in_bank = geo.bank(half.input_bank());
    let out_bank = geo.bank(half.output_bank());

    let mut param_sets = heapless::Vec::new();
    let window = Some(WindowRef {
        ram_offset: hwa.win_ram_offset,
        symmetric: hwa.window_symmetric,
    });
    let butterfly_scaling = hwa.first_stage_scaling.butterfly_mask(geo.log2);
    let sample = SAMPLE_BYTES as u32;
    let cell = CELL_BYTES as u32;

    for t in 0..geo.tx {
        let fft = ParamSet {
            trigger: HwaTrigger::Dma(input_ch.id()),
            op: JobOp::FftMagnitude {
                window,
                fft_size_log2: geo.log2,
                butterfly_scaling,
            },
            src: Strided {
                addr: in_bank + t * geo.tx_input_bytes(),
                acnt: field(geo.chirps, "chirps")?,
                aidx: field(geo.rx * sample, "chirp stride")?,
                bcnt: field(geo.rx, "rx antennas")?,
                bidx: sample as u16,
            },
            dst: Strided {
                addr: out_bank + t * geo.tx_output_bytes(),
                acnt: field(geo.bins, "Doppler bins")?,
                aidx: cell as u16,
                bcnt: field(geo.rx, "rx antennas")?,
                bidx: field(geo.row_bytes(), "row stride")?,
            },
            dma_trigger_out: None,
        };
        push(&mut param_sets, fft)?;
    }

    let sum = ParamSet {
        trigger: HwaTrigger::Immediate,
        op: JobOp::Accumulate,
        src: Strided {
            addr: out_bank,
            acnt: field(geo.bins, "Doppler bins")?,
            aidx: cell as u16,
            bcnt: field(geo.tx * geo.rx, "virtual antennas")?,
            bidx: field(geo.row_bytes(), "row stride")?,
        },
        dst: Strided {
            addr: in_bank,
            acnt: field(geo.bins, "Doppler bins")?,
            aidx: cell as u16,
            bcnt: 1,
            bidx: 0,
        },
        dma_trigger_out: Some(output_ch.id()),
    };
    push(&mut param_sets, sum)?;

    let cube_row = geo.tx_input_bytes();
    let mut input = chain(input_ch, TransferTrigger::Software);
    input.trigger_accel = true;
    for t in 0..geo.tx {
        let link = TransferParams {
            src: Addr::new(MemRegion::RadarCube, (t * geo.range + r0) * cube_row),
            dst: Addr::new(MemRegion::Scratch, in_bank + t * cube_row),
            acnt: field(cube_row, "input row")?,
            bcnt: 1,
            ccnt: num_groups,
            src_bidx: 0,
            dst_bidx: 0,
            src_cidx: stride(2 * cube_row, "input frame stride")?,
            dst_cidx: 0,
        };
        input
            .links
            .push(link)
            .map_err(|_| DopplerError::InsufficientHwaResources("transfer links"))?;
    }

    let mut output = chain(output_ch, TransferTrigger::Accelerator);
    output.chain_to = Some(signal_ch.id());
    output
        .links
        .push(TransferParams {
            src: Addr::new(MemRegion::Scratch, in_bank),
            dst: Addr::new(MemRegion::DetMatrix, r0 * geo.row_bytes()),
            acnt: field(geo.row_bytes(), "output row")?,
            bcnt: 1,
            ccnt: num_groups,
            src_bidx: 0,
            dst_bidx: 0,
            src_cidx: 0,
            dst_cidx: stride(2 * geo.row_bytes(), "output frame stride")?,
        })
        .map_err(|_| DopplerError::InsufficientHwaResources("transfer links"))?;

    // a zero-length transfer whose only effect is the completion event
    let mut hot_signature = chain(signal_ch, TransferTrigger::Chained);
    hot_signature.completion = Some(half.token());
    hot_signature
        .links
        .push(TransferParams {
            src: Addr::new(MemRegion::Scratch, in_bank),
            dst: Addr::new(MemRegion::Scratch, in_bank),
            acnt: 0,
            bcnt: 1,
            ccnt: num_groups,
            src_bidx: 0,
            dst_bidx: 0,
            src_cidx: 0,
            dst_cidx: 0,
        })
        .map_err(|_| DopplerError::InsufficientHwaResources("transfer links"))?;

    Ok(HalfPlan {
        half,
        first_param_set,
        param_sets,
        input,
        output,
        hot_signature,
        num_groups,
    })
}

fn chain(cfg: EdmaChannelCfg, trigger: TransferTrigger) -> TransferChain {
    TransferChain {
        channel: ChannelId(cfg.channel),
        trigger,
        links: heapless::Vec::new(),
        trigger_accel: false,
        chain_to: None,
        completion: None,
        shadow_param_id: cfg.shadow_param_id,
        event_queue: cfg.event_queue,
    }
}

fn push(
    list: &mut heapless::Vec<ParamSet, { MAX_TX_ANTENNAS + 1 }>,
    ps: ParamSet,
) -> DopplerResult<()> {
    list.push(ps)
        .map_err(|_| DopplerError::InsufficientHwaResources("paramsets"))
}
