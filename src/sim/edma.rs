use super::TriggerFabric;
use crate::error::{HwError, HwResult};
use crate::hw::{
    Addr, ChannelId, MemoryView, Mover, MoverCapacity, TransferChain, TransferParams,
    TransferTrigger,
};
use std::sync::Arc;

/// Bytes copied per burst.
const BURST_BYTES: usize = 256;

/// Counters kept by [`SimulatedEdma`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdmaStats {
    pub frames_moved: u64,
    pub bytes_moved: u64,
    pub completions: u64,
}

#[derive(Debug, Clone)]
struct ChannelState {
    chain: TransferChain,
    frame: u16,
}

/// Software model of the DMA engine.
#[derive(Debug)]
pub struct SimulatedEdma {
    capacity: MoverCapacity,
    fabric: Arc<TriggerFabric>,
    channels: Vec<Option<ChannelState>>,
    stats: EdmaStats,
}

impl SimulatedEdma {
    pub fn new(capacity: MoverCapacity, fabric: Arc<TriggerFabric>) -> Self {
        Self {
            channels: vec![None; capacity.num_channels as usize],
            stats: EdmaStats::default(),
            capacity,
            fabric,
        }
    }

    pub fn stats(&self) -> EdmaStats {
        self.stats
    }

    pub fn fabric(&self) -> &Arc<TriggerFabric> {
        &self.fabric
    }

    /// Chain loaded into `channel`, if any.
    pub fn chain(&self, channel: ChannelId) -> Option<&TransferChain> {
        self.channels
            .get(channel.0 as usize)
            .and_then(Option::as_ref)
            .map(|s| &s.chain)
    }

    fn slot(&mut self, channel: ChannelId) -> HwResult<&mut ChannelState> {
        self.channels
            .get_mut(channel.0 as usize)
            .ok_or(HwError::ChannelOutOfRange(channel))?
            .as_mut()
            .ok_or(HwError::ChannelNotConfigured(channel))
    }

    /// Move one frame of `channel`; returns the channel it chains to.
    fn step(
        &mut self,
        channel: ChannelId,
        chained: bool,
        mem: &mut MemoryView<'_>,
    ) -> HwResult<Option<ChannelId>> {
        let fabric = Arc::clone(&self.fabric);
        let state = self.slot(channel)?;
        match (state.chain.trigger, chained) {
            (TransferTrigger::Chained, false) | (TransferTrigger::Software, true) => {
                return Err(HwError::BadChain(channel));
            }
            (TransferTrigger::Accelerator, true) => return Err(HwError::BadChain(channel)),
            (TransferTrigger::Accelerator, false) => {
                if !fabric.take_accel(channel) {
                    return Err(HwError::TriggerNotRaised(channel));
                }
            }
            _ => {}
        }

        let frame = state.frame;
        if state.chain.links.iter().any(|l| frame >= l.ccnt) {
            return Err(HwError::ChainExhausted(channel));
        }

        let mut bytes = 0u64;
        for link in &state.chain.links {
            bytes += copy_frame(link, frame, mem)?;
            if state.chain.trigger_accel {
                fabric.raise_dma(channel);
            }
        }
        state.frame += 1;

        let completion = state.chain.completion;
        let next = state.chain.chain_to;
        self.stats.frames_moved += 1;
        self.stats.bytes_moved += bytes;

        if let Some(token) = completion {
            mem.completion
                .try_send(token)
                .map_err(|_| HwError::CompletionLost(token))?;
            self.stats.completions += 1;
        }
        Ok(next)
    }
}

fn offset(addr: Addr, frame: u16, cidx: i32, row: u16, bidx: i32, len: usize) -> HwResult<Addr> {
    let at = i64::from(addr.offset)
        + i64::from(frame) * i64::from(cidx)
        + i64::from(row) * i64::from(bidx);
    let offset = u32::try_from(at).map_err(|_| HwError::AddressOutOfRange { offset: at, len })?;
    Ok(Addr::new(addr.region, offset))
}

fn copy_frame(link: &TransferParams, frame: u16, mem: &mut MemoryView<'_>) -> HwResult<u64> {
    let acnt = link.acnt as usize;
    let mut buf = [0u8; BURST_BYTES];
    for row in 0..link.bcnt {
        let src = offset(link.src, frame, link.src_cidx, row, link.src_bidx, acnt)?;
        let dst = offset(link.dst, frame, link.dst_cidx, row, link.dst_bidx, acnt)?;
        let mut done = 0usize;
        while done < acnt {
            let n = (acnt - done).min(BURST_BYTES);
            let chunk = &mut buf[..n];
            mem.read(Addr::new(src.region, src.offset + done as u32), chunk)?;
            mem.write(Addr::new(dst.region, dst.offset + done as u32), chunk)?;
            done += n;
        }
    }
    Ok(link.bcnt as u64 * acnt as u64)
}

impl Mover for SimulatedEdma {
    fn capacity(&self) -> MoverCapacity {
        self.capacity
    }

    fn configure(&mut self, chain: &TransferChain) -> HwResult<()> {
        if let Some(next) = chain.chain_to {
            if next.0 >= self.capacity.num_channels {
                return Err(HwError::ChannelOutOfRange(next));
            }
        }
        let slot = self
            .channels
            .get_mut(chain.channel.0 as usize)
            .ok_or(HwError::ChannelOutOfRange(chain.channel))?;
        *slot = Some(ChannelState {
            chain: chain.clone(),
            frame: 0,
        });
        Ok(())
    }

    fn start(&mut self, channel: ChannelId, mem: &mut MemoryView<'_>) -> HwResult<()> {
        let mut next = self.step(channel, false, mem)?;
        let mut hops = 0u8;
        while let Some(ch) = next {
            hops += 1;
            if hops >= self.capacity.num_channels {
                return Err(HwError::BadChain(ch));
            }
            next = self.step(ch, true, mem)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::{CubeDims, DetMatrixFormat, DetectionMatrix, RadarCube, RadarCubeFormat};
    use crate::hw::{CompletionToken, MemRegion, ScratchMemory};
    use crate::sim::DEFAULT_MOVER_CAPACITY;

    fn edma() -> SimulatedEdma {
        SimulatedEdma::new(
            DEFAULT_MOVER_CAPACITY,
            Arc::new(TriggerFabric::new(DEFAULT_MOVER_CAPACITY.num_channels)),
        )
    }

    fn link(src: Addr, dst: Addr, acnt: u16, ccnt: u16) -> TransferParams {
        TransferParams {
            src,
            dst,
            acnt,
            bcnt: 1,
            ccnt,
            src_bidx: 0,
            dst_bidx: 0,
            src_cidx: i32::from(acnt),
            dst_cidx: i32::from(acnt),
        }
    }

    fn chain(channel: u8, trigger: TransferTrigger, links: &[TransferParams]) -> TransferChain {
        TransferChain {
            channel: ChannelId(channel),
            trigger,
            links: heapless::Vec::from_slice(links).unwrap(),
            trigger_accel: false,
            chain_to: None,
            completion: None,
            shadow_param_id: 0,
            event_queue: 0,
        }
    }

    struct Buffers {
        cube: RadarCube,
        scratch: ScratchMemory,
        matrix: DetectionMatrix,
    }

    fn buffers() -> Buffers {
        let dims = CubeDims {
            num_tx_antennas: 1,
            num_rx_antennas: 1,
            num_range_bins: 2,
            num_doppler_chirps: 4,
        };
        Buffers {
            cube: RadarCube::from_fn(RadarCubeFormat::TxRangeChirpRx, dims, |i| {
                crate::cube::Cmplx16ImRe::new(i.chirp as i16, i.range as i16)
            }),
            scratch: ScratchMemory::try_new(4, 256).unwrap(),
            matrix: DetectionMatrix::zeroed(DetMatrixFormat::RangeMajor, 2, 4),
        }
    }

    #[test]
    fn frames_advance_and_exhaust() {
        let mut edma = edma();
        let mut b = buffers();
        let (tx, _rx) = crossbeam_channel::bounded(4);
        let mut view = MemoryView {
            cube: &b.cube,
            scratch: &mut b.scratch,
            matrix: &mut b.matrix,
            completion: &tx,
        };
        let mut c = chain(
            3,
            TransferTrigger::Software,
            &[link(
                Addr::new(MemRegion::RadarCube, 0),
                Addr::new(MemRegion::Scratch, 0),
                16,
                2,
            )],
        );
        c.trigger_accel = true;
        edma.configure(&c).unwrap();
        edma.start(ChannelId(3), &mut view).unwrap();
        edma.start(ChannelId(3), &mut view).unwrap();
        assert_eq!(
            edma.start(ChannelId(3), &mut view),
            Err(HwError::ChainExhausted(ChannelId(3)))
        );
        assert_eq!(edma.fabric().pending_dma(ChannelId(3)), 2);
        assert_eq!(edma.stats().bytes_moved, 32);
        // second frame landed 16 bytes in: range 1, chirp 0
        let s = b.scratch.read_cmplx(16).unwrap();
        assert_eq!((s.real, s.imag), (0, 1));
    }

    #[test]
    fn accelerator_chain_fires_completion_through_chain() {
        let mut edma = edma();
        let mut b = buffers();
        let (tx, rx) = crossbeam_channel::bounded(4);
        let mut view = MemoryView {
            cube: &b.cube,
            scratch: &mut b.scratch,
            matrix: &mut b.matrix,
            completion: &tx,
        };
        let mut out = chain(
            1,
            TransferTrigger::Accelerator,
            &[link(
                Addr::new(MemRegion::Scratch, 0),
                Addr::new(MemRegion::DetMatrix, 0),
                8,
                2,
            )],
        );
        out.chain_to = Some(ChannelId(2));
        let mut sig = chain(
            2,
            TransferTrigger::Chained,
            &[link(
                Addr::new(MemRegion::Scratch, 0),
                Addr::new(MemRegion::Scratch, 0),
                0,
                2,
            )],
        );
        sig.completion = Some(CompletionToken(7));
        edma.configure(&out).unwrap();
        edma.configure(&sig).unwrap();

        assert_eq!(
            edma.start(ChannelId(1), &mut view),
            Err(HwError::TriggerNotRaised(ChannelId(1)))
        );
        edma.fabric().raise_accel(ChannelId(1));
        edma.start(ChannelId(1), &mut view).unwrap();
        assert_eq!(rx.try_recv(), Ok(CompletionToken(7)));
        assert_eq!(
            edma.start(ChannelId(2), &mut view),
            Err(HwError::BadChain(ChannelId(2)))
        );
    }

    #[test]
    fn full_completion_queue_is_reported() {
        let mut edma = edma();
        let mut b = buffers();
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let mut view = MemoryView {
            cube: &b.cube,
            scratch: &mut b.scratch,
            matrix: &mut b.matrix,
            completion: &tx,
        };
        let mut c = chain(
            0,
            TransferTrigger::Software,
            &[link(
                Addr::new(MemRegion::Scratch, 0),
                Addr::new(MemRegion::Scratch, 8),
                0,
                3,
            )],
        );
        c.completion = Some(CompletionToken(1));
        edma.configure(&c).unwrap();
        edma.start(ChannelId(0), &mut view).unwrap();
        assert_eq!(
            edma.start(ChannelId(0), &mut view),
            Err(HwError::CompletionLost(CompletionToken(1)))
        );
    }

    #[test]
    fn unknown_channels_are_rejected() {
        let mut edma = edma();
        let mut b = buffers();
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let mut view = MemoryView {
            cube: &b.cube,
            scratch: &mut b.scratch,
            matrix: &mut b.matrix,
            completion: &tx,
        };
        assert_eq!(
            edma.start(ChannelId(9), &mut view),
            Err(HwError::ChannelNotConfigured(ChannelId(9)))
        );
        assert_eq!(
            edma.start(ChannelId(200), &mut view),
            Err(HwError::ChannelOutOfRange(ChannelId(200)))
        );
    }
}
