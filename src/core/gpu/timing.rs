//! Coarse GPU busy estimate from cumulative per-node running times.
//!
//! Where the running-time counters live is driver dependent, so the result
//! is a bounded estimate rather than an exact figure.

use std::thread;
use std::time::{Duration, Instant};

use log::trace;

use super::types::clamp_percent;

/// Busy readings above this are assumed to be in the wrong unit.
const IMPLAUSIBLE_BUSY: f64 = 400.0;

/// Cumulative running time per engine node, in nanoseconds.
pub trait NodeTimeSource: Send {
    fn sample(&mut self) -> Option<Vec<u64>>;
}

/// `Σ node delta / wall time * 100`, rescaled when implausibly large and
/// clamped to 0..=100. Nodes whose counter went backwards contribute zero.
pub fn busy_percent(first: &[u64], second: &[u64], wall_ns: f64) -> Option<f64> {
    if first.is_empty() || second.is_empty() || wall_ns <= 0.0 {
        return None;
    }

    // Offsets are guessed, so any node may hold garbage.
    let total = first
        .iter()
        .zip(second)
        .map(|(before, after)| after.saturating_sub(*before))
        .fold(0u64, u64::saturating_add);

    let mut busy = total as f64 / wall_ns * 100.0;
    if busy > IMPLAUSIBLE_BUSY {
        busy /= 10.0;
    }
    Some(clamp_percent(busy))
}

/// Byte offsets probed for the per-node running-time block of an adapter
/// statistics record.
pub const NODE_BLOCK_OFFSETS: &[usize] = &[64, 96, 128, 160, 192, 256, 384, 512, 768, 1024, 1536];
const DEFAULT_NODE_COUNT: usize = 8;
const MAX_NODE_COUNT: usize = 64;

/// Find the first block of `node_count` little-endian u64 values that is not
/// all zero. An implausible count falls back to 8 nodes.
pub fn scan_node_block(buf: &[u8], node_count: i32) -> Option<Vec<u64>> {
    let nodes = match usize::try_from(node_count) {
        Ok(n) if n > 0 && n <= MAX_NODE_COUNT => n,
        _ => DEFAULT_NODE_COUNT,
    };

    NODE_BLOCK_OFFSETS.iter().find_map(|&offset| {
        let block = buf.get(offset..offset + nodes * 8)?;
        let times: Vec<u64> = block
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        times.iter().any(|&t| t != 0).then_some(times)
    })
}

pub struct NodeTimingEstimator {
    source: Box<dyn NodeTimeSource>,
    gap: Duration,
}

impl NodeTimingEstimator {
    pub fn new(source: Box<dyn NodeTimeSource>, gap: Duration) -> Self {
        Self { source, gap }
    }

    pub fn is_supported(&mut self) -> bool {
        self.source.sample().is_some()
    }

    /// Take two samples `gap` apart. Blocks the calling thread for the gap.
    pub fn estimate(&mut self) -> Option<f64> {
        let first = self.source.sample()?;
        let first_at = Instant::now();
        thread::sleep(self.gap);
        let second = self.source.sample()?;
        let wall_ns = first_at.elapsed().as_nanos() as f64;

        let busy = busy_percent(&first, &second, wall_ns);
        trace!("Node timing estimate over {:.0} ns: {:?}", wall_ns, busy);
        busy
    }
}
