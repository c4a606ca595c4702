//! Bounded edit-distance engine.
//!
//! The clustering loop asks one question per candidate pair: are these two
//! sequences within `d` differences of each other, and if so, how many?
//! [`DistanceKernel`] answers it in bulk. Candidates are packed one per SIMD
//! lane and swept through a banded affine-gap DP against a shared query
//! ([`engine`]); [`pairwise`] holds the scalar aligner with traceback used
//! for alignment output and as the reference the lane engines are verified
//! against.
//!
//! Lane element width is fixed up front from the worst value any live DP
//! cell can take. Amplicon-scale resolutions fit 8-bit lanes (16 candidates
//! per sweep); unusually large `d` or penalties fall back to 16-bit lanes.

mod engine;
mod pairwise;
mod simd;

pub use engine::BandBuffers;
pub use pairwise::{align, Alignment};

use anyhow::{bail, Result};

use crate::score::CostSet;

/// Element width the lane engine runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneWidth {
    /// 8-bit cells, 16 lanes per sweep.
    B8,
    /// 16-bit cells, 8 lanes per sweep.
    B16,
}

impl LaneWidth {
    /// Candidates processed per batch.
    pub fn lanes(self) -> usize {
        match self {
            LaneWidth::B8 => 16,
            LaneWidth::B16 => 8,
        }
    }

    /// Bits per DP cell, for the startup log line.
    pub fn bits(self) -> u32 {
        match self {
            LaneWidth::B8 => 8,
            LaneWidth::B16 => 16,
        }
    }
}

/// Pick the narrowest element width whose saturation point no cell that
/// matters can reach.
///
/// A lane stays live only while some band cell of its row is at or under the
/// link bound, so any value that can still influence a capture is at most
/// one step past the bound. One spare value keeps the all-ones sentinel
/// distinct.
pub fn choose_lane_width(costs: &CostSet, resolution: u32) -> Result<LaneWidth> {
    let need = costs
        .link_bound(resolution)
        .saturating_add(u64::from(costs.max_single_diff()))
        .saturating_add(1);

    if need <= u64::from(u8::MAX) {
        Ok(LaneWidth::B8)
    } else if need <= u64::from(u16::MAX) {
        Ok(LaneWidth::B16)
    } else {
        bail!(
            "resolution {} with these penalties overflows 16-bit lane cells; \
             lower the resolution or the penalties",
            resolution
        );
    }
}

/// Reusable per-thread scratch for [`DistanceKernel::scan`].
#[derive(Debug, Default)]
pub struct KernelWorkspace {
    b8: BandBuffers<u8>,
    b16: BandBuffers<u16>,
    results: Vec<Option<u32>>,
}

/// Batched bounded-distance scanner for one resolution and cost set.
#[derive(Debug, Clone)]
pub struct DistanceKernel {
    costs: CostSet,
    resolution: u32,
    bound: u64,
    width: LaneWidth,
}

impl DistanceKernel {
    pub fn new(costs: CostSet, resolution: u32) -> Result<Self> {
        let width = choose_lane_width(&costs, resolution)?;
        Ok(DistanceKernel {
            costs,
            resolution,
            bound: costs.link_bound(resolution),
            width,
        })
    }

    pub fn width(&self) -> LaneWidth {
        self.width
    }

    pub fn costs(&self) -> &CostSet {
        &self.costs
    }

    /// Scan `cands` against `query`, appending `(id, distance)` for every
    /// candidate within the resolution. Output order follows input order.
    ///
    /// Candidates whose length differs from the query by more than the
    /// resolution are screened out here, before they reach the band.
    pub fn scan(
        &self,
        query: &[u8],
        cands: &[(u32, &[u8])],
        ws: &mut KernelWorkspace,
        hits: &mut Vec<(u32, u32)>,
    ) {
        let lanes = self.width.lanes();
        let d = self.resolution as usize;

        let mut batch_ids = [0u32; 16];
        let mut batch_seqs: [&[u8]; 16] = [&[]; 16];
        let mut fill = 0usize;

        for &(id, seq) in cands {
            if seq.len().abs_diff(query.len()) > d {
                continue;
            }
            batch_ids[fill] = id;
            batch_seqs[fill] = seq;
            fill += 1;
            if fill == lanes {
                self.flush(query, &batch_ids[..fill], &batch_seqs[..fill], ws, hits);
                fill = 0;
            }
        }
        if fill > 0 {
            self.flush(query, &batch_ids[..fill], &batch_seqs[..fill], ws, hits);
        }
    }

    fn flush(
        &self,
        query: &[u8],
        ids: &[u32],
        seqs: &[&[u8]],
        ws: &mut KernelWorkspace,
        hits: &mut Vec<(u32, u32)>,
    ) {
        ws.results.clear();
        ws.results.resize(seqs.len(), None);
        match self.width {
            LaneWidth::B8 => engine::scan_batch_b8(
                query,
                seqs,
                &self.costs,
                self.resolution,
                self.bound,
                &mut ws.b8,
                &mut ws.results,
            ),
            LaneWidth::B16 => engine::scan_batch_b16(
                query,
                seqs,
                &self.costs,
                self.resolution,
                self.bound,
                &mut ws.b16,
                &mut ws.results,
            ),
        }
        for (l, res) in ws.results.iter().enumerate() {
            if let Some(dist) = res {
                hits.push((ids[l], *dist));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> CostSet {
        CostSet::reduce(9, 12, 7)
    }

    #[test]
    fn default_costs_stay_in_eight_bits() {
        // d = 1: bound 19, need 39
        assert_eq!(choose_lane_width(&defaults(), 1).unwrap(), LaneWidth::B8);
        // d = 12 is the last resolution that fits: need 12 * 19 + 20 = 248
        assert_eq!(choose_lane_width(&defaults(), 12).unwrap(), LaneWidth::B8);
        assert_eq!(choose_lane_width(&defaults(), 13).unwrap(), LaneWidth::B16);
    }

    #[test]
    fn extreme_penalties_are_rejected() {
        let c = CostSet::reduce(70_000, 1, 1);
        assert!(choose_lane_width(&c, 1).is_err());
    }

    fn enc(s: &str) -> Vec<u8> {
        s.bytes()
            .map(|b| match b {
                b'A' => 0,
                b'C' => 1,
                b'G' => 2,
                b'T' => 3,
                _ => panic!("bad test base"),
            })
            .collect()
    }

    #[test]
    fn scan_screens_batches_and_reports_in_order() {
        let kernel = DistanceKernel::new(defaults(), 1).unwrap();
        let q = enc("ACGTACGT");
        let near = enc("ACGTACGA");
        let same = enc("ACGTACGT");
        let short = enc("ACG");
        let far = enc("TTTTTTTT");

        // 21 candidates forces a second batch at 16 lanes.
        let mut cands: Vec<(u32, &[u8])> = Vec::new();
        for i in 0..18 {
            cands.push((i, same.as_slice()));
        }
        cands.push((100, near.as_slice()));
        cands.push((101, short.as_slice()));
        cands.push((102, far.as_slice()));

        let mut ws = KernelWorkspace::default();
        let mut hits = Vec::new();
        kernel.scan(&q, &cands, &mut ws, &mut hits);

        let mut expect: Vec<(u32, u32)> = (0..18).map(|i| (i, 0)).collect();
        expect.push((100, 1));
        assert_eq!(hits, expect);
    }

    #[test]
    fn sixteen_bit_width_scans_too() {
        let c = defaults();
        let kernel = DistanceKernel::new(c, 13).unwrap();
        assert_eq!(kernel.width(), LaneWidth::B16);

        let q = enc("ACGTACGTACGTACGT");
        let m = enc("ACGTACGTACGTACGA");
        let cands = vec![(7u32, m.as_slice())];
        let mut ws = KernelWorkspace::default();
        let mut hits = Vec::new();
        kernel.scan(&q, &cands, &mut ws, &mut hits);
        assert_eq!(hits, vec![(7, 1)]);
    }
}
