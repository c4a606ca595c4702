//! Score-to-cost conversion for the distance engines.
//!
//! The CLI speaks the alignment-score dialect (match reward, mismatch and
//! gap penalties). The distance engines work in pure edit costs: a match is
//! free and every difference has a positive integer price. The conversion
//! folds the match reward into the difference prices, then divides the
//! triple by its greatest common divisor so the values stay small enough
//! for narrow vector lanes.

use anyhow::{bail, Result};

/// Normalized edit-cost triple plus the divisor that was applied.
///
/// Invariants: `mismatch >= 1` and `gap_extend >= 1` always hold after
/// construction; `gap_open` may be zero (a purely linear gap price).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostSet {
    /// Cost of aligning two different nucleotides.
    pub mismatch: u32,
    /// One-time cost of starting a gap.
    pub gap_open: u32,
    /// Cost of each gapped nucleotide.
    pub gap_extend: u32,
    /// Greatest common divisor removed from the raw triple.
    pub divisor: u32,
}

impl CostSet {
    /// Derive the cost triple from user-facing scores.
    ///
    /// `mismatch_score` is the stored (negative) value, not the positive
    /// penalty given on the command line. The sign and range rules are
    /// enforced by the CLI layer; they are re-checked here because a
    /// degenerate cost set would corrupt every distance the engines report.
    pub fn from_scores(
        match_reward: i64,
        mismatch_score: i64,
        gap_open_score: i64,
        gap_extend_score: i64,
    ) -> Result<Self> {
        if match_reward < 1 {
            bail!("illegal match reward {match_reward} (must be >= 1)");
        }
        if mismatch_score > -1 {
            bail!("illegal mismatch score {mismatch_score} (must be <= -1)");
        }
        if gap_open_score < 0 || gap_extend_score < 0 || gap_open_score + gap_extend_score < 1 {
            bail!("illegal gap penalties {gap_open_score}/{gap_extend_score} (must be >= 0 and open + extend >= 1)");
        }

        let mismatch = 2 * match_reward - 2 * mismatch_score;
        let gap_open = 2 * gap_open_score;
        let gap_extend = 2 * match_reward + gap_extend_score;

        if mismatch > i64::from(u32::MAX) || gap_open > i64::from(u32::MAX) {
            bail!("scores too large for 32-bit cost arithmetic");
        }

        Ok(Self::reduce(
            mismatch as u64,
            gap_open as u64,
            gap_extend as u64,
        ))
    }

    /// Divide a raw cost triple by its greatest common divisor.
    ///
    /// An already-minimal triple comes back unchanged with `divisor == 1`.
    pub fn reduce(mismatch: u64, gap_open: u64, gap_extend: u64) -> Self {
        assert!(
            mismatch >= 1 && gap_extend >= 1,
            "degenerate cost triple {mismatch}/{gap_open}/{gap_extend}"
        );
        let divisor = gcd(gcd(mismatch, gap_open), gap_extend);
        CostSet {
            mismatch: (mismatch / divisor) as u32,
            gap_open: (gap_open / divisor) as u32,
            gap_extend: (gap_extend / divisor) as u32,
            divisor: divisor as u32,
        }
    }

    /// Largest cost a single difference can contribute: a mismatch, or the
    /// first nucleotide of a fresh gap.
    pub fn max_single_diff(&self) -> u32 {
        self.mismatch.max(self.gap_open + self.gap_extend)
    }

    /// Upper bound on the cost of any alignment with at most `d`
    /// differences. Cells above this bound can never be part of a linking
    /// alignment.
    pub fn link_bound(&self, d: u32) -> u64 {
        u64::from(d) * u64::from(self.max_single_diff())
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scores_reduce_to_minimal_triple() {
        // match 5, mismatch -4, gap open 12, gap extend 4
        let costs = CostSet::from_scores(5, -4, 12, 4).unwrap();
        assert_eq!(costs.mismatch, 9);
        assert_eq!(costs.gap_open, 12);
        assert_eq!(costs.gap_extend, 7);
        assert_eq!(costs.divisor, 2);
    }

    #[test]
    fn reduce_is_idempotent_on_minimal_triples() {
        let costs = CostSet::reduce(9, 12, 7);
        assert_eq!(costs.divisor, 1);
        assert_eq!((costs.mismatch, costs.gap_open, costs.gap_extend), (9, 12, 7));

        let again = CostSet::reduce(
            u64::from(costs.mismatch),
            u64::from(costs.gap_open),
            u64::from(costs.gap_extend),
        );
        assert_eq!(again, costs);
    }

    #[test]
    fn zero_gap_open_is_accepted() {
        let costs = CostSet::from_scores(1, -1, 0, 1).unwrap();
        assert_eq!(costs.mismatch, 4);
        assert_eq!(costs.gap_open, 0);
        assert_eq!(costs.gap_extend, 3);
        assert_eq!(costs.divisor, 1);
    }

    #[test]
    fn common_factor_is_removed() {
        let costs = CostSet::reduce(18, 24, 14);
        assert_eq!(costs.divisor, 2);
        assert_eq!((costs.mismatch, costs.gap_open, costs.gap_extend), (9, 12, 7));
    }

    #[test]
    fn illegal_scores_are_rejected() {
        assert!(CostSet::from_scores(0, -4, 12, 4).is_err());
        assert!(CostSet::from_scores(5, 0, 12, 4).is_err());
        assert!(CostSet::from_scores(5, -4, -1, 4).is_err());
        assert!(CostSet::from_scores(5, -4, 0, 0).is_err());
    }

    #[test]
    fn link_bound_uses_the_most_expensive_difference() {
        let costs = CostSet::reduce(9, 12, 7);
        // a fresh gap nucleotide (12 + 7) outprices a mismatch (9)
        assert_eq!(costs.max_single_diff(), 19);
        assert_eq!(costs.link_bound(3), 57);
    }

    #[test]
    fn gcd_basics() {
        assert_eq!(gcd(18, 24), 6);
        assert_eq!(gcd(4, 0), 4);
        assert_eq!(gcd(0, 4), 4);
        assert_eq!(gcd(7, 13), 1);
    }
}
