//! Lane-parallel banded distance computation.
//!
//! One batch call aligns a single query against up to `LANES` candidate
//! sequences at once. Candidates live one per lane in a structure-of-arrays
//! layout: row `i` of the SoA block holds nucleotide `i` of every candidate,
//! so each DP cell update is one vector operation across all candidates.
//!
//! The DP is a cost-minimizing affine-gap global alignment restricted to a
//! band of half-width `d` around the main diagonal. Alongside each cost the
//! kernel carries the difference count of the path that produced it, so a
//! finished lane yields the edit distance directly instead of a raw score.
//! A lane dies early when every in-band cell of its current row exceeds the
//! link bound, or when its final cell is reached.
//!
//! Callers must pre-screen candidates to `|candidate len - query len| <= d`;
//! a longer length gap can never link and would fall outside the band.

use super::simd::{LaneElem, LaneOps};
#[cfg(target_arch = "x86_64")]
use super::simd::{Sse2B16, Sse2B8};
#[cfg(not(target_arch = "x86_64"))]
use super::simd::{PortableB16, PortableB8};
use crate::score::CostSet;

/// Largest lane count any engine exposes.
const MAX_LANES: usize = 16;

/// Reusable DP state for one element width. Row buffers are laid out
/// `(qlen + 1) * LANES`, the candidate block `max_tlen * LANES`.
#[derive(Debug, Default)]
pub struct BandBuffers<T> {
    h: Vec<T>,
    h_diff: Vec<T>,
    f: Vec<T>,
    f_diff: Vec<T>,
    soa: Vec<T>,
    spill: Vec<T>,
}

/// Run one batch. `results[l]` becomes `Some(distance)` when candidate `l`
/// links within `d` differences, `None` otherwise.
fn batch_scan<E: LaneOps>(
    query: &[u8],
    cands: &[&[u8]],
    costs: &CostSet,
    d: u32,
    bound: u64,
    buf: &mut BandBuffers<E::Elem>,
    results: &mut [Option<u32>],
) {
    let lanes = E::LANES;
    assert!(lanes <= MAX_LANES);
    assert!(!cands.is_empty() && cands.len() <= lanes);
    assert_eq!(results.len(), cands.len());
    assert!(!query.is_empty());

    let qlen = query.len();
    let dd = d as usize;
    let max_tlen = cands.iter().map(|c| c.len()).max().unwrap_or(0);
    for cand in cands {
        debug_assert!(!cand.is_empty());
        debug_assert!(cand.len().abs_diff(qlen) <= dd, "candidate not pre-screened");
    }

    let inf = E::Elem::MAX;
    let ge_u64 = u64::from(costs.gap_extend);
    let go_u64 = u64::from(costs.gap_open);

    let v_ge = E::splat(E::Elem::sat_from_u64(ge_u64));
    let v_oe = E::splat(E::Elem::sat_from_u64(go_u64 + ge_u64));
    let v_mm = E::splat(E::Elem::sat_from_u64(u64::from(costs.mismatch)));
    let v_one = E::splat(E::Elem::from_u8(1));
    let v_zero = E::splat(E::Elem::from_u8(0));
    let v_inf = E::splat(inf);

    // Row buffers start unreachable; the in-band slice of row 0 is the only
    // seeded region.
    let row_len = (qlen + 1) * lanes;
    buf.h.clear();
    buf.h.resize(row_len, inf);
    buf.h_diff.clear();
    buf.h_diff.resize(row_len, E::Elem::default());
    buf.f.clear();
    buf.f.resize(row_len, inf);
    buf.f_diff.clear();
    buf.f_diff.resize(row_len, E::Elem::default());

    for j in 0..=dd.min(qlen) {
        let cost = if j == 0 {
            E::Elem::default()
        } else {
            E::Elem::sat_from_u64(go_u64 + j as u64 * ge_u64)
        };
        let diff = E::Elem::sat_from_u64(j as u64);
        buf.h[j * lanes..(j + 1) * lanes].fill(cost);
        buf.h_diff[j * lanes..(j + 1) * lanes].fill(diff);
    }

    // Candidate block; the pad value can never equal an encoded nucleotide.
    buf.soa.clear();
    buf.soa.resize(max_tlen * lanes, inf);
    for (l, cand) in cands.iter().enumerate() {
        for (i, &base) in cand.iter().enumerate() {
            buf.soa[i * lanes + l] = E::Elem::from_u8(base);
        }
    }

    buf.spill.clear();
    buf.spill.resize(lanes, E::Elem::default());

    for r in results.iter_mut() {
        *r = None;
    }
    let mut done = [false; MAX_LANES];
    for flag in done.iter_mut().take(lanes).skip(cands.len()) {
        *flag = true;
    }
    let mut open_lanes = cands.len();

    for i in 1..=max_tlen {
        if open_lanes == 0 {
            break;
        }

        let lo = i.saturating_sub(dd).max(1);
        let hi = (i + dd).min(qlen);
        debug_assert!(lo <= hi);

        let prev_col = lo - 1;
        // Diagonal seed comes from the previous row, so load before this
        // row's left-edge cell overwrites the slot.
        let mut hdiag = E::load(&buf.h[prev_col * lanes..]);
        let mut hdiag_d = E::load(&buf.h_diff[prev_col * lanes..]);

        let mut h_left;
        let mut h_left_d;
        if prev_col == 0 && i <= dd {
            let cost = E::Elem::sat_from_u64(go_u64 + i as u64 * ge_u64);
            let diff = E::Elem::sat_from_u64(i as u64);
            h_left = E::splat(cost);
            h_left_d = E::splat(diff);
            buf.h[..lanes].fill(cost);
            buf.h_diff[..lanes].fill(diff);
            buf.f[..lanes].fill(cost);
            buf.f_diff[..lanes].fill(diff);
        } else {
            h_left = v_inf;
            h_left_d = v_zero;
            let s = prev_col * lanes;
            buf.h[s..s + lanes].fill(inf);
            buf.f[s..s + lanes].fill(inf);
        }

        let mut e = v_inf;
        let mut e_d = v_zero;
        let mut rowmin = v_inf;
        let cand_row = E::load(&buf.soa[(i - 1) * lanes..]);

        for j in lo..=hi {
            let s = j * lanes;
            let up = E::load(&buf.h[s..]);
            let up_d = E::load(&buf.h_diff[s..]);
            let f_prev = E::load(&buf.f[s..]);
            let f_prev_d = E::load(&buf.f_diff[s..]);

            // Vertical gap: consume a candidate nucleotide. Ties keep the
            // running gap open.
            let f_ext = E::adds(f_prev, v_ge);
            let f_open = E::adds(up, v_oe);
            let f_new = E::min(f_ext, f_open);
            let f_from_ext = E::cmpeq(f_new, f_ext);
            let f_new_d = E::adds(E::select(f_from_ext, f_prev_d, up_d), v_one);

            // Horizontal gap: consume a query nucleotide.
            let e_ext = E::adds(e, v_ge);
            let e_open = E::adds(h_left, v_oe);
            let e_new = E::min(e_ext, e_open);
            let e_from_ext = E::cmpeq(e_new, e_ext);
            let e_new_d = E::adds(E::select(e_from_ext, e_d, h_left_d), v_one);

            // Diagonal step.
            let q = E::splat(E::Elem::from_u8(query[j - 1]));
            let is_match = E::cmpeq(cand_row, q);
            let m = E::adds(hdiag, E::select(is_match, v_zero, v_mm));
            let m_d = E::adds(hdiag_d, E::select(is_match, v_zero, v_one));

            // Cheapest source wins; ties prefer the diagonal, then the
            // horizontal gap. The scalar reference mirrors this order.
            let best = E::min(m, E::min(e_new, f_new));
            let take_m = E::cmpeq(best, m);
            let take_e = E::cmpeq(best, e_new);
            let best_d = E::select(take_m, m_d, E::select(take_e, e_new_d, f_new_d));

            hdiag = up;
            hdiag_d = up_d;
            h_left = best;
            h_left_d = best_d;
            e = e_new;
            e_d = e_new_d;

            E::store(best, &mut buf.h[s..]);
            E::store(best_d, &mut buf.h_diff[s..]);
            E::store(f_new, &mut buf.f[s..]);
            E::store(f_new_d, &mut buf.f_diff[s..]);

            // Only h and f can feed the next row.
            rowmin = E::min(rowmin, E::min(best, f_new));
        }

        // Lanes ending on this row read their result from the last column.
        for (l, cand) in cands.iter().enumerate() {
            if !done[l] && cand.len() == i {
                let cost = buf.h[qlen * lanes + l].to_u64();
                let diffs = buf.h_diff[qlen * lanes + l].to_u64();
                if cost <= bound && diffs <= u64::from(d) {
                    results[l] = Some(diffs as u32);
                }
                done[l] = true;
                open_lanes -= 1;
            }
        }

        // Lanes whose whole band row went over the bound can never link.
        E::store(rowmin, &mut buf.spill);
        for l in 0..cands.len() {
            if !done[l] && buf.spill[l].to_u64() > bound {
                done[l] = true;
                open_lanes -= 1;
            }
        }
    }
}

pub(super) fn scan_batch_b8(
    query: &[u8],
    cands: &[&[u8]],
    costs: &CostSet,
    d: u32,
    bound: u64,
    buf: &mut BandBuffers<u8>,
    results: &mut [Option<u32>],
) {
    #[cfg(target_arch = "x86_64")]
    batch_scan::<Sse2B8>(query, cands, costs, d, bound, buf, results);
    #[cfg(not(target_arch = "x86_64"))]
    batch_scan::<PortableB8>(query, cands, costs, d, bound, buf, results);
}

pub(super) fn scan_batch_b16(
    query: &[u8],
    cands: &[&[u8]],
    costs: &CostSet,
    d: u32,
    bound: u64,
    buf: &mut BandBuffers<u16>,
    results: &mut [Option<u32>],
) {
    #[cfg(target_arch = "x86_64")]
    batch_scan::<Sse2B16>(query, cands, costs, d, bound, buf, results);
    #[cfg(not(target_arch = "x86_64"))]
    batch_scan::<PortableB16>(query, cands, costs, d, bound, buf, results);
}
