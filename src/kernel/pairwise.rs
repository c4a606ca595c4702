//! Scalar pairwise alignment with full traceback.
//!
//! The lane kernel answers "how many differences, if few enough"; this
//! module answers "which differences". It shares the cost model and every
//! tie-breaking rule with the kernel, so its difference counts are the
//! reference the vector paths are tested against, and its traceback yields
//! the aligned length and CIGAR string the uclust writer needs.

use crate::score::CostSet;

const INF: u64 = u64::MAX;

// Source of an h cell, low two bits of a traceback entry.
const FROM_M: u8 = 0;
const FROM_E: u8 = 1;
const FROM_F: u8 = 2;
const H_MASK: u8 = 0b0011;
// Gap-state cells additionally record whether they extend a running gap.
const E_EXT: u8 = 0b0100;
const F_EXT: u8 = 0b1000;

/// A finished global alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    /// Total cost under the normalized triple.
    pub cost: u64,
    /// Differences along the optimal path: mismatches plus gapped
    /// nucleotides.
    pub diffs: u32,
    /// Number of alignment columns.
    pub length: u32,
    /// Run-length CIGAR over M/I/D; counts of one are omitted.
    pub cigar: String,
}

/// Align `query` (CIGAR I side) against `target` (CIGAR D side).
///
/// Both sequences must be non-empty and 2-bit encoded.
pub fn align(query: &[u8], target: &[u8], costs: &CostSet) -> Alignment {
    assert!(!query.is_empty() && !target.is_empty());

    let qlen = query.len();
    let tlen = target.len();
    let cols = qlen + 1;

    let ge = u64::from(costs.gap_extend);
    let oe = u64::from(costs.gap_open) + ge;
    let mm = u64::from(costs.mismatch);

    let mut h = vec![0u64; cols];
    let mut f = vec![INF; cols];
    let mut tb = vec![0u8; (tlen + 1) * cols];

    for j in 1..=qlen {
        h[j] = u64::from(costs.gap_open) + j as u64 * ge;
        tb[j] = FROM_E | if j >= 2 { E_EXT } else { 0 };
    }

    for i in 1..=tlen {
        let row = i * cols;
        let mut hdiag = h[0];
        h[0] = u64::from(costs.gap_open) + i as u64 * ge;
        f[0] = h[0];
        tb[row] = FROM_F | if i >= 2 { F_EXT } else { 0 };

        let mut e = INF;
        let mut h_left = h[0];

        for j in 1..=qlen {
            let up = h[j];
            let f_ext = f[j].saturating_add(ge);
            let f_open = up.saturating_add(oe);
            let (f_new, f_flag) = if f_ext <= f_open {
                (f_ext, F_EXT)
            } else {
                (f_open, 0)
            };

            let e_ext = e.saturating_add(ge);
            let e_open = h_left.saturating_add(oe);
            let (e_new, e_flag) = if e_ext <= e_open {
                (e_ext, E_EXT)
            } else {
                (e_open, 0)
            };

            let m = hdiag.saturating_add(if query[j - 1] == target[i - 1] { 0 } else { mm });

            // Same preference order as the lane kernel: diagonal first,
            // then the horizontal gap.
            let (best, src) = if m <= e_new && m <= f_new {
                (m, FROM_M)
            } else if e_new <= f_new {
                (e_new, FROM_E)
            } else {
                (f_new, FROM_F)
            };

            tb[row + j] = src | e_flag | f_flag;
            hdiag = up;
            h[j] = best;
            f[j] = f_new;
            e = e_new;
            h_left = best;
        }
    }

    let cost = h[qlen];
    let (diffs, length, cigar) = walk_back(query, target, &tb, cols);
    Alignment {
        cost,
        diffs,
        length,
        cigar,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    H,
    E,
    F,
}

fn walk_back(query: &[u8], target: &[u8], tb: &[u8], cols: usize) -> (u32, u32, String) {
    let mut ops: Vec<u8> = Vec::with_capacity(query.len() + target.len());
    let mut diffs = 0u32;
    let mut i = target.len();
    let mut j = query.len();
    let mut state = State::H;

    while i > 0 || j > 0 {
        let cell = tb[i * cols + j];
        match state {
            State::H => {
                state = match cell & H_MASK {
                    FROM_E => State::E,
                    FROM_F => State::F,
                    _ => {
                        if query[j - 1] != target[i - 1] {
                            diffs += 1;
                        }
                        ops.push(b'M');
                        i -= 1;
                        j -= 1;
                        State::H
                    }
                };
            }
            State::E => {
                ops.push(b'I');
                diffs += 1;
                let extending = cell & E_EXT != 0;
                j -= 1;
                if !extending {
                    state = State::H;
                }
            }
            State::F => {
                ops.push(b'D');
                diffs += 1;
                let extending = cell & F_EXT != 0;
                i -= 1;
                if !extending {
                    state = State::H;
                }
            }
        }
    }

    ops.reverse();
    let length = ops.len() as u32;

    let mut cigar = String::new();
    let mut run = 0usize;
    let mut current = 0u8;
    for &op in ops.iter().chain(std::iter::once(&0u8)) {
        if op == current {
            run += 1;
        } else {
            if run > 1 {
                cigar.push_str(&run.to_string());
            }
            if current != 0 {
                cigar.push(current as char);
            }
            current = op;
            run = 1;
        }
    }

    (diffs, length, cigar)
}
