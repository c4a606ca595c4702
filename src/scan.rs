//! Parallel frontier scanning.
//!
//! Each clustering round compares one generation of newly linked records
//! (the frontier) against everything still unassigned and produces claims:
//! child, claiming parent, distance. The claim set is a pure function of
//! the frontier and the database ordering. Work is split over rayon by
//! fixed ranges and every range consults the complete frontier, so chunk
//! boundaries cannot change any outcome and results are identical for any
//! thread count.
//!
//! When several frontier records link the same child, the one with the
//! lowest record index claims it. Frontiers are scanned in ascending index
//! order, which makes "first claim wins" implement exactly that rule.

use std::cell::RefCell;

use rayon::prelude::*;

use crate::cluster::UNASSIGNED;
use crate::db::Database;
use crate::kernel::{DistanceKernel, KernelWorkspace};
use crate::variant::SequenceIndex;

/// One resolved link: `parent` was the lowest-indexed frontier record
/// within the resolution of `child`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub child: u32,
    pub parent: u32,
    pub distance: u32,
}

/// Per-thread scratch shared by both engines. Buffers grow to the working
/// set once and are reused for every later round on the same worker.
#[derive(Default)]
struct ScanWorkspace {
    lanes: KernelWorkspace,
    variant: Vec<u8>,
    hits: Vec<(u32, u32)>,
}

thread_local! {
    static SCAN_WORKSPACE: RefCell<ScanWorkspace> = RefCell::new(ScanWorkspace::default());
}

fn with_scan_workspace<F, R>(f: F) -> R
where
    F: FnOnce(&mut ScanWorkspace) -> R,
{
    SCAN_WORKSPACE.with(|ws| f(&mut ws.borrow_mut()))
}

fn chunk_len(total: usize) -> usize {
    total.div_ceil(rayon::current_num_threads()).max(1)
}

/// Scan one round with the alignment kernel.
///
/// `frontier` and `pending` are ascending record ids; `pending` holds every
/// record still unassigned. Returns claims sorted by parent, then child,
/// one claim per child.
pub fn kernel_round(
    db: &Database,
    kernel: &DistanceKernel,
    frontier: &[u32],
    pending: &[u32],
    no_valley: bool,
) -> Vec<Claim> {
    if frontier.is_empty() || pending.is_empty() {
        return Vec::new();
    }

    let mut claims: Vec<Claim> = pending
        .par_chunks(chunk_len(pending.len()))
        .flat_map_iter(|range| kernel_range(db, kernel, frontier, range, no_valley))
        .collect();
    claims.sort_unstable_by_key(|c| (c.parent, c.child));
    claims
}

fn kernel_range(
    db: &Database,
    kernel: &DistanceKernel,
    frontier: &[u32],
    range: &[u32],
    no_valley: bool,
) -> Vec<Claim> {
    let mut live: Vec<(u32, &[u8])> = range.iter().map(|&id| (id, db.seq(id))).collect();
    let mut claimed: Vec<u32> = Vec::new();
    let mut out = Vec::new();

    for &parent in frontier {
        if live.is_empty() {
            break;
        }
        let parent_ab = db.abundance(parent);
        claimed.clear();
        with_scan_workspace(|ws| {
            ws.hits.clear();
            kernel.scan(db.seq(parent), &live, &mut ws.lanes, &mut ws.hits);
            for &(child, distance) in &ws.hits {
                if !no_valley || db.abundance(child) <= parent_ab {
                    out.push(Claim {
                        child,
                        parent,
                        distance,
                    });
                    claimed.push(child);
                }
            }
        });
        if !claimed.is_empty() {
            // hits follow live order, so claimed is ascending
            live.retain(|&(id, _)| claimed.binary_search(&id).is_err());
        }
    }
    out
}

/// Scan one round with the unit-distance engine.
///
/// The index covers the whole database, so hits are filtered against the
/// assignment snapshot taken before the round. Same ordering contract as
/// [`kernel_round`].
pub fn unit_round(
    db: &Database,
    index: &SequenceIndex<'_>,
    frontier: &[u32],
    assignment: &[u32],
    no_valley: bool,
) -> Vec<Claim> {
    if frontier.is_empty() {
        return Vec::new();
    }

    let mut claims: Vec<Claim> = frontier
        .par_chunks(chunk_len(frontier.len()))
        .flat_map_iter(|parents| unit_range(db, index, parents, assignment, no_valley))
        .collect();

    // Unlike the kernel path, parents race for the same child here; keep
    // the lowest parent per child.
    claims.sort_unstable_by_key(|c| (c.child, c.parent));
    claims.dedup_by_key(|c| c.child);
    claims.sort_unstable_by_key(|c| (c.parent, c.child));
    claims
}

fn unit_range(
    db: &Database,
    index: &SequenceIndex<'_>,
    parents: &[u32],
    assignment: &[u32],
    no_valley: bool,
) -> Vec<Claim> {
    let mut out = Vec::new();
    for &parent in parents {
        let parent_ab = db.abundance(parent);
        with_scan_workspace(|ws| {
            ws.hits.clear();
            index.unit_hits(db.seq(parent), parent, &mut ws.variant, &mut ws.hits);
            for &(child, distance) in &ws.hits {
                if assignment[child as usize] == UNASSIGNED
                    && (!no_valley || db.abundance(child) <= parent_ab)
                {
                    out.push(Claim {
                        child,
                        parent,
                        distance,
                    });
                }
            }
        });
    }
    out
}
