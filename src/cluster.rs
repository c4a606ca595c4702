//! Greedy single-linkage clustering.
//!
//! Records are visited in database order, most abundant first. Each still
//! unassigned record seeds a new swarm and the swarm grows breadth-first:
//! every round compares the previous round's recruits against all
//! unassigned records and links those within the resolution. A child is
//! always credited to the lowest-indexed linking parent, so the full
//! partition, the link graph, and every derived statistic are independent
//! of thread count.
//!
//! The optional no-valley rule refuses links where the child is more
//! abundant than its claiming parent. Such a child can still seed its own
//! swarm later, which splits chains at abundance valleys.

use crate::db::Database;
use crate::kernel::DistanceKernel;
use crate::scan;
use crate::variant::SequenceIndex;

/// Assignment slot value for records no swarm has claimed yet.
pub const UNASSIGNED: u32 = u32::MAX;

/// One link in a swarm's discovery tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub parent: u32,
    pub child: u32,
    pub distance: u32,
    /// Child's generation: rounds from the seed.
    pub generation: u32,
}

/// A finished swarm. `members` and `edges` are in discovery order; the
/// seed is always `members[0]`.
#[derive(Debug, Clone)]
pub struct Swarm {
    pub seed: u32,
    pub members: Vec<u32>,
    pub edges: Vec<Edge>,
    pub total_abundance: u64,
    pub singletons: u64,
    pub max_generation: u32,
    /// Largest cumulated distance from the seed along the discovery tree.
    pub max_radius: u32,
}

impl Swarm {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// The linking backend for one run.
pub enum LinkEngine<'a> {
    /// Banded lane-parallel alignment, any resolution.
    Lanes(DistanceKernel),
    /// Variant enumeration over an exact index, resolution 1 only.
    Unit(SequenceIndex<'a>),
}

/// Partition the whole database into swarms.
pub fn cluster(db: &Database, engine: &LinkEngine<'_>, no_valley: bool) -> Vec<Swarm> {
    let n = db.len();
    let mut assignment = vec![UNASSIGNED; n];
    let mut radius = vec![0u32; n];
    let mut pending: Vec<u32> = Vec::with_capacity(n);
    let mut swarms: Vec<Swarm> = Vec::new();

    for seed in 0..n as u32 {
        if assignment[seed as usize] != UNASSIGNED {
            continue;
        }
        let swarm_id = swarms.len() as u32;
        assignment[seed as usize] = swarm_id;

        let mut members = vec![seed];
        let mut edges: Vec<Edge> = Vec::new();
        let mut frontier = vec![seed];
        let mut generation = 0u32;
        let mut max_radius = 0u32;

        while !frontier.is_empty() {
            let claims = match engine {
                LinkEngine::Lanes(kernel) => {
                    pending.clear();
                    pending.extend(
                        (0..n as u32).filter(|&id| assignment[id as usize] == UNASSIGNED),
                    );
                    scan::kernel_round(db, kernel, &frontier, &pending, no_valley)
                }
                LinkEngine::Unit(index) => {
                    scan::unit_round(db, index, &frontier, &assignment, no_valley)
                }
            };
            if claims.is_empty() {
                break;
            }

            generation += 1;
            frontier.clear();
            for claim in &claims {
                let child = claim.child as usize;
                assert_eq!(
                    assignment[child], UNASSIGNED,
                    "record {} claimed twice",
                    claim.child
                );
                assignment[child] = swarm_id;
                radius[child] = radius[claim.parent as usize] + claim.distance;
                max_radius = max_radius.max(radius[child]);
                members.push(claim.child);
                edges.push(Edge {
                    parent: claim.parent,
                    child: claim.child,
                    distance: claim.distance,
                    generation,
                });
                frontier.push(claim.child);
            }
            // next round must scan parents lowest-index first
            frontier.sort_unstable();
        }

        let total_abundance = members.iter().map(|&m| db.abundance(m)).sum();
        let singletons = members.iter().filter(|&&m| db.abundance(m) == 1).count() as u64;
        swarms.push(Swarm {
            seed,
            members,
            edges,
            total_abundance,
            singletons,
            max_generation: generation,
            max_radius,
        });
    }

    swarms
}
