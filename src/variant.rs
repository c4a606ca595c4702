//! Unit-distance engine: the resolution-1 fast path.
//!
//! At resolution 1 a pair links only when one sequence is the other with a
//! single nucleotide substituted, deleted, or inserted, or when the two are
//! identical. Instead of aligning a query against every candidate, this
//! engine enumerates the query's one-edit neighborhood (3L substitutions, L
//! deletions, 4(L+1) insertions) and probes each variant in an exact-match
//! index built once over the whole database. Work per query is linear in
//! sequence length, independent of database size.

use rustc_hash::FxHashMap;

use crate::db::Database;

/// Exact-sequence index over a database. Buckets hold record ids in
/// ascending order; identical sequences share a bucket.
pub struct SequenceIndex<'a> {
    map: FxHashMap<&'a [u8], Vec<u32>>,
}

impl<'a> SequenceIndex<'a> {
    pub fn build(db: &'a Database) -> Self {
        let mut map: FxHashMap<&'a [u8], Vec<u32>> = FxHashMap::default();
        map.reserve(db.len());
        for id in 0..db.len() as u32 {
            map.entry(db.seq(id)).or_default().push(id);
        }
        SequenceIndex { map }
    }

    fn probe(&self, key: &[u8], skip: u32, distance: u32, hits: &mut Vec<(u32, u32)>) {
        if let Some(bucket) = self.map.get(key) {
            for &id in bucket {
                if id != skip {
                    hits.push((id, distance));
                }
            }
        }
    }

    /// Append `(id, distance)` for every database record within one edit of
    /// `query`, ascending by id. Exact duplicates report distance 0, the
    /// query's own record is omitted. `scratch` is reusable variant storage.
    pub fn unit_hits(
        &self,
        query: &[u8],
        query_id: u32,
        scratch: &mut Vec<u8>,
        hits: &mut Vec<(u32, u32)>,
    ) {
        let start = hits.len();

        // Distance 0: identical sequences share the query's own bucket.
        self.probe(query, query_id, 0, hits);

        // Substitutions. A variant differs from the query, so its bucket can
        // never contain query_id and no skip test is needed past this point.
        scratch.clear();
        scratch.extend_from_slice(query);
        for p in 0..query.len() {
            let original = scratch[p];
            for base in 0..4u8 {
                if base != original {
                    scratch[p] = base;
                    self.probe(scratch, query_id, 1, hits);
                }
            }
            scratch[p] = original;
        }

        // Deletions.
        for p in 0..query.len() {
            scratch.clear();
            scratch.extend_from_slice(&query[..p]);
            scratch.extend_from_slice(&query[p + 1..]);
            self.probe(scratch, query_id, 1, hits);
        }

        // Insertions.
        for p in 0..=query.len() {
            for base in 0..4u8 {
                scratch.clear();
                scratch.extend_from_slice(&query[..p]);
                scratch.push(base);
                scratch.extend_from_slice(&query[p..]);
                self.probe(scratch, query_id, 1, hits);
            }
        }

        // The same record is reachable through several variants (inserting
        // into a homopolymer, for one); report it once.
        hits[start..].sort_unstable();
        let mut keep = start;
        for i in start..hits.len() {
            if keep == start || hits[keep - 1].0 != hits[i].0 {
                hits[keep] = hits[i];
                keep += 1;
            }
        }
        hits.truncate(keep);
    }
}
