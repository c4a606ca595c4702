use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use murmur::db::{AbundanceStyle, Database};
use murmur::kernel::{self, DistanceKernel, KernelWorkspace};
use murmur::score::CostSet;
use murmur::variant::SequenceIndex;

fn random_sequence(len: usize, rng: &mut StdRng) -> Vec<u8> {
    (0..len).map(|_| rng.gen_range(0..4u8)).collect()
}

/// Candidate pool around one query: mostly near variants (0..=2 edits),
/// the rest unrelated, the mix a clustering round actually sees.
fn candidate_pool(query: &[u8], count: usize, rng: &mut StdRng) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            if i % 4 == 3 {
                random_sequence(query.len(), rng)
            } else {
                let mut seq = query.to_vec();
                for _ in 0..rng.gen_range(0..=2) {
                    let p = rng.gen_range(0..seq.len());
                    seq[p] = (seq[p] + rng.gen_range(1..4u8)) % 4;
                }
                seq
            }
        })
        .collect()
}

fn bench_lane_scan(c: &mut Criterion) {
    let kernel = DistanceKernel::new(CostSet::reduce(9, 12, 7), 2).unwrap();
    let mut group = c.benchmark_group("lane_scan");

    for len in [100usize, 250, 500] {
        let mut rng = StdRng::seed_from_u64(len as u64);
        let query = random_sequence(len, &mut rng);
        let pool = candidate_pool(&query, 256, &mut rng);
        let cands: Vec<(u32, &[u8])> = pool
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s.as_slice()))
            .collect();

        let mut ws = KernelWorkspace::default();
        let mut hits = Vec::new();

        group.throughput(Throughput::Elements(cands.len() as u64));
        group.bench_with_input(BenchmarkId::new("256_candidates", len), &len, |b, _| {
            b.iter(|| {
                hits.clear();
                kernel.scan(black_box(&query), black_box(&cands), &mut ws, &mut hits);
                black_box(hits.len())
            })
        });
    }
    group.finish();
}

fn bench_scalar_align(c: &mut Criterion) {
    let costs = CostSet::reduce(9, 12, 7);
    let mut group = c.benchmark_group("scalar_align");

    for len in [100usize, 250] {
        let mut rng = StdRng::seed_from_u64(7 + len as u64);
        let query = random_sequence(len, &mut rng);
        let pool = candidate_pool(&query, 16, &mut rng);

        group.throughput(Throughput::Elements(pool.len() as u64));
        group.bench_with_input(BenchmarkId::new("16_pairs", len), &len, |b, _| {
            b.iter(|| {
                let mut total = 0u32;
                for seq in &pool {
                    total += kernel::align(black_box(seq), black_box(&query), &costs).diffs;
                }
                black_box(total)
            })
        });
    }
    group.finish();
}

fn bench_unit_index(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(99);
    let mut fasta = String::new();
    let core = random_sequence(150, &mut rng);
    for i in 0..2000 {
        let mut seq: Vec<u8> = core.clone();
        for _ in 0..rng.gen_range(0..=3) {
            let p = rng.gen_range(0..seq.len());
            seq[p] = (seq[p] + rng.gen_range(1..4u8)) % 4;
        }
        let text: String = seq.iter().map(|&b| "ACGT".as_bytes()[b as usize] as char).collect();
        fasta.push_str(&format!(">v{}_{}\n{}\n", i, rng.gen_range(1..50), text));
    }
    let db = Database::from_reader(fasta.as_bytes(), AbundanceStyle::Trailing).unwrap();

    let mut group = c.benchmark_group("unit_index");
    group.throughput(Throughput::Elements(db.len() as u64));
    group.bench_function("build", |b| {
        b.iter(|| black_box(SequenceIndex::build(black_box(&db))))
    });

    let index = SequenceIndex::build(&db);
    let mut scratch = Vec::new();
    let mut hits = Vec::new();
    group.throughput(Throughput::Elements(1));
    group.bench_function("probe_one_query", |b| {
        b.iter(|| {
            hits.clear();
            index.unit_hits(black_box(db.seq(0)), 0, &mut scratch, &mut hits);
            black_box(hits.len())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_lane_scan,
    bench_scalar_align,
    bench_unit_index
);
criterion_main!(benches);
