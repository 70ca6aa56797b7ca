use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use trifront::Kernel;
use trifront::parallel::ParallelKernel;
use trifront::sequential::SequentialKernel;
use trifront::store::TriangularStore;

fn benchmark_fill(c: &mut Criterion) {
    let sizes = [64_usize, 128, 256];
    let parallel = ParallelKernel::new(0).expect("worker pool");

    let mut group = c.benchmark_group("wavefront_fill");
    for &size in &sizes {
        // Entries computed above the diagonal.
        let cells = (size * (size - 1) / 2) as u64;
        group.throughput(Throughput::Elements(cells));

        group.bench_with_input(BenchmarkId::new("sequential", size), &size, |b, &n| {
            b.iter(|| {
                let mut store = TriangularStore::new(n).expect("store");
                SequentialKernel.fill(&mut store).expect("fill");
                black_box(store.read(0, n - 1));
            });
        });

        group.bench_with_input(BenchmarkId::new("parallel", size), &size, |b, &n| {
            b.iter(|| {
                let mut store = TriangularStore::new(n).expect("store");
                parallel.fill(&mut store).expect("fill");
                black_box(store.read(0, n - 1));
            });
        });
    }
    group.finish();
}

criterion_group!(wavefront, benchmark_fill);
criterion_main!(wavefront);
