use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use logscout::{Analyzer, PartitionedAnalysisEngine, RecursiveAnalysisEngine};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

fn create_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 6 {
            0 => format!("2024-05-01 ERROR worker {} failed: error code {}", i, i % 17),
            1 => String::new(),
            _ => format!("2024-05-01 INFO request {} served in {}ms", i, i % 250),
        })
        .collect()
}

fn bench_strategies(c: &mut Criterion) {
    let analyzer = Analyzer::new("error", false).expect("valid keyword");
    let threads = NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN);

    let mut group = c.benchmark_group("large_file_strategies");
    group.sample_size(20);

    for count in [10_000usize, 200_000] {
        let lines = create_lines(count);
        let shared: Arc<[String]> = lines.clone().into();

        let partitioned =
            PartitionedAnalysisEngine::new(analyzer.clone(), threads, Duration::from_secs(60));
        group.bench_with_input(BenchmarkId::new("partitioned", count), &shared, |b, lines| {
            b.iter(|| black_box(partitioned.analyze(Arc::clone(lines))))
        });

        for threshold in [500usize, 5_000] {
            let recursive = RecursiveAnalysisEngine::new(
                analyzer.clone(),
                NonZeroUsize::new(threshold).unwrap_or(NonZeroUsize::MIN),
                threads,
            );
            group.bench_with_input(
                BenchmarkId::new(format!("recursive_t{}", threshold), count),
                &lines,
                |b, lines| b.iter(|| black_box(recursive.analyze(lines))),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
