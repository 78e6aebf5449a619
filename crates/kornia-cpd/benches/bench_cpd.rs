use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use faer::Mat;
use kornia_cpd::{comparer::Comparer, DirectComparer, Nonrigid, Rigid, Runner, RunnerConfig};

fn random_points(num_points: usize, dims: usize) -> Mat<f64> {
    Mat::from_fn(num_points, dims, |_, _| rand::random::<f64>())
}

fn bench_direct_comparer(c: &mut Criterion) {
    let mut group = c.benchmark_group("direct_comparer");

    for num_points in [100, 500, 1000].iter() {
        group.throughput(criterion::Throughput::Elements((*num_points * *num_points) as u64));
        let parameter_string = format!("{}", num_points);

        let fixed = random_points(*num_points, 3);
        let moving = random_points(*num_points, 3);
        let comparer = DirectComparer::new();

        group.bench_with_input(
            BenchmarkId::new("compute", &parameter_string),
            &(&fixed, &moving),
            |b, i| {
                let (fixed, moving) = (i.0, i.1);
                b.iter(|| {
                    black_box(comparer.compute(fixed.as_ref(), moving.as_ref(), 0.1, 0.1));
                });
            },
        );
    }
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");
    group.sample_size(10);

    for num_points in [50, 200].iter() {
        let parameter_string = format!("{}", num_points);

        let moving = random_points(*num_points, 3);
        let fixed = Mat::from_fn(*num_points, 3, |i, j| moving.read(i, j) + 0.1);
        let config = RunnerConfig {
            max_iterations: 20,
            ..Default::default()
        };

        group.bench_with_input(
            BenchmarkId::new("rigid", &parameter_string),
            &(&fixed, &moving),
            |b, i| {
                let (fixed, moving) = (i.0, i.1);
                b.iter(|| {
                    let runner = Runner::new(Rigid::new(), config.clone()).unwrap();
                    black_box(runner.run(fixed.as_ref(), moving.as_ref()).unwrap());
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("nonrigid", &parameter_string),
            &(&fixed, &moving),
            |b, i| {
                let (fixed, moving) = (i.0, i.1);
                b.iter(|| {
                    let runner = Runner::new(Nonrigid::default(), config.clone()).unwrap();
                    black_box(runner.run(fixed.as_ref(), moving.as_ref()).unwrap());
                });
            },
        );
    }
}

criterion_group!(benches, bench_direct_comparer, bench_registration);
criterion_main!(benches);
