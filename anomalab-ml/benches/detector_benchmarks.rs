use anomalab_ml::data::{SubsampleConfig, SyntheticConfig, make_outlier_blobs, subsample};
use anomalab_ml::detectors::{ModelFamily, build_detector};
use anomalab_ml::training::{StratifiedKFold, roc_auc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::collections::BTreeMap;

fn blobs(n_inliers: usize) -> anomalab_ml::Dataset {
    make_outlier_blobs(
        "bench",
        &SyntheticConfig {
            n_inliers,
            n_outliers: n_inliers / 20,
            n_features: 8,
            seed: 7,
        },
    )
    .unwrap()
}

fn bench_detectors(c: &mut Criterion) {
    let dataset = blobs(1000);
    let mut group = c.benchmark_group("fit_and_score");
    group.sample_size(10);
    for family in ModelFamily::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(family.key()), &family, |b, &family| {
            b.iter(|| {
                let mut detector = build_detector(family, &BTreeMap::new(), 0).unwrap();
                detector.fit(black_box(dataset.features())).unwrap();
                detector.decision_function(dataset.features()).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_roc_auc(c: &mut Criterion) {
    let dataset = blobs(5000);
    let scores: Vec<f64> = dataset.features().rows().into_iter().map(|r| r.sum()).collect();
    c.bench_function("roc_auc_5k", |b| {
        b.iter(|| roc_auc(black_box(dataset.labels()), black_box(&scores)).unwrap())
    });
}

fn bench_data_prep(c: &mut Criterion) {
    let dataset = blobs(5000);
    let config = SubsampleConfig {
        n_samples: Some(1000),
        outlier_ratio: Some(0.05),
        replace: false,
    };
    c.bench_function("subsample_1k_of_5k", |b| {
        b.iter(|| subsample(black_box(&dataset), &config, 3).unwrap())
    });

    let folds = StratifiedKFold::new(5, true, 3).unwrap();
    c.bench_function("stratified_kfold_5k", |b| {
        b.iter(|| folds.split(black_box(dataset.labels())).unwrap())
    });
}

criterion_group!(benches, bench_detectors, bench_roc_auc, bench_data_prep);
criterion_main!(benches);
