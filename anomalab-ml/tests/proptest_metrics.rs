//! Property-based tests for AUC-ROC, folds, subsampling and grids.

use proptest::prelude::*;

use anomalab_ml::data::{Dataset, SubsampleConfig, subsample};
use anomalab_ml::training::{HyperparamSweep, StratifiedKFold, roc_auc};
use ndarray::Array2;
use serde_json::json;
use std::collections::BTreeMap;

/// Labels with at least one member of each class.
fn labels_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..=1, 2..max_len)
        .prop_filter("both classes", |l| l.contains(&0) && l.contains(&1))
}

fn labels_and_scores() -> impl Strategy<Value = (Vec<u8>, Vec<f64>)> {
    labels_strategy(60).prop_flat_map(|labels| {
        let n = labels.len();
        (Just(labels), prop::collection::vec(-1000.0f64..1000.0, n))
    })
}

// --- AUC-ROC properties ---

proptest! {
    #[test]
    fn auc_is_a_probability((labels, scores) in labels_and_scores()) {
        let auc = roc_auc(&labels, &scores).unwrap();
        prop_assert!((0.0..=1.0).contains(&auc));
    }

    #[test]
    fn auc_invariant_under_increasing_transform((labels, scores) in labels_and_scores()) {
        let transformed: Vec<f64> = scores.iter().map(|s| (s / 100.0).exp() * 3.0 + 7.0).collect();
        let a = roc_auc(&labels, &scores).unwrap();
        let b = roc_auc(&labels, &transformed).unwrap();
        prop_assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
    }

    #[test]
    fn auc_negated_scores_complement((labels, scores) in labels_and_scores()) {
        let negated: Vec<f64> = scores.iter().map(|s| -s).collect();
        let a = roc_auc(&labels, &scores).unwrap();
        let b = roc_auc(&labels, &negated).unwrap();
        prop_assert!((a + b - 1.0).abs() < 1e-9);
    }

    #[test]
    fn auc_of_labels_as_scores_is_one(labels in labels_strategy(80)) {
        let scores: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        prop_assert_eq!(roc_auc(&labels, &scores).unwrap(), 1.0);
    }
}

// --- Stratified K-fold properties ---

proptest! {
    #[test]
    fn folds_partition_and_stratify(
        n_in in 5usize..80,
        n_out in 5usize..20,
        n_splits in 2usize..6,
        seed in any::<u64>(),
        shuffle in any::<bool>(),
    ) {
        let mut labels = vec![0u8; n_in];
        labels.extend(vec![1u8; n_out]);
        let folds = StratifiedKFold::new(n_splits, shuffle, seed).unwrap().split(&labels).unwrap();
        prop_assert_eq!(folds.len(), n_splits);

        let mut seen = vec![0usize; labels.len()];
        for fold in &folds {
            for &i in &fold.validation_indices {
                seen[i] += 1;
            }
            prop_assert_eq!(fold.train_indices.len() + fold.validation_indices.len(), labels.len());
            prop_assert!(fold.validation_indices.iter().any(|&i| labels[i] == 1));
            prop_assert!(fold.validation_indices.iter().any(|&i| labels[i] == 0));
        }
        prop_assert!(seen.iter().all(|&c| c == 1));

        for class in [0u8, 1] {
            let counts: Vec<usize> = folds
                .iter()
                .map(|f| f.validation_indices.iter().filter(|&&i| labels[i] == class).count())
                .collect();
            let max = counts.iter().max().copied().unwrap_or(0);
            let min = counts.iter().min().copied().unwrap_or(0);
            prop_assert!(max - min <= 1, "class {} counts {:?}", class, counts);
        }
    }
}

// --- Subsample properties ---

proptest! {
    #[test]
    fn subsample_hits_requested_size_and_ratio(
        n_samples in 10usize..100,
        ratio in 0.05f64..0.5,
        seed in any::<u64>(),
    ) {
        let n = 300;
        let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        let labels: Vec<u8> = (0..n).map(|i| u8::from(i % 3 == 0)).collect();
        let dataset = Dataset::new("grid", features, labels).unwrap();
        let config = SubsampleConfig {
            n_samples: Some(n_samples),
            outlier_ratio: Some(ratio),
            replace: false,
        };

        let a = subsample(&dataset, &config, seed).unwrap();
        let b = subsample(&dataset, &config, seed).unwrap();
        let expected_out = ((n_samples as f64 * ratio).round() as usize).clamp(1, n_samples - 1);
        prop_assert_eq!(a.len(), n_samples);
        prop_assert_eq!(a.n_outliers(), expected_out);
        prop_assert_eq!(a.features(), b.features());
        prop_assert_eq!(a.labels(), b.labels());
    }
}

// --- Grid expansion properties ---

proptest! {
    #[test]
    fn grid_size_is_product_of_value_counts(sizes in prop::collection::vec(1usize..5, 0..4)) {
        let params: BTreeMap<String, Vec<serde_json::Value>> = sizes
            .iter()
            .enumerate()
            .map(|(k, &n)| (format!("p{k}"), (0..n).map(|v| json!(v)).collect()))
            .collect();
        let trials = HyperparamSweep::grid(params).generate_trials().unwrap();
        prop_assert_eq!(trials.len(), sizes.iter().product::<usize>());
        for trial in &trials {
            prop_assert_eq!(trial.len(), sizes.len());
        }
    }
}
