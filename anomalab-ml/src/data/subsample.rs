//! Outlier-ratio-controlled resampling.

use crate::data::dataset::{Dataset, INLIER, OUTLIER};
use crate::error::MlError;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// How to derive a subsample from a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsampleConfig {
    /// Target number of rows. `None` keeps the dataset size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_samples: Option<usize>,
    /// Target outlier fraction. `None` keeps the dataset's own ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlier_ratio: Option<f64>,
    /// Draw with replacement, allowing targets larger than a class.
    #[serde(default)]
    pub replace: bool,
}


impl SubsampleConfig {
    /// Number of (inliers, outliers) this config draws from `dataset`.
    pub fn plan(&self, dataset: &Dataset) -> Result<(usize, usize), MlError> {
        let n = self.n_samples.unwrap_or(dataset.len());
        let ratio = self.outlier_ratio.unwrap_or_else(|| dataset.outlier_ratio());

        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(MlError::invalid_input(format!(
                "{}: outlier ratio must be strictly between 0 and 1, got {ratio}",
                dataset.name()
            )));
        }
        if n < 2 {
            return Err(MlError::invalid_input(format!(
                "{}: subsample needs at least 2 rows, got {n}",
                dataset.name()
            )));
        }

        let n_out = ((n as f64 * ratio).round() as usize).clamp(1, n - 1);
        let n_in = n - n_out;

        // Neither mode can draw from an empty class.
        for (requested, available, class) in [
            (n_out, dataset.n_outliers(), "outliers"),
            (n_in, dataset.n_inliers(), "inliers"),
        ] {
            if requested > 0 && available == 0 {
                return Err(MlError::dataset(format!(
                    "{}: {requested} {class} requested but the dataset has none",
                    dataset.name()
                )));
            }
        }

        if !self.replace {
            if n_out > dataset.n_outliers() {
                return Err(MlError::dataset(format!(
                    "{}: {n_out} outliers requested but only {} available (set replace = true to resample)",
                    dataset.name(),
                    dataset.n_outliers()
                )));
            }
            if n_in > dataset.n_inliers() {
                return Err(MlError::dataset(format!(
                    "{}: {n_in} inliers requested but only {} available (set replace = true to resample)",
                    dataset.name(),
                    dataset.n_inliers()
                )));
            }
        }
        Ok((n_in, n_out))
    }
}

/// Draw a shuffled subsample with the configured size and outlier ratio.
pub fn subsample(dataset: &Dataset, config: &SubsampleConfig, seed: u64) -> Result<Dataset, MlError> {
    let (n_in, n_out) = config.plan(dataset)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut indices = draw(&dataset.class_indices(INLIER), n_in, config.replace, &mut rng);
    indices.extend(draw(
        &dataset.class_indices(OUTLIER),
        n_out,
        config.replace,
        &mut rng,
    ));
    indices.shuffle(&mut rng);

    tracing::debug!(
        dataset = dataset.name(),
        inliers = n_in,
        outliers = n_out,
        replace = config.replace,
        "Subsampled dataset"
    );
    Ok(dataset.select(&indices))
}

fn draw(pool: &[usize], k: usize, replace: bool, rng: &mut ChaCha8Rng) -> Vec<usize> {
    if replace {
        (0..k).map(|_| pool[rng.gen_range(0..pool.len())]).collect()
    } else {
        // Sorted so the final shuffle alone decides row order.
        let mut picked: Vec<usize> = pool.iter().copied().choose_multiple(rng, k);
        picked.sort_unstable();
        picked
    }
}
