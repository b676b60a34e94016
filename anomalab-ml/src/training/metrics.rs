//! Ranking metrics for outlier scores.

use crate::data::OUTLIER;
use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Area under the ROC curve of `scores` against binary `labels`.
///
/// Computed from the Mann-Whitney U statistic with average ranks for tied
/// scores, which equals the trapezoidal ROC area. Both classes must be
/// present and every score must be finite.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Result<f64, MlError> {
    if labels.len() != scores.len() {
        return Err(MlError::evaluation(format!(
            "{} labels but {} scores",
            labels.len(),
            scores.len()
        )));
    }
    if let Some(pos) = scores.iter().position(|s| !s.is_finite()) {
        return Err(MlError::evaluation(format!(
            "non-finite score {} at position {pos}",
            scores[pos]
        )));
    }

    let n_pos = labels.iter().filter(|&&l| l == OUTLIER).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(MlError::evaluation(
            "AUC-ROC is undefined when only one class is present",
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Sum of 1-based ranks of the positives, ties sharing their mean rank.
    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        let positives_in_group = order[start..end]
            .iter()
            .filter(|&&i| labels[i] == OUTLIER)
            .count();
        positive_rank_sum += mean_rank * positives_in_group as f64;
        start = end;
    }

    let n_pos_f = n_pos as f64;
    let u = positive_rank_sum - n_pos_f * (n_pos_f + 1.0) / 2.0;
    Ok(u / (n_pos_f * n_neg as f64))
}

/// Cross-validation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub metric_name: String,
}

impl CrossValidationResult {
    /// Mean and population standard deviation of per-fold scores.
    pub fn from_scores(scores: Vec<f64>, metric_name: &str) -> Result<Self, MlError> {
        if scores.is_empty() {
            return Err(MlError::evaluation("no fold scores to aggregate"));
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Ok(Self {
            fold_scores: scores,
            mean_score: mean,
            std_score: variance.sqrt(),
            metric_name: metric_name.to_string(),
        })
    }
}
