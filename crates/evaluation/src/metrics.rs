//! Closed-form list statistics.
//!
//! Every function here is total: degenerate inputs (empty lists, zero
//! sums, a single item) return 0 rather than an error.

use data_loader::cosine_similarity;
use std::collections::HashMap;

/// Normalized Discounted Cumulative Gain at K.
///
/// `relevance` maps item id to graded relevance. Ranks are discounted by
/// `1/log2(rank + 2)` (rank 0-based). Returns 0.0 when nothing is relevant.
pub fn ndcg_at_k<S: AsRef<str>>(ranked: &[S], relevance: &HashMap<String, f32>, k: usize) -> f32 {
    let dcg: f32 = ranked
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, id)| {
            let rel = relevance.get(id.as_ref()).copied().unwrap_or(0.0);
            if rel > 0.0 { rel / (i as f32 + 2.0).log2() } else { 0.0 }
        })
        .sum();

    let mut ideal: Vec<f32> = relevance.values().copied().collect();
    ideal.sort_by(|a, b| b.total_cmp(a));
    let idcg: f32 = ideal
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, rel)| rel / (i as f32 + 2.0).log2())
        .sum();

    if idcg > 0.0 { dcg / idcg } else { 0.0 }
}

/// `1 − mean pairwise cosine similarity`; 0.0 for fewer than two vectors
pub fn intra_list_diversity(vectors: &[Vec<f32>]) -> f32 {
    if vectors.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in vectors.iter().enumerate() {
        for b in &vectors[i + 1..] {
            total += cosine_similarity(a, b);
            pairs += 1;
        }
    }
    1.0 - total / pairs as f32
}

/// Gini coefficient of a frequency distribution.
///
/// `(2 Σ i·y_i) / (n Σ y) − (n + 1) / n` over values sorted ascending,
/// `i` 1-based. 0.0 for fewer than two values or a zero sum.
pub fn gini(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum: f32 = values.iter().sum();
    if sum <= 0.0 {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f32;
    let weighted: f32 = sorted
        .iter()
        .enumerate()
        .map(|(i, y)| (i as f32 + 1.0) * y)
        .sum();
    2.0 * weighted / (n * sum) - (n + 1.0) / n
}

/// Shannon entropy in bits of a count distribution
pub fn shannon_entropy(counts: impl IntoIterator<Item = usize>) -> f32 {
    let counts: Vec<usize> = counts.into_iter().collect();
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f32 / total as f32;
            -p * p.log2()
        })
        .sum()
}

/// Population mean and standard deviation; `(0, 0)` when empty
pub fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    (mean, variance.sqrt())
}

/// Least-squares slope of `values` against their index
pub fn linear_trend(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f32;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f32>() / n;
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f32 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });
    if den > 0.0 { num / den } else { 0.0 }
}
