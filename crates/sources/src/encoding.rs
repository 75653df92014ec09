//! Input encoders for the collaborative model.

use crate::error::{ModelError, Result};
use aprender::Matrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Maps string ids to dense indices. Classes are sorted, so index order
/// does not depend on insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn fit<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let classes: Vec<String> = ids
            .into_iter()
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut encoder = Self {
            classes,
            lookup: HashMap::new(),
        };
        encoder.rebuild_lookup();
        encoder
    }

    /// Restore the reverse index after deserialization
    pub fn rebuild_lookup(&mut self) {
        self.lookup = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
    }

    pub fn transform(&self, id: &str) -> Option<usize> {
        self.lookup.get(id).copied()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Rows as an `aprender` matrix, for its preprocessing transformers
pub fn to_matrix(rows: &[Vec<f32>]) -> Result<Matrix<f32>> {
    let n_features = rows.first().map(Vec::len).unwrap_or(0);
    let data: Vec<f32> = rows.iter().flatten().copied().collect();
    Matrix::from_vec(rows.len(), n_features, data)
        .map_err(|e| ModelError::InvalidInput(e.to_string()))
}

pub fn matrix_rows(matrix: &Matrix<f32>) -> Vec<Vec<f32>> {
    let (_, n_features) = matrix.shape();
    if n_features == 0 {
        return Vec::new();
    }
    matrix
        .as_slice()
        .chunks(n_features)
        .map(<[f32]>::to_vec)
        .collect()
}
