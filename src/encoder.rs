//! Feature encoder: standardization for numeric features, one-hot blocks for categorical ones

use std::collections::BTreeSet;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::SegmentError;
use crate::record::RawRecord;
use crate::schema::{AlignedRecord, FeatureKind, FeatureSchema};

/// Fitted transform for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureTransform {
    /// `(value - mean) / scale`, or 0 when `scale` is 0.
    Standardize { mean: f64, scale: f64 },
    /// One indicator per known category, sorted.
    OneHot { categories: Vec<String> },
}

impl FeatureTransform {
    pub fn width(&self) -> usize {
        match self {
            FeatureTransform::Standardize { .. } => 1,
            FeatureTransform::OneHot { categories } => categories.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedFeature {
    pub name: String,
    #[serde(flatten)]
    pub transform: FeatureTransform,
}

/// Encoder parameters learned from the training records. Immutable once fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    features: Vec<FittedFeature>,
}

impl FeatureEncoder {
    /// Learn per-feature parameters from training records.
    pub fn fit(records: &[RawRecord], schema: &FeatureSchema) -> crate::Result<Self> {
        let aligned = records
            .iter()
            .map(|r| schema.project(r))
            .collect::<crate::Result<Vec<_>>>()?;

        let mut features = Vec::with_capacity(schema.len());
        for (idx, feature) in schema.features().iter().enumerate() {
            let transform = match feature.kind {
                FeatureKind::Numeric => {
                    let mut values = Vec::with_capacity(aligned.len());
                    for record in &aligned {
                        if let Some(v) = record.values()[idx].to_number(&feature.name)? {
                            values.push(v);
                        }
                    }
                    let (mean, scale) = mean_and_std(&values);
                    FeatureTransform::Standardize { mean, scale }
                }
                FeatureKind::Categorical => {
                    let categories: BTreeSet<String> = aligned
                        .iter()
                        .map(|r| r.values()[idx].to_category())
                        .collect();
                    FeatureTransform::OneHot {
                        categories: categories.into_iter().collect(),
                    }
                }
            };
            features.push(FittedFeature {
                name: feature.name.clone(),
                transform,
            });
        }

        Ok(Self { features })
    }

    pub fn features(&self) -> &[FittedFeature] {
        &self.features
    }

    /// Length of every encoded vector.
    pub fn width(&self) -> usize {
        self.features.iter().map(|f| f.transform.width()).sum()
    }

    /// True when the encoder was fitted against exactly this schema.
    pub fn matches(&self, schema: &FeatureSchema) -> bool {
        self.features.len() == schema.len()
            && self
                .features
                .iter()
                .zip(schema.features())
                .all(|(fitted, declared)| {
                    fitted.name == declared.name
                        && matches!(
                            (&fitted.transform, declared.kind),
                            (FeatureTransform::Standardize { .. }, FeatureKind::Numeric)
                                | (FeatureTransform::OneHot { .. }, FeatureKind::Categorical)
                        )
                })
    }

    /// Encode one aligned record. Null numerics encode as 0, unseen categories
    /// as an all-zero block.
    pub fn transform(&self, record: &AlignedRecord) -> crate::Result<Array1<f64>> {
        let values = record.values();
        if values.len() != self.features.len() {
            return Err(SegmentError::Schema(format!(
                "record has {} features, encoder expects {}",
                values.len(),
                self.features.len()
            )));
        }

        let mut out = Array1::zeros(self.width());
        let mut offset = 0;
        for (fitted, value) in self.features.iter().zip(values) {
            match &fitted.transform {
                FeatureTransform::Standardize { mean, scale } => {
                    let raw = value.to_number(&fitted.name)?.unwrap_or(0.0);
                    out[offset] = if *scale == 0.0 {
                        0.0
                    } else {
                        (raw - mean) / scale
                    };
                }
                FeatureTransform::OneHot { categories } => {
                    let label = value.to_category();
                    if let Ok(pos) = categories.binary_search(&label) {
                        out[offset + pos] = 1.0;
                    }
                }
            }
            offset += fitted.transform.width();
        }

        Ok(out)
    }

    /// Encode many aligned records into a row-per-record matrix.
    pub fn transform_batch(&self, records: &[AlignedRecord]) -> crate::Result<Array2<f64>> {
        let width = self.width();
        let mut matrix = Array2::zeros((records.len(), width));
        for (i, record) in records.iter().enumerate() {
            matrix.row_mut(i).assign(&self.transform(record)?);
        }
        Ok(matrix)
    }
}

/// Population mean and standard deviation.
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
