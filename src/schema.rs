//! Feature schema: the ordered, typed list of model inputs fixed at training time

use serde::{Deserialize, Serialize};

use crate::error::SegmentError;
use crate::record::{RawRecord, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub kind: FeatureKind,
}

/// Ordered feature names partitioned into numeric and categorical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    features: Vec<Feature>,
}

/// Values laid out in schema order, ready for the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRecord {
    values: Vec<Value>,
}

impl AlignedRecord {
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl FeatureSchema {
    pub fn new(features: Vec<Feature>) -> crate::Result<Self> {
        for (i, feature) in features.iter().enumerate() {
            if features[..i].iter().any(|f| f.name == feature.name) {
                return Err(SegmentError::Schema(format!(
                    "feature `{}` is declared twice",
                    feature.name
                )));
            }
        }
        Ok(Self { features })
    }

    /// Derive the schema from column contents: a column is numeric when every
    /// non-null value is a number, categorical otherwise.
    pub fn infer(columns: &[String], records: &[RawRecord]) -> crate::Result<Self> {
        let mut features = Vec::with_capacity(columns.len());
        for name in columns {
            let mut numeric = true;
            for (row, record) in records.iter().enumerate() {
                match record.get(name) {
                    None => {
                        return Err(SegmentError::Schema(format!(
                            "record {row} has no `{name}` column"
                        )))
                    }
                    Some(Value::Text(_)) => numeric = false,
                    Some(_) => {}
                }
            }
            let kind = if numeric {
                FeatureKind::Numeric
            } else {
                FeatureKind::Categorical
            };
            features.push(Feature {
                name: name.clone(),
                kind,
            });
        }
        Self::new(features)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn numeric_names(&self) -> impl Iterator<Item = &str> {
        self.names_of(FeatureKind::Numeric)
    }

    pub fn categorical_names(&self) -> impl Iterator<Item = &str> {
        self.names_of(FeatureKind::Categorical)
    }

    fn names_of(&self, kind: FeatureKind) -> impl Iterator<Item = &str> {
        self.features
            .iter()
            .filter(move |f| f.kind == kind)
            .map(|f| f.name.as_str())
    }

    /// Strict projection used during training: every declared feature must be present.
    pub fn project(&self, record: &RawRecord) -> crate::Result<AlignedRecord> {
        let values = self
            .features
            .iter()
            .map(|f| {
                record.get(&f.name).cloned().ok_or_else(|| {
                    SegmentError::Schema(format!("record is missing feature `{}`", f.name))
                })
            })
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(AlignedRecord { values })
    }

    /// Lenient alignment used at inference: absent features become null,
    /// unknown ones are dropped, order follows the schema.
    pub fn align(&self, record: &RawRecord) -> AlignedRecord {
        let values = self
            .features
            .iter()
            .map(|f| record.get(&f.name).cloned().unwrap_or(Value::Null))
            .collect();
        AlignedRecord { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn columns() -> Vec<String> {
        vec!["tenure".to_string(), "Contract".to_string(), "TotalCharges".to_string()]
    }

    #[test]
    fn test_infer_partitions_by_type() {
        let records = vec![
            record(&[
                ("tenure", Value::Number(1.0)),
                ("Contract", "Two year".into()),
                ("TotalCharges", Value::Null),
            ]),
            record(&[
                ("tenure", Value::Number(5.0)),
                ("Contract", "One year".into()),
                ("TotalCharges", Value::Number(99.0)),
            ]),
        ];

        let schema = FeatureSchema::infer(&columns(), &records).unwrap();

        assert_eq!(schema.names(), columns());
        assert_eq!(schema.numeric_names().collect::<Vec<_>>(), vec!["tenure", "TotalCharges"]);
        assert_eq!(schema.categorical_names().collect::<Vec<_>>(), vec!["Contract"]);
    }

    #[test]
    fn test_infer_rejects_missing_column() {
        let records = vec![record(&[("tenure", Value::Number(1.0))])];
        let result = FeatureSchema::infer(&columns(), &records);

        assert!(matches!(result, Err(SegmentError::Schema(_))));
    }

    #[test]
    fn test_align_fills_drops_and_reorders() {
        let records = vec![record(&[
            ("tenure", Value::Number(1.0)),
            ("Contract", "Two year".into()),
            ("TotalCharges", Value::Number(10.0)),
        ])];
        let schema = FeatureSchema::infer(&columns(), &records).unwrap();

        let input = record(&[
            ("TotalCharges", Value::Number(42.0)),
            ("favouriteColour", "blue".into()),
            ("tenure", Value::Number(3.0)),
        ]);
        let aligned = schema.align(&input);

        assert_eq!(
            aligned.values(),
            &[Value::Number(3.0), Value::Null, Value::Number(42.0)]
        );
        assert!(schema.project(&input).is_err());
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let feature = Feature {
            name: "tenure".to_string(),
            kind: FeatureKind::Numeric,
        };
        assert!(FeatureSchema::new(vec![feature.clone(), feature]).is_err());
    }
}
