//! Cluster profiles: mean of numeric features and mode of categorical ones per cluster

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SegmentError;
use crate::record::RawRecord;
use crate::schema::{FeatureKind, FeatureSchema};

/// Summary value of one feature within a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Mean(f64),
    Mode(String),
}

impl std::fmt::Display for ProfileValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileValue::Mean(v) => write!(f, "{v:.2}"),
            ProfileValue::Mode(s) => write!(f, "{s}"),
        }
    }
}

/// Representative summary of a cluster's members. Empty for a cluster with no members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterProfile(BTreeMap<String, ProfileValue>);

impl ClusterProfile {
    pub fn get(&self, feature: &str) -> Option<&ProfileValue> {
        self.0.get(feature)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProfileValue)> {
        self.0.iter()
    }

    pub fn mean(&self, feature: &str) -> Option<f64> {
        match self.0.get(feature) {
            Some(ProfileValue::Mean(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn mode(&self, feature: &str) -> Option<&str> {
        match self.0.get(feature) {
            Some(ProfileValue::Mode(s)) => Some(s),
            _ => None,
        }
    }
}

/// Display label for a cluster id, also the key used in persisted profiles.
pub fn cluster_label(id: usize) -> String {
    format!("Cluster {id}")
}

/// Inverse of [`cluster_label`].
pub fn parse_cluster_label(label: &str) -> Option<usize> {
    label.strip_prefix("Cluster ")?.parse().ok()
}

/// Group raw records by cluster and summarise each group.
///
/// Numeric means are rounded to 2 decimals. Mode ties go to the value
/// encountered first in record order. Nulls are skipped.
pub fn build_profiles(
    records: &[RawRecord],
    cluster_ids: &[usize],
    schema: &FeatureSchema,
    n_clusters: usize,
) -> crate::Result<Vec<ClusterProfile>> {
    if records.len() != cluster_ids.len() {
        return Err(SegmentError::DimensionMismatch {
            expected: records.len(),
            actual: cluster_ids.len(),
        });
    }

    let mut groups: Vec<Vec<&RawRecord>> = vec![Vec::new(); n_clusters];
    for (record, &id) in records.iter().zip(cluster_ids) {
        let group = groups
            .get_mut(id)
            .ok_or(SegmentError::UnknownCluster { id, n_clusters })?;
        group.push(record);
    }

    groups
        .iter()
        .map(|members| summarise(members, schema))
        .collect()
}

fn summarise(members: &[&RawRecord], schema: &FeatureSchema) -> crate::Result<ClusterProfile> {
    let mut profile = BTreeMap::new();
    if members.is_empty() {
        return Ok(ClusterProfile(profile));
    }

    for feature in schema.features() {
        let values = members
            .iter()
            .filter_map(|r| r.get(&feature.name))
            .filter(|v| !v.is_null());

        let summary = match feature.kind {
            FeatureKind::Numeric => {
                let mut sum = 0.0;
                let mut count = 0usize;
                for value in values {
                    if let Some(v) = value.to_number(&feature.name)? {
                        sum += v;
                        count += 1;
                    }
                }
                (count > 0).then(|| ProfileValue::Mean(round2(sum / count as f64)))
            }
            FeatureKind::Categorical => {
                most_frequent(values.map(|v| v.to_category())).map(ProfileValue::Mode)
            }
        };

        if let Some(summary) = summary {
            profile.insert(feature.name.clone(), summary);
        }
    }

    Ok(ClusterProfile(profile))
}

/// Most frequent label; ties resolved by first appearance.
fn most_frequent(labels: impl Iterator<Item = String>) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (label, count) in counts {
        if best.as_ref().map_or(true, |(_, top)| count > *top) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tenure: Option<f64>, contract: &str) -> RawRecord {
        let mut r = RawRecord::new();
        r.insert("tenure".to_string(), tenure.into());
        r.insert("Contract".to_string(), contract.into());
        r
    }

    fn schema(records: &[RawRecord]) -> FeatureSchema {
        FeatureSchema::infer(&["tenure".to_string(), "Contract".to_string()], records).unwrap()
    }

    #[test]
    fn test_mean_and_mode_per_cluster() {
        let records = vec![
            record(Some(1.0), "Month-to-month"),
            record(Some(2.0), "Month-to-month"),
            record(Some(60.0), "Two year"),
            record(Some(2.0), "One year"),
        ];
        let profiles = build_profiles(&records, &[0, 0, 1, 0], &schema(&records), 2).unwrap();

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].mean("tenure"), Some(1.67));
        assert_eq!(profiles[0].mode("Contract"), Some("Month-to-month"));
        assert_eq!(profiles[1].mean("tenure"), Some(60.0));
        assert_eq!(profiles[1].mode("Contract"), Some("Two year"));
    }

    #[test]
    fn test_mode_tie_prefers_first_encountered() {
        let records = vec![
            record(Some(1.0), "Two year"),
            record(Some(1.0), "One year"),
            record(Some(1.0), "One year"),
            record(Some(1.0), "Two year"),
        ];
        let profiles = build_profiles(&records, &[0, 0, 0, 0], &schema(&records), 1).unwrap();

        assert_eq!(profiles[0].mode("Contract"), Some("Two year"));
    }

    #[test]
    fn test_empty_cluster_has_empty_profile() {
        let records = vec![record(Some(3.0), "One year")];
        let profiles = build_profiles(&records, &[1], &schema(&records), 3).unwrap();

        assert_eq!(profiles.len(), 3);
        assert!(profiles[0].is_empty());
        assert!(!profiles[1].is_empty());
        assert!(profiles[2].is_empty());
    }

    #[test]
    fn test_nulls_are_skipped() {
        let records = vec![record(None, "One year"), record(Some(4.0), "One year")];
        let profiles = build_profiles(&records, &[0, 0], &schema(&records), 1).unwrap();

        assert_eq!(profiles[0].mean("tenure"), Some(4.0));
    }

    #[test]
    fn test_out_of_range_cluster_id() {
        let records = vec![record(Some(3.0), "One year")];
        let result = build_profiles(&records, &[5], &schema(&records), 2);

        assert!(matches!(result, Err(SegmentError::UnknownCluster { id: 5, .. })));
    }

    #[test]
    fn test_cluster_label_round_trip() {
        assert_eq!(cluster_label(3), "Cluster 3");
        assert_eq!(parse_cluster_label("Cluster 12"), Some(12));
        assert_eq!(parse_cluster_label("Segment 1"), None);
    }

    #[test]
    fn test_profile_json_shape() {
        let records = vec![record(Some(3.0), "One year")];
        let profiles = build_profiles(&records, &[0], &schema(&records), 1).unwrap();
        let json = serde_json::to_value(&profiles[0]).unwrap();

        assert_eq!(json["tenure"], serde_json::json!(3.0));
        assert_eq!(json["Contract"], serde_json::json!("One year"));
    }
}
