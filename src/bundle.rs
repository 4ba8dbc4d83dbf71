//! Artifact bundle: everything inference depends on, persisted as one JSON document

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SegmentationConfig;
use crate::encoder::{FeatureEncoder, FeatureTransform};
use crate::error::SegmentError;
use crate::model::ClusterModel;
use crate::profile::{cluster_label, parse_cluster_label, ClusterProfile};
use crate::record::RawRecord;
use crate::schema::FeatureSchema;

pub const FORMAT_VERSION: u32 = 1;

/// Encoder and assigner state composed as transform-then-predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationPipeline {
    pub schema: FeatureSchema,
    pub encoder: FeatureEncoder,
    pub model: ClusterModel,
}

impl SegmentationPipeline {
    /// Align and encode one record with the training-time parameters.
    pub fn transform(&self, record: &RawRecord) -> crate::Result<Array1<f64>> {
        self.encoder.transform(&self.schema.align(record))
    }

    pub fn predict(&self, record: &RawRecord) -> crate::Result<usize> {
        let features = self.transform(record)?;
        self.model.predict(features.view())
    }
}

/// Facts about the training run that produced a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub created_at: DateTime<Utc>,
    pub n_records: usize,
    pub cluster_sizes: Vec<usize>,
    pub inertia: f64,
    /// Median used per training-time imputed column
    pub imputed_medians: BTreeMap<String, f64>,
    pub config: SegmentationConfig,
}

/// The unit of persistence. Never mutated after training; a new training run
/// produces a new bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pipeline: SegmentationPipeline,
    profiles: Vec<ClusterProfile>,
    summary: TrainingSummary,
}

/// On-disk layout: pipeline, profiles keyed `"Cluster {i}"`, expected input columns.
#[derive(Serialize, Deserialize)]
struct StoredBundle {
    format_version: u32,
    pipeline: SegmentationPipeline,
    profiles: BTreeMap<String, ClusterProfile>,
    columns: Vec<String>,
    summary: TrainingSummary,
}

impl ArtifactBundle {
    pub fn new(
        pipeline: SegmentationPipeline,
        profiles: Vec<ClusterProfile>,
        summary: TrainingSummary,
    ) -> crate::Result<Self> {
        let bundle = Self {
            pipeline,
            profiles,
            summary,
        };
        bundle.validate().map_err(SegmentError::Schema)?;
        Ok(bundle)
    }

    pub fn pipeline(&self) -> &SegmentationPipeline {
        &self.pipeline
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.pipeline.schema
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.pipeline.encoder
    }

    pub fn model(&self) -> &ClusterModel {
        &self.pipeline.model
    }

    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }

    pub fn n_clusters(&self) -> usize {
        self.pipeline.model.n_clusters
    }

    /// Ordered input feature names.
    pub fn expected_columns(&self) -> Vec<String> {
        self.pipeline.schema.names()
    }

    pub fn profile(&self, cluster_id: usize) -> Option<&ClusterProfile> {
        self.profiles.get(cluster_id)
    }

    pub fn profiles(&self) -> &[ClusterProfile] {
        &self.profiles
    }

    /// Profiles keyed by display label.
    pub fn labelled_profiles(&self) -> BTreeMap<String, ClusterProfile> {
        self.profiles
            .iter()
            .enumerate()
            .map(|(id, profile)| (cluster_label(id), profile.clone()))
            .collect()
    }

    fn validate(&self) -> Result<(), String> {
        let pipeline = &self.pipeline;
        if !pipeline.encoder.matches(&pipeline.schema) {
            return Err("encoder parameters do not match the feature schema".to_string());
        }
        for fitted in pipeline.encoder.features() {
            if let FeatureTransform::OneHot { categories } = &fitted.transform {
                // lookup uses binary search
                if !categories.windows(2).all(|pair| pair[0] < pair[1]) {
                    return Err(format!(
                        "categories of `{}` are not sorted and unique",
                        fitted.name
                    ));
                }
            }
        }
        if pipeline.model.dimension() != pipeline.encoder.width() {
            return Err(format!(
                "centroids have {} dimensions, encoder produces {}",
                pipeline.model.dimension(),
                pipeline.encoder.width()
            ));
        }
        if pipeline.model.centroids.nrows() != pipeline.model.n_clusters {
            return Err(format!(
                "model declares {} clusters but stores {} centroids",
                pipeline.model.n_clusters,
                pipeline.model.centroids.nrows()
            ));
        }
        if self.profiles.len() != pipeline.model.n_clusters {
            return Err(format!(
                "expected {} cluster profiles, found {}",
                pipeline.model.n_clusters,
                self.profiles.len()
            ));
        }
        Ok(())
    }

    /// Write the bundle atomically: readers see either the previous file or
    /// the complete new one.
    pub fn save(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let stored = StoredBundle {
            format_version: FORMAT_VERSION,
            pipeline: self.pipeline.clone(),
            profiles: self.labelled_profiles(),
            columns: self.expected_columns(),
            summary: self.summary.clone(),
        };

        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|file| {
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, &stored)?;
                writer.flush().map_err(serde_json::Error::io)
            })
            .map_err(|e| match e {
                atomicwrites::Error::Internal(io) => SegmentError::Io(io),
                atomicwrites::Error::User(err) => SegmentError::Serialization(err),
            })?;

        info!(path = %path.display(), clusters = self.n_clusters(), "artifact bundle saved");
        Ok(())
    }

    /// Load and validate a bundle. Any problem is an `ArtifactLoad` error.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let fail = |reason: String| SegmentError::ArtifactLoad {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let stored: StoredBundle =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| fail(e.to_string()))?;

        if stored.format_version != FORMAT_VERSION {
            return Err(fail(format!(
                "unsupported format version {}",
                stored.format_version
            )));
        }
        if stored.columns != stored.pipeline.schema.names() {
            return Err(fail(
                "expected input columns disagree with the feature schema".to_string(),
            ));
        }

        let n_clusters = stored.pipeline.model.n_clusters;
        let mut profiles = vec![None; n_clusters];
        for (label, profile) in stored.profiles {
            let slot = parse_cluster_label(&label)
                .and_then(|id| profiles.get_mut(id))
                .ok_or_else(|| fail(format!("unexpected profile key {label:?}")))?;
            *slot = Some(profile);
        }
        let profiles = profiles
            .into_iter()
            .enumerate()
            .map(|(id, p)| p.ok_or_else(|| fail(format!("missing profile for {}", cluster_label(id)))))
            .collect::<crate::Result<Vec<_>>>()?;

        let bundle = Self {
            pipeline: stored.pipeline,
            profiles,
            summary: stored.summary,
        };
        bundle.validate().map_err(fail)?;

        info!(path = %path.display(), clusters = n_clusters, "artifact bundle loaded");
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use ndarray::array;
    use tempfile::tempdir;

    fn small_bundle() -> ArtifactBundle {
        let mut a = RawRecord::new();
        a.insert("tenure".to_string(), Value::Number(1.0));
        let mut b = RawRecord::new();
        b.insert("tenure".to_string(), Value::Number(3.0));
        let records = vec![a, b];

        let schema = FeatureSchema::infer(&["tenure".to_string()], &records).unwrap();
        let encoder = FeatureEncoder::fit(&records, &schema).unwrap();
        let model = ClusterModel {
            n_clusters: 2,
            centroids: array![[-1.0], [1.0]],
            inertia: 0.0,
        };
        let summary = TrainingSummary {
            created_at: Utc::now(),
            n_records: 2,
            cluster_sizes: vec![1, 1],
            inertia: 0.0,
            imputed_medians: BTreeMap::new(),
            config: SegmentationConfig::default(),
        };
        ArtifactBundle::new(
            SegmentationPipeline {
                schema,
                encoder,
                model,
            },
            vec![ClusterProfile::default(), ClusterProfile::default()],
            summary,
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let bundle = small_bundle();

        bundle.save(&path).unwrap();
        let loaded = ArtifactBundle::load(&path).unwrap();

        assert_eq!(loaded, bundle);
        assert_eq!(loaded.expected_columns(), vec!["tenure".to_string()]);
    }

    #[test]
    fn test_profiles_keyed_by_label() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        small_bundle().save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json["profiles"].get("Cluster 0").is_some());
        assert!(json["profiles"].get("Cluster 1").is_some());
        assert_eq!(json["columns"], serde_json::json!(["tenure"]));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = ArtifactBundle::load(dir.path().join("absent.json"));

        assert!(matches!(result, Err(SegmentError::ArtifactLoad { .. })));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ArtifactBundle::load(&path),
            Err(SegmentError::ArtifactLoad { .. })
        ));
    }

    #[test]
    fn test_load_rejects_missing_profile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        small_bundle().save(&path).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        json["profiles"].as_object_mut().unwrap().remove("Cluster 1");
        std::fs::write(&path, json.to_string()).unwrap();

        assert!(matches!(
            ArtifactBundle::load(&path),
            Err(SegmentError::ArtifactLoad { .. })
        ));
    }

    #[test]
    fn test_load_rejects_unsorted_categories() {
        let records: Vec<RawRecord> = ["Month-to-month", "Two year"]
            .iter()
            .map(|c| {
                let mut r = RawRecord::new();
                r.insert("Contract".to_string(), Value::from(*c));
                r
            })
            .collect();
        let schema = FeatureSchema::infer(&["Contract".to_string()], &records).unwrap();
        let encoder = FeatureEncoder::fit(&records, &schema).unwrap();
        let model = ClusterModel {
            n_clusters: 2,
            centroids: array![[1.0, 0.0], [0.0, 1.0]],
            inertia: 0.0,
        };
        let mut summary = small_bundle().summary().clone();
        summary.n_records = 2;
        let bundle = ArtifactBundle::new(
            SegmentationPipeline {
                schema,
                encoder,
                model,
            },
            vec![ClusterProfile::default(), ClusterProfile::default()],
            summary,
        )
        .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        for categories in [
            serde_json::json!(["Two year", "Month-to-month"]),
            serde_json::json!(["Two year", "Two year"]),
        ] {
            bundle.save(&path).unwrap();
            let mut json: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            json["pipeline"]["encoder"]["features"][0]["categories"] = categories;
            std::fs::write(&path, json.to_string()).unwrap();

            assert!(matches!(
                ArtifactBundle::load(&path),
                Err(SegmentError::ArtifactLoad { .. })
            ));
        }
    }

    #[test]
    fn test_new_rejects_inconsistent_parts() {
        let bundle = small_bundle();
        let result = ArtifactBundle::new(
            bundle.pipeline().clone(),
            vec![ClusterProfile::default()],
            bundle.summary().clone(),
        );

        assert!(matches!(result, Err(SegmentError::Schema(_))));
    }

    #[test]
    fn test_pipeline_predict() {
        let bundle = small_bundle();
        let mut record = RawRecord::new();
        record.insert("tenure".to_string(), Value::Number(3.0));

        assert_eq!(bundle.pipeline().predict(&record).unwrap(), 1);
    }
}
