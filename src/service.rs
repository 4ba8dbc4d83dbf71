//! Segmentation service: training orchestration, single-record inference and
//! the serving handle used by request handlers

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bundle::{ArtifactBundle, SegmentationPipeline, TrainingSummary};
use crate::config::SegmentationConfig;
use crate::data::CustomerDataset;
use crate::encoder::FeatureEncoder;
use crate::error::SegmentError;
use crate::model::fit_kmeans;
use crate::profile::{build_profiles, cluster_label, ClusterProfile};
use crate::record::{CustomerRecord, RawRecord};
use crate::schema::FeatureSchema;

/// Training data after identifier removal and median imputation.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub dataset: CustomerDataset,
    pub imputed_medians: BTreeMap<String, f64>,
}

/// A trained bundle plus the cluster id of every training record.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ArtifactBundle,
    pub assignments: Vec<usize>,
}

/// Result of segmenting one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub cluster_id: usize,
    pub label: String,
    pub profile: ClusterProfile,
}

/// Drop the identifier column and fill the nullable numeric columns with
/// their median. Runs before anything is fitted.
pub fn prepare_training_data(
    dataset: &CustomerDataset,
    config: &SegmentationConfig,
) -> PreparedData {
    let mut dataset = dataset.clone();
    if dataset.drop_column(&config.id_column) {
        debug!(column = %config.id_column, "dropped identifier column");
    }

    let mut imputed_medians = BTreeMap::new();
    for column in &config.median_fill {
        match dataset.impute_median(column) {
            Some(median) => {
                imputed_medians.insert(column.clone(), median);
            }
            None => warn!(column = %column, "median fill skipped: column absent or empty"),
        }
    }

    PreparedData {
        dataset,
        imputed_medians,
    }
}

/// Train a bundle from a raw dataset.
pub fn train(dataset: &CustomerDataset, config: &SegmentationConfig) -> crate::Result<ArtifactBundle> {
    train_detailed(dataset, config).map(|outcome| outcome.bundle)
}

/// Train a bundle and keep the per-record assignments.
///
/// Order: prepare, derive schema, fit encoder, fit assigner, build profiles.
/// Any failure aborts the run without producing a bundle.
///
/// # Arguments
/// * `dataset` - Raw training table, identifier column included
/// * `config` - K-Means settings plus the identifier and median-fill columns
///
/// # Returns
/// * `TrainingOutcome` holding the bundle and the cluster id of every record
pub fn train_detailed(
    dataset: &CustomerDataset,
    config: &SegmentationConfig,
) -> crate::Result<TrainingOutcome> {
    info!(
        records = dataset.len(),
        clusters = config.kmeans.n_clusters,
        seed = config.kmeans.seed,
        "training segmentation model"
    );

    let PreparedData {
        dataset,
        imputed_medians,
    } = prepare_training_data(dataset, config);

    let schema = FeatureSchema::infer(&dataset.columns, &dataset.records)?;
    info!(
        numeric = ?schema.numeric_names().collect::<Vec<_>>(),
        categorical = ?schema.categorical_names().collect::<Vec<_>>(),
        "feature schema derived"
    );

    let encoder = FeatureEncoder::fit(&dataset.records, &schema)?;
    let aligned = dataset
        .records
        .iter()
        .map(|r| schema.project(r))
        .collect::<crate::Result<Vec<_>>>()?;
    let features = encoder.transform_batch(&aligned)?;

    let model = fit_kmeans(&features, &config.kmeans)?;
    let assignments = model.assign(&features)?;
    let cluster_sizes = model.cluster_sizes(&assignments);
    info!(inertia = model.inertia, sizes = ?cluster_sizes, "clustering finished");

    let profiles = build_profiles(&dataset.records, &assignments, &schema, model.n_clusters)?;

    let summary = TrainingSummary {
        created_at: Utc::now(),
        n_records: dataset.len(),
        cluster_sizes,
        inertia: model.inertia,
        imputed_medians,
        config: config.clone(),
    };
    let bundle = ArtifactBundle::new(
        SegmentationPipeline {
            schema,
            encoder,
            model,
        },
        profiles,
        summary,
    )?;

    Ok(TrainingOutcome {
        bundle,
        assignments,
    })
}

/// Segment one raw record against a trained bundle. Never re-fits anything.
pub fn predict_one(record: &RawRecord, bundle: &ArtifactBundle) -> crate::Result<Prediction> {
    let cluster_id = bundle.pipeline().predict(record)?;
    let profile = bundle.profile(cluster_id).cloned().unwrap_or_default();
    let label = cluster_label(cluster_id);
    debug!(%label, "customer segmented");

    Ok(Prediction {
        cluster_id,
        label,
        profile,
    })
}

/// Serving handle over the currently loaded bundle.
///
/// Predictions clone the current `Arc` and run without holding the lock, so a
/// reload never blocks or disturbs in-flight requests.
#[derive(Debug)]
pub struct SegmentationService {
    bundle: RwLock<Arc<ArtifactBundle>>,
}

impl SegmentationService {
    pub fn new(bundle: ArtifactBundle) -> Self {
        Self {
            bundle: RwLock::new(Arc::new(bundle)),
        }
    }

    /// Load the bundle at startup. Fails rather than serving partial state.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        Ok(Self::new(ArtifactBundle::load(path)?))
    }

    /// Current bundle.
    pub fn bundle(&self) -> Arc<ArtifactBundle> {
        Arc::clone(&self.bundle.read())
    }

    /// Swap in a freshly trained bundle.
    pub fn replace(&self, bundle: ArtifactBundle) {
        *self.bundle.write() = Arc::new(bundle);
        info!("artifact bundle replaced");
    }

    /// Load a bundle from disk and swap it in. The current bundle stays
    /// active if loading fails.
    pub fn reload(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let bundle = ArtifactBundle::load(path)?;
        self.replace(bundle);
        Ok(())
    }

    pub fn predict(&self, record: &RawRecord) -> crate::Result<Prediction> {
        predict_one(record, &self.bundle())
    }

    /// Request-handler boundary: segment label and profile, or a message fit
    /// to show the user.
    pub fn segment(&self, record: &RawRecord) -> Result<(String, ClusterProfile), String> {
        self.predict(record)
            .map(|p| {
                info!(segment = %p.label, "new customer segmented");
                (p.label, p.profile)
            })
            .map_err(|e| reject(&e))
    }

    /// Like [`segment`](Self::segment) for raw form fields, validated into a
    /// [`CustomerRecord`] first.
    pub fn segment_form(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<(String, ClusterProfile), String> {
        match CustomerRecord::parse(fields) {
            Ok(record) => self.segment(&record.to_raw()),
            Err(e) => Err(reject(&e)),
        }
    }

    /// All profiles for the overview page, keyed `"Cluster {i}"`.
    pub fn profiles(&self) -> BTreeMap<String, ClusterProfile> {
        self.bundle().labelled_profiles()
    }
}

fn reject(error: &SegmentError) -> String {
    if error.is_recoverable() {
        warn!(%error, "prediction request rejected");
    } else {
        tracing::error!(%error, "prediction failed");
    }
    error.user_message()
}
