//! SegmentForge: telecom customer segmentation using K-Means clustering
//!
//! Raw customer records are encoded into numeric vectors (standardized
//! numerics, one-hot categories), grouped with K-Means and summarised into
//! per-cluster profiles. The trained encoder, centroids, profiles and input
//! schema travel together as an [`ArtifactBundle`] that drives inference.

pub mod bundle;
pub mod cli;
pub mod config;
pub mod data;
pub mod encoder;
pub mod error;
pub mod model;
pub mod profile;
pub mod record;
pub mod schema;
pub mod service;
pub mod synth;
pub mod viz;

// Re-export public items for easier access
pub use bundle::{ArtifactBundle, SegmentationPipeline, TrainingSummary};
pub use cli::Args;
pub use config::SegmentationConfig;
pub use data::{load_csv, write_csv, CustomerDataset};
pub use encoder::FeatureEncoder;
pub use error::{Result, SegmentError};
pub use model::{fit_kmeans, ClusterModel, KMeansSettings};
pub use profile::{build_profiles, cluster_label, ClusterProfile, ProfileValue};
pub use record::{CustomerRecord, RawRecord, Value};
pub use schema::{FeatureKind, FeatureSchema};
pub use service::{predict_one, train, train_detailed, Prediction, SegmentationService};
pub use synth::generate_customers;
pub use viz::create_cluster_size_chart;
