//! Training configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::KMeansSettings;
use crate::record::{CUSTOMER_ID, TOTAL_CHARGES};

/// Fixed choices for a training run. Missing keys in a config file take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    #[serde(flatten)]
    pub kmeans: KMeansSettings,
    /// Identifier-only column dropped before modeling
    pub id_column: String,
    /// Numeric columns whose nulls are filled with the training median
    pub median_fill: Vec<String>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            kmeans: KMeansSettings::default(),
            id_column: CUSTOMER_ID.to_string(),
            median_fill: vec![TOTAL_CHARGES.to_string()],
        }
    }
}

impl SegmentationConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_clusters(mut self, n_clusters: usize) -> Self {
        self.kmeans.n_clusters = n_clusters;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.kmeans.seed = seed;
        self
    }
}
