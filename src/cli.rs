//! Command-line interface definitions and argument parsing

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::SegmentationConfig;

/// Telecom customer segmentation using K-Means clustering
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a synthetic customer CSV
    Generate {
        /// Number of customers
        #[arg(short = 'n', long, default_value = "5000")]
        rows: usize,

        /// Output CSV path
        #[arg(short, long, default_value = "telecom_customer_data.csv")]
        output: PathBuf,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train a segmentation model and write the artifact bundle
    Train(TrainArgs),

    /// Predict the segment of one customer
    Predict {
        /// Artifact bundle produced by `train`
        #[arg(short, long, default_value = "telecom_segmentation.json")]
        bundle: PathBuf,

        /// Customer attribute as name=value; repeat for every form field
        #[arg(short, long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,

        /// JSON file holding a raw record; fields may be missing or extra
        #[arg(short, long, conflicts_with = "fields")]
        record: Option<PathBuf>,
    },

    /// Print the profile of every segment
    Profiles {
        /// Artifact bundle produced by `train`
        #[arg(short, long, default_value = "telecom_segmentation.json")]
        bundle: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
pub struct TrainArgs {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "telecom_customer_data.csv")]
    pub input: PathBuf,

    /// Where to write the artifact bundle
    #[arg(short, long, default_value = "telecom_segmentation.json")]
    pub bundle: PathBuf,

    /// JSON config file; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Seed for centroid initialisation
    #[arg(long)]
    pub seed: Option<u64>,

    /// K-Means restarts
    #[arg(long)]
    pub runs: Option<usize>,

    /// Maximum iterations for K-Means algorithm
    #[arg(long)]
    pub max_iters: Option<u64>,

    /// Tolerance for K-Means convergence
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Also write a cluster size chart to this PNG path
    #[arg(long)]
    pub chart: Option<PathBuf>,
}

impl TrainArgs {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn resolve_config(&self) -> crate::Result<SegmentationConfig> {
        let mut config = match &self.config {
            Some(path) => SegmentationConfig::from_json_file(path)?,
            None => SegmentationConfig::default(),
        };
        if let Some(k) = self.clusters {
            config.kmeans.n_clusters = k;
        }
        if let Some(seed) = self.seed {
            config.kmeans.seed = seed;
        }
        if let Some(runs) = self.runs {
            config.kmeans.n_runs = runs;
        }
        if let Some(max_iters) = self.max_iters {
            config.kmeans.max_iterations = max_iters;
        }
        if let Some(tolerance) = self.tolerance {
            config.kmeans.tolerance = tolerance;
        }
        Ok(config)
    }
}

/// Parse `name=value` pairs into a field map.
pub fn parse_field_assignments(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut fields = BTreeMap::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Field must be in format 'name=value', got '{}'", pair))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Field name is empty in '{}'", pair);
        }
        fields.insert(name.to_string(), value.trim().to_string());
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_assignments() {
        let pairs = vec!["tenure=12".to_string(), "PaymentMethod = Mailed check".to_string()];
        let fields = parse_field_assignments(&pairs).unwrap();

        assert_eq!(fields["tenure"], "12");
        assert_eq!(fields["PaymentMethod"], "Mailed check");

        assert!(parse_field_assignments(&["invalid".to_string()]).is_err());
        assert!(parse_field_assignments(&["=5".to_string()]).is_err());
    }

    #[test]
    fn test_train_overrides() {
        let args = Args::parse_from(["segmentforge", "train", "-k", "6", "--seed", "7"]);
        let Command::Train(train) = args.command else {
            panic!("expected train command");
        };
        let config = train.resolve_config().unwrap();

        assert_eq!(config.kmeans.n_clusters, 6);
        assert_eq!(config.kmeans.seed, 7);
        assert_eq!(config.kmeans.n_runs, 10);
    }

    #[test]
    fn test_predict_fields() {
        let args = Args::parse_from([
            "segmentforge",
            "predict",
            "--field",
            "tenure=3",
            "-f",
            "gender=Male",
        ]);

        match args.command {
            Command::Predict { fields, record, .. } => {
                assert_eq!(fields, vec!["tenure=3", "gender=Male"]);
                assert!(record.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
