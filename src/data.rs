//! Tabular customer data: CSV loading with Polars and training-time cleaning

use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::{info, warn};

use crate::record::{RawRecord, Value};

/// In-memory customer table: ordered column names plus one raw record per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerDataset {
    pub columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl CustomerDataset {
    pub fn new(columns: Vec<String>, records: Vec<RawRecord>) -> Self {
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove a column from the table; returns whether it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c != name);
        for record in &mut self.records {
            record.remove(name);
        }
        self.columns.len() != before
    }

    /// Coerce `column` to numbers and fill nulls with the median of the
    /// remaining values. Text that does not parse counts as null.
    ///
    /// Returns the median used, or `None` when the column is absent or has no
    /// numeric values at all.
    pub fn impute_median(&mut self, column: &str) -> Option<f64> {
        if !self.columns.iter().any(|c| c == column) {
            return None;
        }

        let mut observed = Vec::with_capacity(self.records.len());
        for record in &mut self.records {
            let coerced = record
                .get(column)
                .and_then(|v| v.to_number(column).ok().flatten());
            record.insert(column.to_string(), coerced.into());
            if let Some(v) = coerced {
                observed.push(v);
            }
        }

        let median = median(&mut observed)?;
        let mut filled = 0usize;
        for record in &mut self.records {
            if let Some(value) = record.get_mut(column) {
                if value.is_null() {
                    *value = Value::Number(median);
                    filled += 1;
                }
            }
        }

        info!(column, median, filled, "filled missing values with the median");
        Some(median)
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Load a customer CSV into raw records
///
/// Column dtypes inferred by Polars decide whether a column holds numbers or
/// categories. Empty and `NaN` cells become nulls.
///
/// # Arguments
/// * `file_path` - Path to the CSV file, header row required
///
/// # Returns
/// * `CustomerDataset` with columns in file order and one record per row
pub fn load_csv(file_path: impl AsRef<Path>) -> crate::Result<CustomerDataset> {
    let df = LazyCsvReader::new(file_path.as_ref())
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .finish()?
        .collect()?;

    if df.height() == 0 {
        warn!(path = %file_path.as_ref().display(), "CSV contains no rows");
    }

    let dataset = dataframe_to_dataset(&df)?;
    info!(
        rows = dataset.len(),
        columns = dataset.columns.len(),
        "customer data loaded"
    );
    Ok(dataset)
}

fn dataframe_to_dataset(df: &DataFrame) -> crate::Result<CustomerDataset> {
    let mut columns = Vec::with_capacity(df.width());
    let mut records = vec![RawRecord::new(); df.height()];

    for series in df.get_columns() {
        let name = series.name().to_string();
        let values: Vec<Value> = if series.dtype().is_numeric() {
            series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                // NaN cells are missing values
                .map(|v| Value::from(v.filter(|n| n.is_finite())))
                .collect()
        } else {
            series
                .cast(&DataType::String)?
                .str()?
                .into_iter()
                .map(|v| v.map_or(Value::Null, Value::from))
                .collect()
        };

        for (record, value) in records.iter_mut().zip(values) {
            record.insert(name.clone(), value);
        }
        columns.push(name);
    }

    Ok(CustomerDataset { columns, records })
}

/// Write a customer table as CSV. Columns holding only numbers and nulls are
/// written as floats, everything else as text.
pub fn write_csv(dataset: &CustomerDataset, file_path: impl AsRef<Path>) -> crate::Result<()> {
    let mut series = Vec::with_capacity(dataset.columns.len());
    for name in &dataset.columns {
        let cells: Vec<&Value> = dataset
            .records
            .iter()
            .map(|r| r.get(name).unwrap_or(&Value::Null))
            .collect();

        let numeric = cells.iter().all(|v| !matches!(v, Value::Text(_)));
        let column = if numeric {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|v| match v {
                    Value::Number(n) => Some(*n),
                    _ => None,
                })
                .collect();
            Series::new(name, values)
        } else {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect();
            Series::new(name, values)
        };
        series.push(column);
    }

    let mut df = DataFrame::new(series)?;
    let mut file = File::create(file_path.as_ref())?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;

    info!(
        rows = df.height(),
        path = %file_path.as_ref().display(),
        "customer data written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentationConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customerID,gender,SeniorCitizen,tenure,Contract,MonthlyCharges,TotalCharges").unwrap();
        writeln!(file, "C0001,Female,0,1,Month-to-month,29.85,29.85").unwrap();
        writeln!(file, "C0002,Male,0,34,One year,56.95,1889.5").unwrap();
        writeln!(file, "C0003,Male,1,2,Month-to-month,53.85,").unwrap();
        writeln!(file, "C0004,Female,0,45,Two year,42.30,1840.75").unwrap();
        file
    }

    fn numbers(values: &[Option<f64>]) -> CustomerDataset {
        let records = values
            .iter()
            .map(|v| {
                let mut r = RawRecord::new();
                r.insert("TotalCharges".to_string(), (*v).into());
                r
            })
            .collect();
        CustomerDataset::new(vec!["TotalCharges".to_string()], records)
    }

    #[test]
    fn test_load_csv_infers_types() {
        let test_file = create_test_csv();
        let dataset = load_csv(test_file.path()).unwrap();

        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.columns[0], "customerID");
        assert_eq!(dataset.records[0]["gender"], Value::Text("Female".to_string()));
        assert_eq!(dataset.records[1]["tenure"], Value::Number(34.0));
        assert_eq!(dataset.records[2]["SeniorCitizen"], Value::Number(1.0));
        assert_eq!(dataset.records[2]["TotalCharges"], Value::Null);
    }

    #[test]
    fn test_nan_cell_is_median_filled_for_training() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customerID,tenure,Contract,TotalCharges").unwrap();
        writeln!(file, "C0001,1,Month-to-month,10.0").unwrap();
        writeln!(file, "C0002,30,One year,NaN").unwrap();
        writeln!(file, "C0003,60,Two year,50.0").unwrap();
        writeln!(file, "C0004,2,Month-to-month,20.0").unwrap();

        let dataset = load_csv(file.path()).unwrap();
        assert_eq!(dataset.records[1]["TotalCharges"], Value::Null);

        let config = SegmentationConfig::default().with_clusters(2);
        let bundle = crate::service::train(&dataset, &config).unwrap();
        assert_eq!(bundle.summary().imputed_medians["TotalCharges"], 20.0);
        assert!(bundle.summary().inertia.is_finite());
    }

    #[test]
    fn test_drop_column() {
        let test_file = create_test_csv();
        let mut dataset = load_csv(test_file.path()).unwrap();

        assert!(dataset.drop_column("customerID"));
        assert!(!dataset.drop_column("customerID"));
        assert!(!dataset.columns.contains(&"customerID".to_string()));
        assert!(dataset.records.iter().all(|r| !r.contains_key("customerID")));
    }

    #[test]
    fn test_impute_median_odd_and_even() {
        let mut odd = numbers(&[Some(1.0), None, Some(9.0), Some(4.0)]);
        assert_eq!(odd.impute_median("TotalCharges"), Some(4.0));
        assert_eq!(odd.records[1]["TotalCharges"], Value::Number(4.0));

        let mut even = numbers(&[Some(1.0), Some(3.0), None]);
        assert_eq!(even.impute_median("TotalCharges"), Some(2.0));
        assert_eq!(even.records[2]["TotalCharges"], Value::Number(2.0));
    }

    #[test]
    fn test_impute_median_coerces_text() {
        let mut dataset = numbers(&[Some(10.0), Some(20.0)]);
        dataset.records[0].insert("TotalCharges".to_string(), " ".into());
        dataset.records[1].insert("TotalCharges".to_string(), "20".into());

        assert_eq!(dataset.impute_median("TotalCharges"), Some(20.0));
        assert_eq!(dataset.records[0]["TotalCharges"], Value::Number(20.0));
        assert_eq!(dataset.records[1]["TotalCharges"], Value::Number(20.0));
    }

    #[test]
    fn test_impute_median_missing_column() {
        let mut dataset = numbers(&[Some(1.0)]);
        assert_eq!(dataset.impute_median("tenure"), None);
    }

    #[test]
    fn test_write_then_load_csv() {
        let test_file = create_test_csv();
        let dataset = load_csv(test_file.path()).unwrap();

        let out = NamedTempFile::new().unwrap();
        write_csv(&dataset, out.path()).unwrap();
        let reloaded = load_csv(out.path()).unwrap();

        assert_eq!(reloaded.columns, dataset.columns);
        assert_eq!(reloaded.len(), dataset.len());
        assert_eq!(reloaded.records[2]["TotalCharges"], Value::Null);
        assert_eq!(reloaded.records[3]["Contract"], Value::Text("Two year".to_string()));
    }
}
