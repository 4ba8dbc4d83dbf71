//! Synthetic telecom customer data for demos and tests

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::data::CustomerDataset;
use crate::record::*;

/// Share of rows whose `TotalCharges` is blanked out.
pub const NULL_TOTAL_CHARGES_RATE: f64 = 0.01;

const NO_INTERNET: &str = "No internet service";
const NO_PHONE: &str = "No phone service";

fn weighted<'a, R: Rng>(rng: &mut R, options: &[&'a str], weights: &[f64]) -> &'a str {
    match WeightedIndex::new(weights) {
        Ok(dist) => options[dist.sample(rng)],
        Err(_) => options[0],
    }
}

fn pick<'a, R: Rng>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or(options[0])
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generate `n` customers. The same seed always yields the same table.
pub fn generate_customers(n: usize, seed: u64) -> CustomerDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(n);

    for i in 0..n {
        let phone_service = weighted(&mut rng, &["Yes", "No"], &[0.9, 0.1]);
        let internet_service = weighted(&mut rng, &["DSL", "Fiber optic", "No"], &[0.35, 0.45, 0.2]);
        let addon = |rng: &mut StdRng| {
            if internet_service == "No" {
                NO_INTERNET
            } else {
                pick(rng, &["Yes", "No"])
            }
        };

        let mut record = RawRecord::new();
        record.insert(CUSTOMER_ID.into(), Value::Text(format!("C{:04}", i + 1)));
        record.insert(GENDER.into(), pick(&mut rng, &["Male", "Female"]).into());
        record.insert(
            SENIOR_CITIZEN.into(),
            Value::Number(if rng.gen_bool(0.2) { 1.0 } else { 0.0 }),
        );
        record.insert(PARTNER.into(), weighted(&mut rng, &["Yes", "No"], &[0.5, 0.5]).into());
        record.insert(DEPENDENTS.into(), weighted(&mut rng, &["Yes", "No"], &[0.3, 0.7]).into());
        record.insert(
            CONTRACT.into(),
            weighted(
                &mut rng,
                &["Month-to-month", "One year", "Two year"],
                &[0.5, 0.3, 0.2],
            )
            .into(),
        );
        record.insert(
            PAPERLESS_BILLING.into(),
            weighted(&mut rng, &["Yes", "No"], &[0.6, 0.4]).into(),
        );
        record.insert(
            PAYMENT_METHOD.into(),
            weighted(
                &mut rng,
                &[
                    "Electronic check",
                    "Mailed check",
                    "Bank transfer (automatic)",
                    "Credit card (automatic)",
                ],
                &[0.3, 0.2, 0.25, 0.25],
            )
            .into(),
        );
        record.insert(PHONE_SERVICE.into(), phone_service.into());
        let multiple_lines = if phone_service == "Yes" {
            pick(&mut rng, &["No", "Yes", NO_PHONE])
        } else {
            NO_PHONE
        };
        record.insert(MULTIPLE_LINES.into(), multiple_lines.into());
        record.insert(INTERNET_SERVICE.into(), internet_service.into());
        for name in [
            ONLINE_SECURITY,
            ONLINE_BACKUP,
            DEVICE_PROTECTION,
            TECH_SUPPORT,
            STREAMING_TV,
            STREAMING_MOVIES,
        ] {
            record.insert(name.into(), addon(&mut rng).into());
        }

        let tenure: i64 = rng.gen_range(1..73);
        let monthly = rng.gen_range(20.0..120.0);
        let total = monthly * tenure as f64 * rng.gen_range(0.9..1.1);
        record.insert(TENURE.into(), Value::Number(tenure as f64));
        record.insert(MONTHLY_CHARGES.into(), Value::Number(round2(monthly)));
        record.insert(TOTAL_CHARGES.into(), Value::Number(round2(total)));

        records.push(record);
    }

    let nulls = (n as f64 * NULL_TOTAL_CHARGES_RATE) as usize;
    for row in index::sample(&mut rng, n, nulls.min(n)).into_iter() {
        records[row].insert(TOTAL_CHARGES.into(), Value::Null);
    }
    info!(rows = n, null_total_charges = nulls, "synthetic customers generated");

    let mut columns = vec![CUSTOMER_ID.to_string()];
    columns.extend(CUSTOMER_FIELDS.iter().map(|s| s.to_string()));
    CustomerDataset::new(columns, records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_columns() {
        let dataset = generate_customers(200, 7);

        assert_eq!(dataset.len(), 200);
        assert_eq!(dataset.columns.len(), 20);
        assert!(dataset
            .records
            .iter()
            .all(|r| dataset.columns.iter().all(|c| r.contains_key(c))));
    }

    #[test]
    fn test_same_seed_same_data() {
        assert_eq!(generate_customers(50, 3), generate_customers(50, 3));
        assert_ne!(generate_customers(50, 3), generate_customers(50, 4));
    }

    #[test]
    fn test_null_total_charges() {
        let dataset = generate_customers(500, 11);
        let nulls = dataset
            .records
            .iter()
            .filter(|r| r[TOTAL_CHARGES].is_null())
            .count();

        assert_eq!(nulls, 5);
    }

    #[test]
    fn test_internet_dependent_addons() {
        let dataset = generate_customers(300, 5);
        for record in &dataset.records {
            let no_internet = record[INTERNET_SERVICE] == Value::from("No");
            assert_eq!(record[STREAMING_TV] == Value::from(NO_INTERNET), no_internet);
            if record[PHONE_SERVICE] == Value::from("No") {
                assert_eq!(record[MULTIPLE_LINES], Value::from(NO_PHONE));
            }
        }
    }

    #[test]
    fn test_values_within_form_options() {
        let dataset = generate_customers(100, 9);
        for (field, options) in FORM_OPTIONS {
            for record in &dataset.records {
                let value = record[*field].to_category();
                assert!(options.contains(&value.as_str()), "{field}: {value}");
            }
        }
    }
}
