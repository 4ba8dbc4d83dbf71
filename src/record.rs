//! Raw customer records and the typed telecom customer form

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SegmentError;

/// Placeholder used when a categorical attribute is null.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// A single attribute value as it arrives from a file or a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric reading of the value. Text is parsed; blank text counts as null.
    /// NaN and infinities are rejected.
    pub fn to_number(&self, field: &str) -> crate::Result<Option<f64>> {
        let number = match self {
            Value::Number(n) => *n,
            Value::Null => return Ok(None),
            Value::Text(s) if s.trim().is_empty() => return Ok(None),
            Value::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                SegmentError::input(field, format!("expected a number, got {s:?}"))
            })?,
        };
        if !number.is_finite() {
            return Err(SegmentError::input(
                field,
                format!("expected a finite number, got {self}"),
            ));
        }
        Ok(Some(number))
    }

    /// Category label of the value; nulls become [`UNKNOWN_CATEGORY`].
    pub fn to_category(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Null => UNKNOWN_CATEGORY.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{s}"),
            Value::Null => Ok(()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Value::Null, Value::Number)
    }
}

/// Whole numbers print without a fractional part so `1.0` and `1` name the same category.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// One customer: feature name to value. Identity beyond the features is not kept.
pub type RawRecord = BTreeMap<String, Value>;

pub const GENDER: &str = "gender";
pub const SENIOR_CITIZEN: &str = "SeniorCitizen";
pub const PARTNER: &str = "Partner";
pub const DEPENDENTS: &str = "Dependents";
pub const TENURE: &str = "tenure";
pub const PHONE_SERVICE: &str = "PhoneService";
pub const MULTIPLE_LINES: &str = "MultipleLines";
pub const INTERNET_SERVICE: &str = "InternetService";
pub const ONLINE_SECURITY: &str = "OnlineSecurity";
pub const ONLINE_BACKUP: &str = "OnlineBackup";
pub const DEVICE_PROTECTION: &str = "DeviceProtection";
pub const TECH_SUPPORT: &str = "TechSupport";
pub const STREAMING_TV: &str = "StreamingTV";
pub const STREAMING_MOVIES: &str = "StreamingMovies";
pub const CONTRACT: &str = "Contract";
pub const PAPERLESS_BILLING: &str = "PaperlessBilling";
pub const PAYMENT_METHOD: &str = "PaymentMethod";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const TOTAL_CHARGES: &str = "TotalCharges";
pub const CUSTOMER_ID: &str = "customerID";

/// The 19 customer attributes in their canonical column order.
pub const CUSTOMER_FIELDS: [&str; 19] = [
    GENDER,
    SENIOR_CITIZEN,
    PARTNER,
    DEPENDENTS,
    TENURE,
    PHONE_SERVICE,
    MULTIPLE_LINES,
    INTERNET_SERVICE,
    ONLINE_SECURITY,
    ONLINE_BACKUP,
    DEVICE_PROTECTION,
    TECH_SUPPORT,
    STREAMING_TV,
    STREAMING_MOVIES,
    CONTRACT,
    PAPERLESS_BILLING,
    PAYMENT_METHOD,
    MONTHLY_CHARGES,
    TOTAL_CHARGES,
];

const YES_NO: &[&str] = &["Yes", "No"];
const INTERNET_ADDON: &[&str] = &["No internet service", "No", "Yes"];

/// Allowed values for each categorical form field.
pub const FORM_OPTIONS: &[(&str, &[&str])] = &[
    (GENDER, &["Male", "Female"]),
    (PARTNER, YES_NO),
    (DEPENDENTS, YES_NO),
    (PHONE_SERVICE, YES_NO),
    (MULTIPLE_LINES, &["No phone service", "No", "Yes"]),
    (INTERNET_SERVICE, &["DSL", "Fiber optic", "No"]),
    (ONLINE_SECURITY, INTERNET_ADDON),
    (ONLINE_BACKUP, INTERNET_ADDON),
    (DEVICE_PROTECTION, INTERNET_ADDON),
    (TECH_SUPPORT, INTERNET_ADDON),
    (STREAMING_TV, INTERNET_ADDON),
    (STREAMING_MOVIES, INTERNET_ADDON),
    (CONTRACT, &["Month-to-month", "One year", "Two year"]),
    (PAPERLESS_BILLING, YES_NO),
    (
        PAYMENT_METHOD,
        &[
            "Electronic check",
            "Mailed check",
            "Bank transfer (automatic)",
            "Credit card (automatic)",
        ],
    ),
];

/// A telecom customer as submitted through the prediction form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub gender: String,
    pub senior_citizen: i64,
    pub partner: String,
    pub dependents: String,
    pub tenure: i64,
    pub phone_service: String,
    pub multiple_lines: String,
    pub internet_service: String,
    pub online_security: String,
    pub online_backup: String,
    pub device_protection: String,
    pub tech_support: String,
    pub streaming_tv: String,
    pub streaming_movies: String,
    pub contract: String,
    pub paperless_billing: String,
    pub payment_method: String,
    pub monthly_charges: f64,
    /// Blank for brand-new customers.
    pub total_charges: Option<f64>,
}

impl CustomerRecord {
    /// Parse submitted form fields, failing on the first field that does not validate.
    pub fn parse(fields: &BTreeMap<String, String>) -> crate::Result<Self> {
        Ok(Self {
            gender: parse_text(fields, GENDER)?,
            senior_citizen: parse_int(fields, SENIOR_CITIZEN)?,
            partner: parse_text(fields, PARTNER)?,
            dependents: parse_text(fields, DEPENDENTS)?,
            tenure: parse_int(fields, TENURE)?,
            phone_service: parse_text(fields, PHONE_SERVICE)?,
            multiple_lines: parse_text(fields, MULTIPLE_LINES)?,
            internet_service: parse_text(fields, INTERNET_SERVICE)?,
            online_security: parse_text(fields, ONLINE_SECURITY)?,
            online_backup: parse_text(fields, ONLINE_BACKUP)?,
            device_protection: parse_text(fields, DEVICE_PROTECTION)?,
            tech_support: parse_text(fields, TECH_SUPPORT)?,
            streaming_tv: parse_text(fields, STREAMING_TV)?,
            streaming_movies: parse_text(fields, STREAMING_MOVIES)?,
            contract: parse_text(fields, CONTRACT)?,
            paperless_billing: parse_text(fields, PAPERLESS_BILLING)?,
            payment_method: parse_text(fields, PAYMENT_METHOD)?,
            monthly_charges: parse_float(fields, MONTHLY_CHARGES)?,
            total_charges: parse_optional_float(fields, TOTAL_CHARGES)?,
        })
    }

    pub fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::new();
        raw.insert(GENDER.into(), self.gender.as_str().into());
        raw.insert(SENIOR_CITIZEN.into(), self.senior_citizen.into());
        raw.insert(PARTNER.into(), self.partner.as_str().into());
        raw.insert(DEPENDENTS.into(), self.dependents.as_str().into());
        raw.insert(TENURE.into(), self.tenure.into());
        raw.insert(PHONE_SERVICE.into(), self.phone_service.as_str().into());
        raw.insert(MULTIPLE_LINES.into(), self.multiple_lines.as_str().into());
        raw.insert(INTERNET_SERVICE.into(), self.internet_service.as_str().into());
        raw.insert(ONLINE_SECURITY.into(), self.online_security.as_str().into());
        raw.insert(ONLINE_BACKUP.into(), self.online_backup.as_str().into());
        raw.insert(DEVICE_PROTECTION.into(), self.device_protection.as_str().into());
        raw.insert(TECH_SUPPORT.into(), self.tech_support.as_str().into());
        raw.insert(STREAMING_TV.into(), self.streaming_tv.as_str().into());
        raw.insert(STREAMING_MOVIES.into(), self.streaming_movies.as_str().into());
        raw.insert(CONTRACT.into(), self.contract.as_str().into());
        raw.insert(PAPERLESS_BILLING.into(), self.paperless_billing.as_str().into());
        raw.insert(PAYMENT_METHOD.into(), self.payment_method.as_str().into());
        raw.insert(MONTHLY_CHARGES.into(), self.monthly_charges.into());
        raw.insert(TOTAL_CHARGES.into(), self.total_charges.into());
        raw
    }
}

fn field<'a>(fields: &'a BTreeMap<String, String>, name: &str) -> crate::Result<&'a str> {
    fields
        .get(name)
        .map(|s| s.trim())
        .ok_or_else(|| SegmentError::input(name, "field is missing"))
}

fn parse_text(fields: &BTreeMap<String, String>, name: &str) -> crate::Result<String> {
    let value = field(fields, name)?;
    if value.is_empty() {
        return Err(SegmentError::input(name, "value is empty"));
    }
    Ok(value.to_string())
}

fn parse_int(fields: &BTreeMap<String, String>, name: &str) -> crate::Result<i64> {
    let value = field(fields, name)?;
    value
        .parse()
        .map_err(|_| SegmentError::input(name, format!("expected an integer, got {value:?}")))
}

fn parse_float(fields: &BTreeMap<String, String>, name: &str) -> crate::Result<f64> {
    let value = field(fields, name)?;
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(SegmentError::input(name, format!("expected a number, got {value:?}"))),
    }
}

fn parse_optional_float(fields: &BTreeMap<String, String>, name: &str) -> crate::Result<Option<f64>> {
    match fields.get(name).map(|s| s.trim()) {
        None | Some("") => Ok(None),
        Some(_) => parse_float(fields, name).map(Some),
    }
}
