use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Response language accepted by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "EN")]
    En,
    #[serde(rename = "PT")]
    Pt,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::Pt => "PT",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EN" => Ok(Language::En),
            "PT" => Ok(Language::Pt),
            other => Err(Error::Validation(format!(
                "Language must be 'EN' or 'PT', got: {other}"
            ))),
        }
    }
}

/// One catalogue entry (a published statistical series).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    /// Agency-assigned code (`varcd`), e.g. `"0004167"`.
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub theme: Option<String>,
    pub subtheme: Option<String>,
    pub keywords: Vec<String>,
    pub periodicity: Option<String>,
    pub last_period: Option<String>,
    pub last_update: Option<NaiveDate>,
    pub geo_last_level: Option<String>,
    pub source: Option<String>,
    pub html_url: Option<String>,
    pub metadata_url: Option<String>,
    pub data_url: Option<String>,
    pub metadata_json_url: Option<String>,
}

/// A selectable code/label pair within a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionValue {
    pub code: String,
    pub label: String,
}

/// A filtering axis of an indicator. `id` N maps to the query key `DimN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: u32,
    pub name: String,
    pub values: Vec<DimensionValue>,
}

impl Dimension {
    /// Query parameter name for this dimension (`Dim1`, `Dim2`, ...).
    pub fn query_key(&self) -> String {
        format!("Dim{}", self.id)
    }

    pub fn value(&self, code: &str) -> Option<&DimensionValue> {
        self.values.iter().find(|v| v.code == code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorMetadata {
    pub code: String,
    pub title: String,
    pub language: Language,
    pub unit: Option<String>,
    pub dimensions: Vec<Dimension>,
}

impl IndicatorMetadata {
    /// Dimension whose query key is exactly `key` (`Dim1`, not `Dim01`).
    pub fn dimension(&self, key: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.query_key() == key)
    }

    /// Valid query keys in dimension order.
    pub fn query_keys(&self) -> Vec<String> {
        self.dimensions.iter().map(Dimension::query_key).collect()
    }
}

/// One normalized observation: a nullable numeric `value` plus the source's
/// remaining fields, kept verbatim and in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub value: Option<f64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(value: Option<f64>) -> Self {
        Self {
            value,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Whether the record carries `name`. The `value` field always exists.
    pub fn has_field(&self, name: &str) -> bool {
        name == "value" || self.fields.contains_key(name)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Numeric reading of a field; `value` reads the dedicated slot, other
    /// fields are coerced from numbers or numeric strings.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        if name == "value" {
            return self.value;
        }
        match self.fields.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// The record as one flat JSON object (`value` first).
    pub fn to_json(&self) -> Value {
        let mut obj = Map::with_capacity(self.fields.len() + 1);
        obj.insert("value".into(), json_number(self.value));
        for (k, v) in &self.fields {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

/// `Some(x)` as a JSON number, `None` (or a non-finite value) as `null`.
pub(crate) fn json_number(v: Option<f64>) -> Value {
    v.and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Normalized result of one data request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse {
    pub indicator_code: String,
    pub title: String,
    pub language: Language,
    pub unit: Option<String>,
    pub extraction_date: DateTime<Utc>,
    pub data: Vec<Record>,
}

impl DataResponse {
    pub fn new(indicator_code: impl Into<String>, language: Language) -> Self {
        Self {
            indicator_code: indicator_code.into(),
            title: String::new(),
            language,
            unit: None,
            extraction_date: Utc::now(),
            data: Vec::new(),
        }
    }

    /// Sibling response carrying the same metadata and a new record list.
    pub fn with_data(&self, data: Vec<Record>) -> Self {
        Self {
            indicator_code: self.indicator_code.clone(),
            title: self.title.clone(),
            language: self.language,
            unit: self.unit.clone(),
            extraction_date: self.extraction_date,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A list of catalogue entries with the request context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueResponse {
    pub indicators: Vec<Indicator>,
    pub language: Language,
    pub extraction_date: DateTime<Utc>,
    pub total_count: usize,
}

impl CatalogueResponse {
    pub fn new(indicators: Vec<Indicator>, language: Language) -> Self {
        let total_count = indicators.len();
        Self {
            indicators,
            language,
            extraction_date: Utc::now(),
            total_count,
        }
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Indicator> {
        self.indicators.iter()
    }
}

impl<'a> IntoIterator for &'a CatalogueResponse {
    type Item = &'a Indicator;
    type IntoIter = std::slice::Iter<'a, Indicator>;

    fn into_iter(self) -> Self::IntoIter {
        self.indicators.iter()
    }
}

/// Dimension filters in caller order (`Dim1=2023`, `Dim2=1`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFilter(Vec<(String, String)>);

impl DimensionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a filter entry, keeping first-insertion order.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Parse `DimN=value` assignments (as given on the command line).
    pub fn parse_assignments<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::new();
        for item in items {
            let item = item.as_ref();
            let (k, v) = item.split_once('=').ok_or_else(|| {
                Error::Validation(format!(
                    "Dimension format should be 'DimN=value', got '{item}'"
                ))
            })?;
            out.insert(k.trim(), v.trim());
        }
        Ok(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DimensionFilter {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}
