//! Reshape raw API payloads into the uniform record model.
//!
//! Observed data payload shapes:
//! - an object whose `dados`/`Dados` field is a list of points;
//! - an object whose `dados`/`Dados` field maps a period key to a list of points;
//! - a one-element list wrapping either of the above;
//! - a bare list of several points (no wrapper, so no title/unit in the payload).
//!
//! Individual points never fail the whole payload: malformed points are logged and
//! dropped, and values that do not convert to a number become `None`.

use crate::error::{Error, Result};
use crate::models::{Dimension, DimensionValue, IndicatorMetadata, Language, Record};
use serde_json::{Map, Value};

const LOG_TARGET: &str = "ine_rs::normalize";

/// Field names whose content is the observation value.
const VALUE_FIELDS: [&str; 2] = ["valor", "value"];
/// Fields starting with this prefix are internal to the API and dropped.
const INTERNAL_PREFIX: char = '_';

/// Result of normalizing a data payload. Header fields are `None` when the
/// payload does not carry them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedData {
    pub indicator_code: Option<String>,
    pub title: Option<String>,
    pub language: Option<Language>,
    pub unit: Option<String>,
    pub records: Vec<Record>,
}

/// Normalize a decoded data payload.
pub fn normalize_data(raw: &Value) -> Result<NormalizedData> {
    match raw {
        Value::Array(items) => match items.as_slice() {
            [] => Ok(NormalizedData::default()),
            [Value::Object(obj)] => Ok(normalize_wrapper(obj)),
            [_] => Err(Error::Processing(
                "unrecognized response shape: single-element list without an object".into(),
            )),
            points => {
                let records = normalize_points(points);
                let unit = points
                    .iter()
                    .find_map(Value::as_object)
                    .and_then(|p| first_text(p, &["unidade", "unit"]));
                Ok(NormalizedData {
                    unit,
                    records,
                    ..Default::default()
                })
            }
        },
        Value::Object(obj) => Ok(normalize_wrapper(obj)),
        other => Err(Error::Processing(format!(
            "unrecognized response shape: expected object or list, got {}",
            kind_of(other)
        ))),
    }
}

fn normalize_wrapper(obj: &Map<String, Value>) -> NormalizedData {
    let indicator_code = first_text(obj, &["IndicadorCod", "indicador"]);
    let title = first_text(obj, &["IndicadorDsg", "IndicadorNome", "nome"]);
    let language = first_text(obj, &["Lingua", "lang"]).and_then(|l| l.parse().ok());
    let unit = first_text(obj, &["UnidadeMedida", "unidade"]);

    let dados = obj.get("Dados").filter(|v| !is_empty(v)).or_else(|| obj.get("dados"));
    let records = match dados {
        Some(Value::Array(points)) => normalize_points(points),
        Some(Value::Object(by_period)) => {
            let mut points = Vec::new();
            for (period, group) in by_period {
                match group {
                    Value::Array(items) => points.extend(items.iter().cloned()),
                    other => log::debug!(
                        target: LOG_TARGET,
                        "Ignoring non-list entry for period {period}: {}",
                        kind_of(other)
                    ),
                }
            }
            normalize_points(&points)
        }
        _ => Vec::new(),
    };

    NormalizedData {
        indicator_code,
        title,
        language,
        unit,
        records,
    }
}

fn normalize_points(points: &[Value]) -> Vec<Record> {
    points
        .iter()
        .filter_map(|p| match p {
            Value::Object(obj) => Some(normalize_point(obj)),
            other => {
                log::warn!(
                    target: LOG_TARGET,
                    "Failed to process data point: expected object, got {}",
                    kind_of(other)
                );
                None
            }
        })
        .collect()
}

/// Convert one source point into a record.
pub fn normalize_point(point: &Map<String, Value>) -> Record {
    let mut record = Record::default();
    for (key, value) in point {
        if key.starts_with(INTERNAL_PREFIX) {
            continue;
        }
        if VALUE_FIELDS.contains(&key.as_str()) {
            record.value = coerce_value(value);
        } else {
            record.fields.insert(key.clone(), value.clone());
        }
    }
    record
}

/// Lenient float conversion: anything that is not a finite number degrades to `None`.
pub fn coerce_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!(
                    target: LOG_TARGET,
                    "Could not convert value '{s}' to float. Setting to None. Error: {e}"
                );
                None
            }
        },
        other => {
            log::warn!(
                target: LOG_TARGET,
                "Could not convert {} value to float. Setting to None.",
                kind_of(other)
            );
            None
        }
    };
    parsed.filter(|v| v.is_finite())
}

/// Normalize a metadata payload into [`IndicatorMetadata`].
///
/// `code` and `language` fill in fields the payload leaves out.
pub fn normalize_metadata(raw: &Value, code: &str, language: Language) -> Result<IndicatorMetadata> {
    let obj = match raw {
        Value::Object(obj) => obj,
        Value::Array(items) => match items.as_slice() {
            [Value::Object(obj)] => obj,
            _ => {
                return Err(Error::Processing(format!(
                    "unrecognized metadata shape: list of {} elements",
                    items.len()
                )));
            }
        },
        other => {
            return Err(Error::Processing(format!(
                "unrecognized metadata shape: {}",
                kind_of(other)
            )));
        }
    };

    let dimensions = match obj.get("dimensoes").or_else(|| obj.get("Dimensoes")) {
        Some(Value::Array(dims)) => dims.iter().filter_map(parse_dimension).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(Error::Processing(format!(
                "unrecognized dimensions shape: {}",
                kind_of(other)
            )));
        }
    };

    Ok(IndicatorMetadata {
        code: first_text(obj, &["indicador", "IndicadorCod"]).unwrap_or_else(|| code.to_string()),
        title: first_text(obj, &["nome", "IndicadorNome", "IndicadorDsg"]).unwrap_or_default(),
        language: first_text(obj, &["lang", "Lingua"])
            .and_then(|l| l.parse().ok())
            .unwrap_or(language),
        unit: first_text(obj, &["unidade", "UnidadeMedida"]),
        dimensions,
    })
}

fn parse_dimension(raw: &Value) -> Option<Dimension> {
    let obj = raw.as_object()?;
    let id = match first_text(obj, &["id", "dim_num"]).and_then(|s| s.parse::<u32>().ok()) {
        Some(id) => id,
        None => {
            log::warn!(target: LOG_TARGET, "Skipping dimension without numeric id: {raw}");
            return None;
        }
    };
    let name = first_text(obj, &["nome", "abrv", "name"]).unwrap_or_default();
    let values = match obj.get("valores").or_else(|| obj.get("values")) {
        Some(Value::Array(vals)) => vals
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|v| {
                let code = first_text(v, &["codigo", "cat_id", "code"])?;
                let label = first_text(v, &["label", "categ_dsg"]).unwrap_or_else(|| code.clone());
                Some(DimensionValue { code, label })
            })
            .collect(),
        _ => Vec::new(),
    };
    Some(Dimension { id, name, values })
}

/// First non-empty textual value among `keys` (numbers are stringified).
fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
