//! Dimension filter checks run before a data request is sent.
//!
//! Two levels: [`check_key_shape`] only looks at the `DimN` pattern and needs no
//! metadata; [`validate_dimensions`] checks keys and values against an indicator's
//! metadata. Both stop at the first violation, walking the filter in caller order.

use crate::error::{Error, Result};
use crate::models::{DimensionFilter, IndicatorMetadata};
use regex::Regex;
use std::sync::LazyLock;

static DIM_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Dim(\d+)$").expect("dimension key pattern is valid"));

/// Parse the numeric id out of a `DimN` key.
pub fn dimension_id(key: &str) -> Option<u32> {
    DIM_KEY
        .captures(key)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Cheap structural check: every key must look like `DimN`.
pub fn check_key_shape(filter: &DimensionFilter) -> Result<()> {
    for (key, _) in filter.iter() {
        if dimension_id(key).is_none() {
            return Err(Error::Dimension(format!(
                "Invalid dimension key: {key}. Dimension keys must be in format 'Dim1', 'Dim2', etc."
            )));
        }
    }
    Ok(())
}

/// Full check of a filter against the indicator's dimensions and their values.
pub fn validate_dimensions(metadata: &IndicatorMetadata, filter: &DimensionFilter) -> Result<()> {
    for (key, value) in filter.iter() {
        let Some(dimension) = metadata.dimension(key) else {
            return Err(Error::Dimension(format!(
                "Invalid dimension key '{key}' for indicator {}. Available keys: [{}]",
                metadata.code,
                metadata.query_keys().join(", ")
            )));
        };

        if dimension.value(value).is_none() {
            let valid: Vec<&str> = dimension.values.iter().map(|v| v.code.as_str()).collect();
            return Err(Error::Dimension(format!(
                "Invalid value '{value}' for dimension '{key}' of indicator {}. Available values: [{}]",
                metadata.code,
                valid.join(", ")
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dimension, DimensionValue, Language};

    fn metadata() -> IndicatorMetadata {
        let values = |codes: &[&str]| {
            codes
                .iter()
                .map(|c| DimensionValue {
                    code: (*c).into(),
                    label: (*c).into(),
                })
                .collect()
        };
        IndicatorMetadata {
            code: "0004167".into(),
            title: "Resident population".into(),
            language: Language::En,
            unit: None,
            dimensions: vec![
                Dimension {
                    id: 1,
                    name: "Period".into(),
                    values: values(&["2020", "2021", "2023"]),
                },
                Dimension {
                    id: 2,
                    name: "Geographic localization".into(),
                    values: values(&["1", "2"]),
                },
            ],
        }
    }

    #[test]
    fn dimension_id_parses_only_exact_pattern() {
        assert_eq!(dimension_id("Dim1"), Some(1));
        assert_eq!(dimension_id("Dim12"), Some(12));
        assert_eq!(dimension_id("dim1"), None);
        assert_eq!(dimension_id("Dim"), None);
        assert_eq!(dimension_id("Dim1a"), None);
        assert_eq!(dimension_id("XDim1"), None);
    }

    #[test]
    fn key_shape_rejects_non_dim_keys() {
        let ok = DimensionFilter::new().with("Dim1", "x").with("Dim7", "y");
        assert!(check_key_shape(&ok).is_ok());
        let bad = DimensionFilter::new().with("Dim1", "x").with("Region", "y");
        let err = check_key_shape(&bad).unwrap_err();
        assert!(err.to_string().contains("Region"));
    }

    #[test]
    fn valid_filter_passes() {
        let f = DimensionFilter::new().with("Dim1", "2023").with("Dim2", "1");
        assert!(validate_dimensions(&metadata(), &f).is_ok());
        assert!(validate_dimensions(&metadata(), &DimensionFilter::new()).is_ok());
    }

    #[test]
    fn unknown_key_is_named_with_valid_keys() {
        let f = DimensionFilter::new().with("Dim3", "value");
        let msg = validate_dimensions(&metadata(), &f).unwrap_err().to_string();
        assert!(msg.contains("Invalid dimension key 'Dim3'"), "{msg}");
        assert!(msg.contains("Dim1, Dim2"), "{msg}");
    }

    #[test]
    fn unknown_value_is_named_with_valid_values() {
        let f = DimensionFilter::new().with("Dim1", "9999");
        let msg = validate_dimensions(&metadata(), &f).unwrap_err().to_string();
        assert!(msg.contains("Invalid value '9999' for dimension 'Dim1'"), "{msg}");
        assert!(msg.contains("2020, 2021, 2023"), "{msg}");
    }

    #[test]
    fn zero_padded_key_is_not_a_known_dimension() {
        for key in ["Dim01", "Dim001"] {
            let f = DimensionFilter::new().with(key, "2020");
            let msg = validate_dimensions(&metadata(), &f).unwrap_err().to_string();
            assert!(msg.contains(&format!("Invalid dimension key '{key}'")), "{msg}");
        }
    }

    #[test]
    fn first_violation_in_caller_order_wins() {
        let f = DimensionFilter::new().with("Dim2", "9").with("Dim9", "1");
        let msg = validate_dimensions(&metadata(), &f).unwrap_err().to_string();
        assert!(msg.contains("Invalid value '9'"), "{msg}");
    }
}
