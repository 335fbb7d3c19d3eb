use crate::models::{DataResponse, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Summary statistics for one group of records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    /// Group label; `None` when the records were not grouped.
    pub group: Option<String>,
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

fn group_label(record: &Record, field: &str) -> String {
    match record.field(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Count/missing/min/max/mean/median of `value`, optionally grouped by a field.
/// Groups are returned sorted by label.
pub fn grouped_summary(records: &[Record], group_by: Option<&str>) -> Vec<Summary> {
    let mut groups: BTreeMap<Option<String>, (Vec<f64>, usize)> = BTreeMap::new();
    for r in records {
        let key = group_by.map(|f| group_label(r, f));
        let entry = groups.entry(key).or_default();
        match r.value {
            Some(v) if v.is_finite() => entry.0.push(v),
            _ => entry.1 += 1,
        }
    }

    let mut out = Vec::new();
    for (group, (mut vals, missing)) in groups {
        vals.sort_by(f64::total_cmp);
        let count = vals.len();
        let min = vals.first().cloned();
        let max = vals.last().cloned();
        let mean = if count > 0 {
            Some(vals.iter().copied().sum::<f64>() / count as f64)
        } else {
            None
        };
        let median = if count == 0 {
            None
        } else if count % 2 == 1 {
            Some(vals[count / 2])
        } else {
            Some((vals[count / 2 - 1] + vals[count / 2]) / 2.0)
        };
        out.push(Summary {
            group,
            count,
            missing,
            min,
            max,
            mean,
            median,
        });
    }
    out
}

impl DataResponse {
    pub fn summary(&self, group_by: Option<&str>) -> Vec<Summary> {
        grouped_summary(&self.data, group_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ungrouped_summary() {
        let recs = vec![
            Record::new(Some(3.0)),
            Record::new(None),
            Record::new(Some(1.0)),
            Record::new(Some(2.0)),
        ];
        let s = grouped_summary(&recs, None);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].group, None);
        assert_eq!(s[0].count, 3);
        assert_eq!(s[0].missing, 1);
        assert_eq!(s[0].median, Some(2.0));
        assert_eq!(s[0].mean, Some(2.0));
    }

    #[test]
    fn all_missing_group_has_no_stats() {
        let recs = vec![Record::new(None).with_field("geo", "PT")];
        let s = grouped_summary(&recs, Some("geo"));
        assert_eq!(s[0].group.as_deref(), Some("PT"));
        assert_eq!(s[0].count, 0);
        assert_eq!(s[0].missing, 1);
        assert_eq!(s[0].min, None);
        assert_eq!(s[0].median, None);
    }
}
