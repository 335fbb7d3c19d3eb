//! JSON helpers: formatting, and flattening nested values into dot/bracket
//! keyed maps (`a.b[0].c`) and back.
//!
//! Keys that themselves contain `.`, `[` or `]` do not survive a round trip, nor
//! does a top-level empty key holding a scalar or array (it reads back as the
//! root itself).

use crate::error::{Error, Result};
use serde_json::{Map, Value};

pub fn format_json(value: &Value, pretty: bool) -> Result<String> {
    let out = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    out.map_err(|e| Error::processing("format JSON", e))
}

/// Flatten nested objects and arrays into one level. Scalars and empty
/// containers are leaves; a top-level leaf is stored under the empty key.
pub fn flatten_json(value: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(value, None, &mut out);
    out
}

// `prefix` is `None` only at the root, so an empty key below it still gets its separator.
fn flatten_into(value: &Value, prefix: Option<&str>, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                let key = match prefix {
                    None => k.clone(),
                    Some(p) => format!("{p}.{k}"),
                };
                flatten_into(v, Some(&key), out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, v) in items.iter().enumerate() {
                let key = format!("{}[{i}]", prefix.unwrap_or_default());
                flatten_into(v, Some(&key), out);
            }
        }
        leaf => {
            out.insert(prefix.unwrap_or_default().to_string(), leaf.clone());
        }
    }
}

#[derive(Debug, PartialEq)]
enum Step {
    Key(String),
    Index(usize),
}

fn parse_path(key: &str) -> Vec<Step> {
    let mut steps = Vec::new();
    if key.is_empty() {
        return steps;
    }
    for (pos, segment) in key.split('.').enumerate() {
        let (name, mut rest) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };
        let mut indices = Vec::new();
        while let Some(inner) = rest.strip_prefix('[') {
            let Some((idx, after)) = inner.split_once(']') else {
                break;
            };
            let Ok(idx) = idx.parse::<usize>() else {
                break;
            };
            indices.push(idx);
            rest = after;
        }
        if !rest.is_empty() {
            // Not a clean `name[i][j]` segment; keep it as a literal key.
            steps.push(Step::Key(segment.to_string()));
            continue;
        }
        // A bare `[i]` opens the root array; anywhere else an empty name is an empty key.
        if !name.is_empty() || pos > 0 || indices.is_empty() {
            steps.push(Step::Key(name.to_string()));
        }
        steps.extend(indices.into_iter().map(Step::Index));
    }
    steps
}

/// `max_len` bounds array growth: a dense array flattened into `n` entries never
/// needs an index of `n` or more.
fn insert_at(target: &mut Value, path: &[Step], leaf: Value, max_len: usize) -> Result<()> {
    let Some((step, rest)) = path.split_first() else {
        *target = leaf;
        return Ok(());
    };
    match step {
        Step::Key(k) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(map) = target {
                let slot = map.entry(k.clone()).or_insert(Value::Null);
                return insert_at(slot, rest, leaf, max_len);
            }
            Ok(())
        }
        Step::Index(i) => {
            if !target.is_array() {
                *target = Value::Array(Vec::new());
            }
            if *i >= max_len {
                return Err(Error::Processing(format!(
                    "array index {i} out of range for {max_len} flattened entries"
                )));
            }
            if let Value::Array(items) = target {
                if items.len() <= *i {
                    items.resize(*i + 1, Value::Null);
                }
                return insert_at(&mut items[*i], rest, leaf, max_len);
            }
            Ok(())
        }
    }
}

/// Inverse of [`flatten_json`]. Fails on an array index no flattened value
/// could have produced.
pub fn unflatten_json(flat: &Map<String, Value>) -> Result<Value> {
    let mut root = Value::Null;
    for (key, leaf) in flat {
        insert_at(&mut root, &parse_path(key), leaf.clone(), flat.len())?;
    }
    if root.is_null() && flat.is_empty() {
        Ok(Value::Object(Map::new()))
    } else {
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_uses_dots_and_brackets() {
        let v = json!({"a": {"b": [1, {"c": 2}]}, "d": "x"});
        let flat = flatten_json(&v);
        assert_eq!(
            Value::Object(flat),
            json!({"a.b[0]": 1, "a.b[1].c": 2, "d": "x"})
        );
    }

    #[test]
    fn round_trip_nested_records() {
        let v = json!([
            {"value": 1.5, "Period": "2020", "geo": {"code": "PT", "levels": [1, 2]}},
            {"value": null, "Period": "2021", "tags": [], "extra": {}}
        ]);
        assert_eq!(unflatten_json(&flatten_json(&v)).unwrap(), v);
    }

    #[test]
    fn top_level_scalar_round_trips() {
        let v = json!(42);
        assert_eq!(unflatten_json(&flatten_json(&v)).unwrap(), v);
    }

    #[test]
    fn empty_keys_round_trip() {
        for v in [
            json!({"a": {"": 1}, "b": 2}),
            json!({"": {"a": 1}}),
            json!({"a": {"": [1, {"": true}]}}),
        ] {
            let flat = flatten_json(&v);
            assert_eq!(unflatten_json(&flat).unwrap(), v, "{flat:?}");
        }
        assert_eq!(
            Value::Object(flatten_json(&json!({"a": {"": 1}, "b": 2}))),
            json!({"a.": 1, "b": 2})
        );
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        for key in ["a[18446744073709551615]", "a[100000000000]", "[5]"] {
            let mut flat = Map::new();
            flat.insert(key.into(), json!(1));
            assert!(
                matches!(unflatten_json(&flat), Err(Error::Processing(_))),
                "{key}"
            );
        }
    }

    #[test]
    fn indices_may_arrive_out_of_order() {
        let mut flat = Map::new();
        flat.insert("a[1]".into(), json!("y"));
        flat.insert("a[0]".into(), json!("x"));
        assert_eq!(unflatten_json(&flat).unwrap(), json!({"a": ["x", "y"]}));
    }

    #[test]
    fn path_parsing() {
        assert_eq!(
            parse_path("a.b[2][0].c"),
            vec![
                Step::Key("a".into()),
                Step::Key("b".into()),
                Step::Index(2),
                Step::Index(0),
                Step::Key("c".into())
            ]
        );
        assert_eq!(parse_path("[3]"), vec![Step::Index(3)]);
        assert_eq!(parse_path("x[y]"), vec![Step::Key("x[y]".into())]);
        assert_eq!(
            parse_path("a.[0]"),
            vec![Step::Key("a".into()), Step::Key("".into()), Step::Index(0)]
        );
        assert_eq!(parse_path(".a"), vec![Step::Key("".into()), Step::Key("a".into())]);
    }

    #[test]
    fn format_json_compact_and_pretty() {
        let v = json!({"a": 1});
        assert_eq!(format_json(&v, false).unwrap(), r#"{"a":1}"#);
        assert!(format_json(&v, true).unwrap().contains('\n'));
    }
}
