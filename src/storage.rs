//! File export: CSV with an optional `# key: value` metadata block, JSON
//! documents and JSON Lines.

use crate::error::{Error, Result};
use crate::models::{DataResponse, Record};
use csv::{ReaderBuilder, WriterBuilder};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const LOG_TARGET: &str = "ine_rs::storage";

const META_PREFIX: &str = "# ";

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .map_err(|e| Error::processing(format!("create directory '{}'", dir.display()), e)),
        _ => Ok(()),
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    ensure_parent(path)?;
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| Error::processing(format!("create '{}'", path.display()), e))
}

/// Prefix cells a spreadsheet would evaluate as a formula with `'`.
pub fn guard_cell(s: &str) -> String {
    let risky = match s.chars().next() {
        Some('=' | '+' | '@') => true,
        Some('-') => s.trim().parse::<f64>().is_err(),
        _ => false,
    };
    if risky { format!("'{s}") } else { s.to_string() }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => guard_cell(s),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => guard_cell(&other.to_string()),
    }
}

/// Column names: `value` first, then every field in first-seen order.
pub fn columns(records: &[Record]) -> Vec<String> {
    let mut cols = vec!["value".to_string()];
    for r in records {
        for k in r.fields.keys() {
            if !cols.iter().any(|c| c == k) {
                cols.push(k.clone());
            }
        }
    }
    cols
}

fn metadata_lines(resp: &DataResponse) -> Vec<(&'static str, String)> {
    vec![
        ("indicator", resp.indicator_code.clone()),
        ("title", resp.title.clone()),
        ("unit", resp.unit.clone().unwrap_or_default()),
        ("language", resp.language.to_string()),
        ("extraction_date", resp.extraction_date.to_rfc3339()),
    ]
}

/// Save the records of `resp` as CSV with a header row. With `include_metadata`,
/// `# key: value` lines describing the indicator precede the table.
pub fn save_csv<P: AsRef<Path>>(resp: &DataResponse, path: P, include_metadata: bool) -> Result<()> {
    let path = path.as_ref();
    let ctx = || format!("write CSV '{}'", path.display());
    let mut out = create(path)?;
    if include_metadata {
        for (k, v) in metadata_lines(resp) {
            let v = v.replace(['\r', '\n'], " ");
            writeln!(out, "{META_PREFIX}{k}: {v}").map_err(|e| Error::processing(ctx(), e))?;
        }
    }

    let cols = columns(&resp.data);
    let mut wtr = WriterBuilder::new().from_writer(out);
    let header: Vec<String> = cols.iter().map(|c| guard_cell(c)).collect();
    wtr.write_record(&header).map_err(|e| Error::processing(ctx(), e))?;
    for r in &resp.data {
        let row: Vec<String> = cols
            .iter()
            .map(|c| match c.as_str() {
                "value" => r.value.map(|v| v.to_string()).unwrap_or_default(),
                name => cell(r.field(name)),
            })
            .collect();
        wtr.write_record(&row).map_err(|e| Error::processing(ctx(), e))?;
    }
    wtr.flush().map_err(|e| Error::processing(ctx(), e))?;
    log::info!(target: LOG_TARGET, "Saved {} rows to {}", resp.len(), path.display());
    Ok(())
}

/// Rows of a CSV file keyed by column name.
pub type CsvRows = Vec<BTreeMap<String, String>>;

/// Read a CSV written by [`save_csv`], splitting off the metadata block.
pub fn read_csv_with_metadata<P: AsRef<Path>>(path: P) -> Result<(BTreeMap<String, String>, CsvRows)> {
    let path = path.as_ref();
    let ctx = || format!("read CSV '{}'", path.display());
    let text = fs::read_to_string(path).map_err(|e| Error::processing(ctx(), e))?;

    let mut metadata = BTreeMap::new();
    let mut body_start = 0;
    for line in text.split_inclusive('\n') {
        let Some(rest) = line.strip_prefix('#') else {
            break;
        };
        body_start += line.len();
        if let Some((k, v)) = rest.trim().split_once(':') {
            metadata.insert(k.trim().to_string(), v.trim().to_string());
        }
    }

    let mut rdr = ReaderBuilder::new().from_reader(text[body_start..].as_bytes());
    let headers = rdr.headers().map_err(|e| Error::processing(ctx(), e))?.clone();
    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| Error::processing(ctx(), e))?;
        rows.push(
            headers
                .iter()
                .zip(rec.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }
    Ok((metadata, rows))
}

/// Save the whole response (metadata plus records) as one JSON document.
pub fn save_json<P: AsRef<Path>>(resp: &DataResponse, path: P, pretty: bool) -> Result<()> {
    let path = path.as_ref();
    let ctx = || format!("write JSON '{}'", path.display());
    let mut out = create(path)?;
    let res = if pretty {
        serde_json::to_writer_pretty(&mut out, resp)
    } else {
        serde_json::to_writer(&mut out, resp)
    };
    res.map_err(|e| Error::processing(ctx(), e))?;
    out.flush().map_err(|e| Error::processing(ctx(), e))?;
    log::info!(target: LOG_TARGET, "Saved {} records to {}", resp.len(), path.display());
    Ok(())
}

/// One JSON object per line.
pub fn save_jsonl<P: AsRef<Path>>(records: &[Record], path: P) -> Result<()> {
    let path = path.as_ref();
    let ctx = || format!("write JSON Lines '{}'", path.display());
    let mut out = create(path)?;
    for r in records {
        serde_json::to_writer(&mut out, &r.to_json()).map_err(|e| Error::processing(ctx(), e))?;
        out.write_all(b"\n").map_err(|e| Error::processing(ctx(), e))?;
    }
    out.flush().map_err(|e| Error::processing(ctx(), e))
}

/// Read JSON Lines, skipping blank lines, up to `max_lines` values.
pub fn read_jsonl<P: AsRef<Path>>(path: P, max_lines: Option<usize>) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::processing(format!("open '{}'", path.display()), e))?;
    let mut out = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        if max_lines.is_some_and(|max| out.len() >= max) {
            break;
        }
        let line = line.map_err(|e| Error::processing(format!("read '{}'", path.display()), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| {
            Error::processing(format!("invalid JSON on line {} of '{}'", i + 1, path.display()), e)
        })?;
        out.push(value);
    }
    Ok(out)
}
