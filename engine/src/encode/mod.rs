//! Encoder: nested records back into CSV rows.
//!
//! Column discovery walks every record first: scalar leaves become plain
//! dotted-path headers, scalar lists become `^path` headers, lists of
//! objects recurse so the header set covers every branch seen anywhere in
//! the input. One record then emits one row per longest list it fans out
//! over; scalar cells appear on the first row only.

use std::collections::BTreeMap;
use std::io::Write;

use serde_json::Value;

use crate::error::EncodeResult;
use crate::record::path::{split_path, value_at_path};
use crate::record::{scalar_to_string, Record};

/// Encode `records` through `writer`. The header row is derived from the
/// union of all paths present in the input, sorted by path.
pub fn encode_records<W: Write>(
    records: &[Record],
    writer: &mut csv::Writer<W>,
) -> EncodeResult<()> {
    // path -> header cell, ordered by path
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for record in records {
        collect_columns(record, "", &mut headers);
    }

    let paths: Vec<&String> = headers.keys().collect();
    let cells: Vec<&str> = paths.iter().map(|p| headers[*p].as_str()).collect();
    writer.write_record(&cells)?;
    writer.flush()?;

    let column_count = paths.len();

    for record in records {
        let mut rows: Vec<Vec<String>> = vec![vec![String::new(); column_count]];

        for (column, path) in paths.iter().enumerate() {
            let value = value_at_path(record, &split_path(path));
            match value {
                Some(Value::Array(items)) => {
                    for (line, item) in items.iter().enumerate() {
                        if line >= rows.len() {
                            rows.push(vec![String::new(); column_count]);
                        }
                        rows[line][column] = scalar_to_string(item);
                    }
                }
                Some(other) => rows[0][column] = scalar_to_string(&other),
                None => {}
            }
        }

        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }

    Ok(())
}

/// Encode into an in-memory CSV string.
pub fn encode_to_string(records: &[Record]) -> EncodeResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    encode_records(records, &mut writer)?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn collect_columns(record: &Record, prefix: &str, headers: &mut BTreeMap<String, String>) {
    for (key, value) in record {
        let current = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::Object(nested) => collect_columns(nested, &current, headers),
            Value::Array(items) => {
                let mut objects_inside = false;
                for item in items {
                    if let Value::Object(nested) = item {
                        collect_columns(nested, &current, headers);
                        objects_inside = true;
                    } else {
                        objects_inside = false;
                        break;
                    }
                }
                if !objects_inside {
                    headers.insert(current.clone(), format!("^{current}"));
                }
            }
            _ => {
                headers.insert(current.clone(), current.clone());
            }
        }
    }
}
