//! Decoder: CSV header + data rows into a stream of nested records.
//!
//! One logical entity may span several physical rows: a row that writes a
//! second value into a plain (non-array) column starts a new record at the
//! deepest shared path prefix, a "collapse". Array columns accumulate
//! instead. An all-blank row ends the data block without consuming rows
//! that follow it, so a caller-owned reader can continue with the next
//! script line.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::column::{ColumnDescriptor, ColumnFlag, MemoKind, PathSegment};
use crate::error::DecodeResult;
use crate::record::{coerce_scalar, infer_scalar, Record};

/// Values memorized by `=`/`>` columns, referenced by `@name` path
/// segments. Scoped to the rest of the file, not reset per record.
pub type MemoTable = HashMap<String, String>;

/// Caller-supplied hook for template expressions found in column headers
/// or in cell values. Returning `None` leaves the raw value untouched.
pub trait ValueTransform: Send + Sync {
    fn apply(&self, template: &str, raw: &str) -> Option<String>;
}

/// Decode one data block. Reads the header row from `rows`, then data rows
/// until an all-blank row or the end of the stream. Each completed record
/// goes to `on_record`; returning `false` aborts row consumption.
pub fn decode_block<I, F>(
    rows: &mut I,
    transform: Option<&dyn ValueTransform>,
    mut on_record: F,
) -> DecodeResult<()>
where
    I: Iterator<Item = Result<csv::StringRecord, csv::Error>>,
    F: FnMut(Record) -> bool,
{
    let header = match rows.next() {
        Some(row) => row?,
        None => return Ok(()),
    };

    let columns: Vec<Option<ColumnDescriptor>> = header
        .iter()
        .map(ColumnDescriptor::parse)
        .collect();

    if columns.iter().all(Option::is_none) {
        on_record(Record::new());
        return Ok(());
    }

    let mut record = Record::new();
    let mut memo = MemoTable::new();
    let mut first_row = true;

    for row in rows {
        let row = row?;

        // pass 1: resolve @-paths, feed the memo table, find collapse points
        let mut collapse: HashSet<String> = HashSet::new();
        let mut plan: Vec<Option<Vec<String>>> = vec![None; columns.len()];
        let mut blank_row = true;

        for (idx, column) in columns.iter().enumerate() {
            let Some(column) = column else { continue };
            let raw = row.get(idx).unwrap_or("");
            if raw.is_empty() {
                continue;
            }
            blank_row = false;

            // a memo value may itself be dotted, so the resolved path is
            // re-split into segments
            let resolved: Vec<String> = column
                .path
                .iter()
                .map(|segment| match segment {
                    PathSegment::Literal(key) => key.clone(),
                    PathSegment::MemoRef(name) => memo
                        .get(name)
                        .cloned()
                        .unwrap_or_else(|| format!("@{name}")),
                })
                .collect::<Vec<String>>()
                .join(".")
                .split('.')
                .map(str::to_string)
                .collect();

            if let Some(directive) = &column.memo {
                let stored = match directive.kind {
                    MemoKind::PathAndValue => format!("{}.{}", resolved.join("."), raw),
                    MemoKind::ValueOnly => raw.to_string(),
                };
                memo.insert(directive.key.clone(), stored);
            }

            if column.flag == ColumnFlag::None && column.memo.is_none() {
                let parent = match resolved.len() {
                    0 | 1 => String::new(),
                    n => resolved[..n - 1].join("."),
                };
                collapse.insert(parent);
            }

            plan[idx] = Some(resolved);
        }

        // an all-blank row ends this data block
        if blank_row {
            break;
        }

        // top-level collapse: the accumulated map is a complete entity
        if collapse.contains("") {
            collapse.clear();
            if !first_row {
                let complete = std::mem::take(&mut record);
                if !on_record(complete) {
                    return Ok(());
                }
            }
        }

        // pass 2: write values into the record map
        for (idx, column) in columns.iter().enumerate() {
            let Some(column) = column else { continue };
            let raw = row.get(idx).unwrap_or("");
            if raw.is_empty() || column.is_memo_only() {
                continue;
            }
            let Some(path) = plan[idx].as_ref() else { continue };

            let mut raw_value = raw.to_string();

            // a cell may itself carry a template expression
            if raw_value.contains("{{") {
                if let Some(hook) = transform {
                    if let Some(rendered) = hook.apply(&raw_value, &raw_value) {
                        let rendered = rendered.trim();
                        if !rendered.is_empty() {
                            raw_value = rendered.to_string();
                        }
                    }
                }
            }

            let mut typed = match column.type_hint {
                Some(hint) => coerce_scalar(&raw_value, hint),
                None => infer_scalar(&raw_value),
            };

            if let (Some(template), Some(hook)) = (&column.template, transform) {
                if let Some(rendered) = hook.apply(template, &raw_value) {
                    let rendered = rendered.trim();
                    if !rendered.is_empty() && rendered != raw_value {
                        typed = infer_scalar(rendered);
                    }
                }
            }

            write_value(&mut record, path, typed, column.flag, &mut collapse);
        }

        first_row = false;
    }

    if !record.is_empty() {
        on_record(record);
    }

    Ok(())
}

/// Decode every record of a single block from a reader. Convenience for
/// the mapping debug surface; streaming callers use [`decode_block`].
pub fn decode_all<R: std::io::Read>(reader: R) -> DecodeResult<Vec<Record>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = csv_reader.records();
    let mut result = Vec::new();
    decode_block(&mut rows, None, |record| {
        result.push(record);
        true
    })?;
    Ok(result)
}

/// Write one leaf value at `path`, honoring pending collapse flags along
/// the way and the column's array semantics at the leaf.
fn write_value(
    record: &mut Record,
    path: &[String],
    value: Value,
    flag: ColumnFlag,
    collapse: &mut HashSet<String>,
) {
    descend(record, "", path, value, flag, collapse);
}

fn descend(
    map: &mut Record,
    prefix: &str,
    path: &[String],
    value: Value,
    flag: ColumnFlag,
    collapse: &mut HashSet<String>,
) {
    let Some(key) = path.first() else { return };

    if path.len() == 1 {
        let append = flag.is_array_like() && map.contains_key(key);
        if append {
            if let Some(existing) = map.get_mut(key) {
                if let Value::Array(list) = existing {
                    list.push(value);
                } else {
                    let old = std::mem::take(existing);
                    *existing = Value::Array(vec![old, value]);
                }
            }
        } else if flag == ColumnFlag::Array {
            map.insert(key.clone(), Value::Array(vec![value]));
        } else {
            map.insert(key.clone(), value);
        }
        return;
    }

    let child_prefix = if prefix.is_empty() {
        key.clone()
    } else {
        format!("{prefix}.{key}")
    };

    let entry = map
        .entry(key.clone())
        .or_insert_with(|| Value::Object(Map::new()));

    // a scalar in the way is replaced by a container
    if !matches!(entry, Value::Object(_) | Value::Array(_)) {
        *entry = Value::Object(Map::new());
    }

    if collapse.remove(&child_prefix) {
        // a new list element starts at this path
        if matches!(entry, Value::Object(m) if !m.is_empty()) {
            let old = std::mem::take(entry);
            *entry = Value::Array(vec![old, Value::Object(Map::new())]);
        } else if let Value::Array(list) = entry {
            list.push(Value::Object(Map::new()));
        }
        // an empty object is already a fresh container
    } else if let Value::Array(list) = entry {
        if !matches!(list.last(), Some(Value::Object(_))) {
            list.push(Value::Object(Map::new()));
        }
    }

    let target = match entry {
        Value::Object(m) => m,
        Value::Array(list) => match list.last_mut() {
            Some(Value::Object(m)) => m,
            _ => return,
        },
        _ => return,
    };

    descend(target, &child_prefix, &path[1..], value, flag, collapse);
}
