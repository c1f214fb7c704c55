//! Column Spec Parser: one CSV header cell into a structured descriptor.
//!
//! Header cell format: `[flag]path [=name | >name] [<type>] [template]`
//!
//! - flag: `~` ignore on collapse lookup, `^` array column, `?` array if
//!   the cell repeats
//! - path: dot-separated identifiers; a leading `@` marks a segment as a
//!   memo-table reference resolved at decode time
//! - `=name` memorizes `path.value`, `>name` memorizes the value only
//! - `<type>`: int | float | bool | string
//! - trailing text containing `{{` is an opaque template expression applied
//!   to the raw value by a caller-supplied hook

use once_cell::sync::Lazy;
use regex::Regex;

use crate::record::TypeHint;

static COLUMN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([~^?])?((?:@?\w+\.)*@?\w+)(\s+(?:=|>)\s*\w+)?(?:\s+<([^>]+)>)?\s*(.*)$")
        .expect("column header regex")
});

/// Collapse behavior flag parsed from the leading character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnFlag {
    /// Plain column, participates in collapse detection.
    #[default]
    None,
    /// `~`: never considered when looking for collapse points.
    IgnoreOnCollapse,
    /// `^`: value is always a list element, appended per row.
    Array,
    /// `?`: becomes a list only when the path receives a second value.
    MaybeArray,
}

impl ColumnFlag {
    /// Array and maybe-array columns accumulate values instead of
    /// starting a new record.
    pub fn is_array_like(self) -> bool {
        matches!(self, ColumnFlag::Array | ColumnFlag::MaybeArray)
    }
}

/// One dotted-path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Literal(String),
    /// `@name`: replaced by the memo table entry `name` at decode time.
    MemoRef(String),
}

/// What a memo directive stores under its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoKind {
    /// `=name`: stores `resolved.path.value`.
    PathAndValue,
    /// `>name`: stores the raw value only.
    ValueOnly,
}

/// Memo directive attached to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoDirective {
    pub kind: MemoKind,
    pub key: String,
}

/// Parsed metadata for one header cell. Built once per decode pass,
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub flag: ColumnFlag,
    pub path: Vec<PathSegment>,
    pub memo: Option<MemoDirective>,
    pub type_hint: Option<TypeHint>,
    pub template: Option<String>,
}

impl ColumnDescriptor {
    /// Parse a header cell. Returns `None` for a blank cell (the column
    /// is skipped entirely). A non-blank cell the grammar does not
    /// recognize degrades to a bare path with no special semantics.
    pub fn parse(header: &str) -> Option<Self> {
        let trimmed = header.trim();
        if trimmed.is_empty() {
            return None;
        }

        let caps = match COLUMN_REGEX.captures(header) {
            Some(caps) => caps,
            None => {
                return Some(Self {
                    flag: ColumnFlag::None,
                    path: parse_path(trimmed),
                    memo: None,
                    type_hint: None,
                    template: None,
                });
            }
        };

        let flag = match caps.get(1).map(|m| m.as_str()) {
            Some("~") => ColumnFlag::IgnoreOnCollapse,
            Some("^") => ColumnFlag::Array,
            Some("?") => ColumnFlag::MaybeArray,
            _ => ColumnFlag::None,
        };

        let path = parse_path(caps.get(2).map(|m| m.as_str()).unwrap_or_default());

        let memo = caps.get(3).and_then(|m| parse_memo(m.as_str()));

        let type_hint = caps.get(4).and_then(|m| TypeHint::parse(m.as_str()));

        let template = caps
            .get(5)
            .map(|m| m.as_str().trim())
            .filter(|t| !t.is_empty() && t.contains("{{"))
            .map(|t| t.to_string());

        Some(Self {
            flag,
            path,
            memo,
            type_hint,
            template,
        })
    }

    /// True when this column only feeds the memo table and never writes
    /// into the record.
    pub fn is_memo_only(&self) -> bool {
        matches!(
            self.memo,
            Some(MemoDirective {
                kind: MemoKind::PathAndValue,
                ..
            })
        )
    }
}

fn parse_path(path: &str) -> Vec<PathSegment> {
    path.split('.')
        .map(|segment| match segment.strip_prefix('@') {
            Some(name) => PathSegment::MemoRef(name.to_string()),
            None => PathSegment::Literal(segment.to_string()),
        })
        .collect()
}

fn parse_memo(text: &str) -> Option<MemoDirective> {
    let text = text.trim();
    let (kind, rest) = if let Some(rest) = text.strip_prefix('=') {
        (MemoKind::PathAndValue, rest)
    } else if let Some(rest) = text.strip_prefix('>') {
        (MemoKind::ValueOnly, rest)
    } else {
        return None;
    };

    let key = rest.trim();
    if key.is_empty() {
        return None;
    }
    Some(MemoDirective {
        kind,
        key: key.to_string(),
    })
}
