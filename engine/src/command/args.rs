//! Command argument parsing.
//!
//! A stage of a script line is split into whitespace tokens with quote
//! awareness. Tokens containing `=` or `:` outside quotes are named
//! arguments; bare tokens are addressable by their position index.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CommandError, CommandResult};
use crate::model::{Capabilities, Model, ModelRegistry};

const QUOTES: [char; 3] = ['"', '\'', '`'];

/// Split `text` on any of `separators`, leaving quoted runs intact.
/// Quotes stay part of the token; empty tokens are dropped.
pub fn split_quoted(text: &str, separators: &[char]) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        match quote {
            Some(open) if ch == open => {
                quote = None;
                current.push(ch);
            }
            Some(_) => current.push(ch),
            None if QUOTES.contains(&ch) => {
                quote = Some(ch);
                current.push(ch);
            }
            None if separators.contains(&ch) => {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

fn trim_quotes(text: &str) -> String {
    text.trim().trim_matches(|c| QUOTES.contains(&c)).to_string()
}

/// Collect arguments into a name -> value map. `name=value` and
/// `name:value` forms become named entries; with `include_indexes`, bare
/// tokens appear under their position index ("0" is the command name).
pub fn named_args(
    args: &[String],
    include_indexes: bool,
    separators: &[char],
) -> HashMap<String, String> {
    let mut result = HashMap::new();
    for (idx, arg) in args.iter().enumerate() {
        let parts = split_quoted(arg, separators);
        if parts.len() > 1 {
            let key = trim_quotes(&parts[0]);
            let value = trim_quotes(&parts[1..].join(" "));
            result.insert(key, value);
        } else if include_indexes {
            result.insert(idx.to_string(), trim_quotes(arg));
        }
    }
    result
}

/// Resolve the working model from a `model=name` argument or the first
/// positional argument, checking the capabilities the command needs.
pub fn find_model(
    command: &str,
    args: &[String],
    models: &ModelRegistry,
    needed: Capabilities,
) -> CommandResult<Arc<dyn Model>> {
    let named = named_args(args, true, &['=', ':']);
    let mut last_error = None;

    for key in ["model", "1"] {
        if let Some(name) = named.get(key) {
            match models.require(name, needed) {
                Ok(model) => return Ok(model),
                Err(err) => last_error = Some(err),
            }
        }
    }

    match last_error {
        Some(err) => Err(err.into()),
        None => Err(CommandError::MissingArgument {
            command: command.to_string(),
            argument: "model".to_string(),
        }),
    }
}

/// Record field holding the object identifier: `idKey=`, `id=` or `_id=`
/// argument, `_id` by default.
pub fn find_id_key(args: &[String]) -> String {
    let named = named_args(args, false, &['=', ':']);
    for key in ["idKey", "id", "_id"] {
        if let Some(value) = named.get(key) {
            return value.clone();
        }
    }
    "_id".to_string()
}

/// Attribute allow/deny list from `skip=`/`ignore=` (deny) and
/// `use=`/`include=`/`attributes=` (allow) arguments, comma-separated.
pub fn attribute_filter(args: &[String]) -> HashMap<String, bool> {
    let mut result = HashMap::new();
    let named = named_args(args, false, &['=', ':']);

    for key in ["skip", "ignore", "use", "include", "attributes"] {
        if let Some(value) = named.get(key) {
            let allow = !matches!(key, "skip" | "ignore");
            for attribute in value.split(',') {
                result.insert(attribute.trim().to_string(), allow);
            }
        }
    }
    result
}

/// An attribute passes unless the filter explicitly denies it.
pub fn attribute_allowed(filter: &HashMap<String, bool>, attribute: &str) -> bool {
    filter.get(attribute).copied().unwrap_or(true)
}
