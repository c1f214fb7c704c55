//! Built-in pipeline commands.
//!
//! `INSERT`, `UPDATE` and `DELETE` talk to the model layer; `STORE` and
//! `ALIAS` only move values into the exchange; `MEDIA` attaches fetched
//! content to the previous stage's output; `ATTRIBUTE_ADD` widens a
//! model's schema once per script line.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::api::logs::log_error;
use crate::error::{CommandError, CommandResult};
use crate::model::{AttributeInfo, Capabilities, Instance, Model, ModelRegistry};
use crate::record::{value_to_string, Record};

use super::args::{attribute_allowed, attribute_filter, find_id_key, find_model, named_args};
use super::{Exchange, ExchangeValue, ImportCommand, SharedInstance};

const SKIP_ERRORS_ARG: &str = "--skipErrors";

fn share(instance: Box<dyn Instance>) -> SharedInstance {
    Arc::new(Mutex::new(instance))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

// =============================================================================
// INSERT
// =============================================================================

/// Creates and persists one instance per record.
#[derive(Default)]
pub struct InsertCommand {
    model: Option<Arc<dyn Model>>,
    attributes: HashMap<String, bool>,
    skip_errors: bool,
}

impl ImportCommand for InsertCommand {
    fn init(
        &mut self,
        args: &[String],
        models: &ModelRegistry,
        _exchange: &mut Exchange,
    ) -> CommandResult<()> {
        let needed = Capabilities {
            storable: true,
            object: true,
            ..Capabilities::default()
        };
        self.model = Some(find_model("INSERT", args, models, needed)?);
        self.attributes = attribute_filter(args);
        self.skip_errors = args.iter().any(|arg| arg == SKIP_ERRORS_ARG);
        Ok(())
    }

    fn process(
        &mut self,
        record: &Record,
        _input: Option<SharedInstance>,
        _exchange: &mut Exchange,
    ) -> CommandResult<Option<SharedInstance>> {
        let model = self.model.as_ref().ok_or_else(|| CommandError::BadInput {
            command: "INSERT".to_string(),
            message: "no model assigned".to_string(),
        })?;

        let mut instance = model.spawn();
        for (attribute, value) in record {
            if !attribute_allowed(&self.attributes, attribute) {
                continue;
            }
            if let Err(err) = instance.set(attribute, value.clone()) {
                if !self.skip_errors {
                    return Err(err.into());
                }
            }
        }

        if let Err(err) = instance.save() {
            if !self.skip_errors {
                return Err(err.into());
            }
        }

        Ok(Some(share(instance)))
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// Loads an instance by identifier and applies the remaining attributes.
/// A record without the identifier field changes nothing in storage; the
/// working instance is handed to the next stage either way.
#[derive(Default)]
pub struct UpdateCommand {
    model: Option<Arc<dyn Model>>,
    attributes: HashMap<String, bool>,
    id_key: String,
}

impl ImportCommand for UpdateCommand {
    fn init(
        &mut self,
        args: &[String],
        models: &ModelRegistry,
        _exchange: &mut Exchange,
    ) -> CommandResult<()> {
        let needed = Capabilities {
            storable: true,
            object: true,
            ..Capabilities::default()
        };
        self.model = Some(find_model("UPDATE", args, models, needed)?);
        self.attributes = attribute_filter(args);
        self.id_key = find_id_key(args);
        Ok(())
    }

    fn process(
        &mut self,
        record: &Record,
        _input: Option<SharedInstance>,
        _exchange: &mut Exchange,
    ) -> CommandResult<Option<SharedInstance>> {
        let model = self.model.as_ref().ok_or_else(|| CommandError::BadInput {
            command: "UPDATE".to_string(),
            message: "no model assigned".to_string(),
        })?;

        let mut instance = model.spawn();
        if let Some(id_value) = record.get(&self.id_key) {
            instance.load(&value_to_string(id_value))?;

            for (attribute, value) in record {
                if attribute == &self.id_key {
                    continue;
                }
                if attribute_allowed(&self.attributes, attribute) {
                    // attribute errors do not stop an update
                    let _ = instance.set(attribute, value.clone());
                }
            }

            instance.save()?;
        }

        Ok(Some(share(instance)))
    }
}

// =============================================================================
// DELETE
// =============================================================================

/// Deletes the instance named by the identifier field. A record without
/// the identifier changes nothing in storage; the working instance is
/// handed to the next stage either way.
#[derive(Default)]
pub struct DeleteCommand {
    model: Option<Arc<dyn Model>>,
    id_key: String,
}

impl ImportCommand for DeleteCommand {
    fn init(
        &mut self,
        args: &[String],
        models: &ModelRegistry,
        _exchange: &mut Exchange,
    ) -> CommandResult<()> {
        let needed = Capabilities {
            storable: true,
            ..Capabilities::default()
        };
        self.model = Some(find_model("DELETE", args, models, needed)?);
        self.id_key = find_id_key(args);
        Ok(())
    }

    fn process(
        &mut self,
        record: &Record,
        _input: Option<SharedInstance>,
        _exchange: &mut Exchange,
    ) -> CommandResult<Option<SharedInstance>> {
        let model = self.model.as_ref().ok_or_else(|| CommandError::BadInput {
            command: "DELETE".to_string(),
            message: "no model assigned".to_string(),
        })?;

        let mut instance = model.spawn();
        if let Some(id_value) = record.get(&self.id_key) {
            instance.set_id(&value_to_string(id_value));
            instance.delete()?;
        }

        Ok(Some(share(instance)))
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Stashes the previous stage's output and/or selected record fields in
/// the exchange, then passes its input through unchanged.
///
/// `STORE obj name=sku` keeps the input object under `obj` and the
/// record's `sku` field under `name`. `prefix=`/`prefixKey=` prepend a
/// literal or a record field's value to every stored field key.
#[derive(Default)]
pub struct StoreCommand {
    store_object_as: Option<String>,
    prefix: Option<String>,
    prefix_key: Option<String>,
    // record field -> exchange key
    store_value_as: HashMap<String, String>,
}

impl ImportCommand for StoreCommand {
    fn init(
        &mut self,
        args: &[String],
        _models: &ModelRegistry,
        _exchange: &mut Exchange,
    ) -> CommandResult<()> {
        let named = named_args(args, false, &['=', ':']);

        if args.len() > 1 && named.len() != args.len() - 1 {
            self.store_object_as = Some(args[1].clone());
        }

        for (name, value) in named {
            match name.as_str() {
                "prefix" => self.prefix = Some(value),
                "prefixKey" => self.prefix_key = Some(value),
                _ => {
                    self.store_value_as.insert(value, name);
                }
            }
        }
        Ok(())
    }

    fn process(
        &mut self,
        record: &Record,
        input: Option<SharedInstance>,
        exchange: &mut Exchange,
    ) -> CommandResult<Option<SharedInstance>> {
        if let Some(key) = &self.store_object_as {
            let value = match &input {
                Some(shared) => ExchangeValue::Object(Arc::clone(shared)),
                None => ExchangeValue::Scalar(Value::Null),
            };
            exchange.insert(key.clone(), value);
        }

        let mut prefix = self.prefix.clone().unwrap_or_default();
        if let Some(prefix_key) = &self.prefix_key {
            if let Some(value) = record.get(prefix_key) {
                prefix = value_to_string(value);
            }
        }

        for (field, store_as) in &self.store_value_as {
            if let Some(value) = record.get(field) {
                exchange.insert(
                    format!("{prefix}{store_as}"),
                    ExchangeValue::Scalar(value.clone()),
                );
            }
        }

        Ok(input)
    }
}

// =============================================================================
// ALIAS
// =============================================================================

/// Publishes attribute values of the input object into the exchange's
/// `alias` map. `ALIAS url=seo_url` reads the object's `seo_url`
/// attribute and stores it under `url`; when the record itself carries a
/// field named `url`, that field's value becomes the alias key instead.
#[derive(Default)]
pub struct AliasCommand {
    aliases: HashMap<String, String>,
}

impl ImportCommand for AliasCommand {
    fn init(
        &mut self,
        args: &[String],
        _models: &ModelRegistry,
        _exchange: &mut Exchange,
    ) -> CommandResult<()> {
        self.aliases = named_args(args, false, &['=', ':']);
        Ok(())
    }

    fn process(
        &mut self,
        record: &Record,
        input: Option<SharedInstance>,
        exchange: &mut Exchange,
    ) -> CommandResult<Option<SharedInstance>> {
        let Some(shared) = input else {
            return Ok(None);
        };

        let mut alias_map = match exchange.remove("alias") {
            Some(ExchangeValue::Scalar(Value::Object(map))) => map,
            _ => Map::new(),
        };

        {
            let guard = shared.lock().unwrap_or_else(|e| e.into_inner());
            for (alias, attribute) in &self.aliases {
                let key = match record.get(alias) {
                    Some(value) => value_to_string(value),
                    None => alias.clone(),
                };
                alias_map.insert(key, guard.get(attribute));
            }
        }

        exchange.insert(
            "alias".to_string(),
            ExchangeValue::Scalar(Value::Object(alias_map)),
        );

        Ok(Some(shared))
    }
}

// =============================================================================
// MEDIA
// =============================================================================

/// Attaches content named by a record field to the previous stage's
/// output. `MEDIA <field> [type] [name] [--skipErrors]`; the field may
/// hold one source or a list, each an http(s) URL or a file path. Type
/// and name fall back to response headers, the source basename, and
/// extension sniffing.
#[derive(Default)]
pub struct MediaCommand {
    media_field: String,
    media_type: String,
    media_name: String,
    skip_errors: bool,
    client: Option<reqwest::blocking::Client>,
}

const IMAGE_EXTENSIONS: [&str; 9] = [
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".ico", ".bmp", ".tif", ".tiff",
];
const DOCUMENT_EXTENSIONS: [&str; 9] = [
    ".txt", ".rtf", ".pdf", ".doc", "docx", ".xls", ".xlsx", ".ppt", ".pptx",
];

impl MediaCommand {
    fn media_error(source: &str, message: impl ToString) -> CommandError {
        CommandError::Media {
            uri: source.to_string(),
            message: message.to_string(),
        }
    }

    /// Fetch content; also reports the header media type and the source
    /// basename when available.
    fn fetch(&mut self, source: &str) -> CommandResult<(Vec<u8>, Option<String>, Option<String>)> {
        if source.starts_with("http") {
            // imports routinely point at hosts with self-signed certs
            if self.client.is_none() {
                let client = reqwest::blocking::Client::builder()
                    .danger_accept_invalid_certs(true)
                    .build()
                    .map_err(|e| Self::media_error(source, e))?;
                self.client = Some(client);
            }
            let client = self.client.as_ref().ok_or_else(|| {
                Self::media_error(source, "http client unavailable")
            })?;

            let response = client
                .get(source)
                .send()
                .map_err(|e| Self::media_error(source, e))?;
            if response.status() != reqwest::StatusCode::OK {
                return Err(Self::media_error(
                    source,
                    format!("unexpected status {}", response.status()),
                ));
            }

            let header_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split('/').next())
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let basename = response
                .url()
                .path()
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .map(str::to_string);

            let content = response
                .bytes()
                .map_err(|e| Self::media_error(source, e))?
                .to_vec();

            Ok((content, header_type, basename))
        } else {
            let content =
                std::fs::read(source).map_err(|e| Self::media_error(source, e))?;
            let basename = Path::new(source)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            Ok((content, None, basename))
        }
    }
}

impl ImportCommand for MediaCommand {
    fn init(
        &mut self,
        args: &[String],
        _models: &ModelRegistry,
        _exchange: &mut Exchange,
    ) -> CommandResult<()> {
        let positional = |idx: usize| {
            args.get(idx)
                .filter(|arg| arg.as_str() != SKIP_ERRORS_ARG)
                .cloned()
                .unwrap_or_default()
        };
        self.media_field = positional(1);
        self.media_type = positional(2);
        self.media_name = positional(3);
        self.skip_errors = args.iter().any(|arg| arg == SKIP_ERRORS_ARG);

        if self.media_field.is_empty() {
            return Err(CommandError::MissingArgument {
                command: "MEDIA".to_string(),
                argument: "media field".to_string(),
            });
        }
        Ok(())
    }

    fn process(
        &mut self,
        record: &Record,
        input: Option<SharedInstance>,
        _exchange: &mut Exchange,
    ) -> CommandResult<Option<SharedInstance>> {
        let Some(shared) = input else {
            return Err(CommandError::BadInput {
                command: "MEDIA".to_string(),
                message: "no input object to attach media to".to_string(),
            });
        };

        let sources: Vec<String> = match record.get(&self.media_field) {
            Some(Value::String(source)) => vec![source.clone()],
            Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
            Some(other) => vec![value_to_string(other)],
            None => Vec::new(),
        };

        if sources.is_empty() {
            return Ok(Some(shared));
        }

        // type/name arguments may name record fields holding the value
        let configured_type = match record.get(&self.media_type) {
            Some(value) => value_to_string(value),
            None => self.media_type.clone(),
        };
        let configured_name = match record.get(&self.media_name) {
            Some(value) => value_to_string(value),
            None => self.media_name.clone(),
        };

        {
            let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
            let object_id = guard.id();

            let mut previous_name = String::new();
            for (index, source) in sources.iter().enumerate() {
                let fetched = self.fetch(source);
                let (content, header_type, basename) = match fetched {
                    Ok(result) => result,
                    Err(err) => {
                        if self.skip_errors {
                            log_error(format!("MEDIA: {err}"));
                            continue;
                        }
                        return Err(err);
                    }
                };

                let mut media_type = configured_type.clone();
                let mut media_name = configured_name.clone();

                if media_type.is_empty() {
                    if let Some(header_type) = header_type {
                        media_type = header_type;
                    }
                }
                if media_name.is_empty() {
                    if let Some(basename) = basename {
                        media_name = basename;
                    }
                }

                if media_type.is_empty() && !media_name.is_empty() {
                    if IMAGE_EXTENSIONS.iter().any(|ext| media_name.contains(ext)) {
                        media_type = "image".to_string();
                    } else if DOCUMENT_EXTENSIONS
                        .iter()
                        .any(|ext| media_name.contains(ext))
                    {
                        media_type = "document".to_string();
                    }
                }
                if media_type.is_empty() {
                    media_type = "unknown".to_string();
                }

                if media_name.is_empty() {
                    media_name = "media".to_string();
                    if let Some(id) = &object_id {
                        media_name = format!("media_{id}");
                    }
                }

                // a static name over a source list must not overwrite
                if previous_name == media_name {
                    media_name = format!("{index}_{media_name}");
                } else {
                    previous_name = media_name.clone();
                }

                let holder = guard.as_media().ok_or_else(|| CommandError::BadInput {
                    command: "MEDIA".to_string(),
                    message: "input object does not accept media".to_string(),
                })?;
                if let Err(err) = holder.add_media(&media_type, &media_name, content) {
                    if self.skip_errors {
                        log_error(format!("MEDIA: {err}"));
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }

        Ok(Some(shared))
    }
}

// =============================================================================
// ATTRIBUTE_ADD
// =============================================================================

/// Registers one attribute definition on the target model when the
/// first record arrives. `ATTRIBUTE_ADD model attribute [type=] [label=]
/// [group=] [editors=] [options=] [default=] [validators=] [required=]
/// [layered=]`.
#[derive(Default)]
pub struct AttributeAddCommand {
    model: Option<Arc<dyn Model>>,
    attribute: Option<AttributeInfo>,
}

impl ImportCommand for AttributeAddCommand {
    fn init(
        &mut self,
        args: &[String],
        models: &ModelRegistry,
        _exchange: &mut Exchange,
    ) -> CommandResult<()> {
        let needed = Capabilities {
            custom_attributes: true,
            ..Capabilities::default()
        };
        let model = find_model("ATTRIBUTE_ADD", args, models, needed)?;

        let named = named_args(args, true, &['=']);
        let attribute_name = ["attribute", "attr", "2"]
            .iter()
            .find_map(|key| named.get(*key))
            .cloned()
            .ok_or_else(|| CommandError::MissingArgument {
                command: "ATTRIBUTE_ADD".to_string(),
                argument: "attribute".to_string(),
            })?;

        let mut chars = attribute_name.chars();
        let label = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => attribute_name.clone(),
        };

        let mut attribute = AttributeInfo {
            model: model.name().to_string(),
            collection: model.name().to_string(),
            attribute: attribute_name,
            attribute_type: "text".to_string(),
            is_required: false,
            is_static: false,
            label,
            group: "General".to_string(),
            editors: "text".to_string(),
            options: String::new(),
            default: String::new(),
            validators: String::new(),
            is_layered: false,
        };

        for (key, value) in &named {
            match key.to_lowercase().as_str() {
                "type" => attribute.attribute_type = value.clone(),
                "label" => attribute.label = value.clone(),
                "group" => attribute.group = value.clone(),
                "editors" => attribute.editors = value.clone(),
                "options" => attribute.options = value.clone(),
                "default" => attribute.default = value.clone(),
                "validators" => attribute.validators = value.clone(),
                "isrequired" | "required" => attribute.is_required = parse_bool(value),
                "islayered" | "layered" => attribute.is_layered = parse_bool(value),
                _ => {}
            }
        }

        self.model = Some(model);
        self.attribute = Some(attribute);
        Ok(())
    }

    fn process(
        &mut self,
        _record: &Record,
        input: Option<SharedInstance>,
        _exchange: &mut Exchange,
    ) -> CommandResult<Option<SharedInstance>> {
        if let (Some(model), Some(attribute)) = (&self.model, &self.attribute) {
            // re-registration across records is reported, not fatal
            if let Err(err) = model.add_attribute(attribute.clone()) {
                log_error(format!("ATTRIBUTE_ADD: {err}"));
            }
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::memory::MemoryModel;
    use serde_json::json;
    use std::io::Write as _;

    fn record(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap_or_default()
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn registry_with(model: &MemoryModel) -> ModelRegistry {
        let registry = ModelRegistry::new();
        registry.register(Arc::new(model.clone()));
        registry
    }

    #[test]
    fn test_insert_persists_record() {
        let model = MemoryModel::new("post");
        let models = registry_with(&model);
        let mut exchange = Exchange::new();

        let mut insert = InsertCommand::default();
        insert
            .init(&args(&["INSERT", "post"]), &models, &mut exchange)
            .unwrap();

        let output = insert
            .process(
                &record(json!({"identifier": "posty", "published": true})),
                None,
                &mut exchange,
            )
            .unwrap();

        assert!(output.is_some());
        assert_eq!(model.len(), 1);
        let stored = model.record("1").unwrap();
        assert_eq!(stored["identifier"], json!("posty"));
        assert_eq!(stored["published"], json!(true));
    }

    #[test]
    fn test_insert_respects_skip_list() {
        let model = MemoryModel::new("post");
        let models = registry_with(&model);
        let mut exchange = Exchange::new();

        let mut insert = InsertCommand::default();
        insert
            .init(
                &args(&["INSERT", "post", "skip=internal"]),
                &models,
                &mut exchange,
            )
            .unwrap();
        insert
            .process(
                &record(json!({"sku": "A", "internal": "x"})),
                None,
                &mut exchange,
            )
            .unwrap();

        let stored = model.record("1").unwrap();
        assert!(stored.get("internal").is_none());
        assert_eq!(stored["sku"], json!("A"));
    }

    #[test]
    fn test_insert_unknown_model_fails_init() {
        let models = ModelRegistry::new();
        let mut exchange = Exchange::new();
        let mut insert = InsertCommand::default();
        assert!(insert
            .init(&args(&["INSERT", "ghost"]), &models, &mut exchange)
            .is_err());
    }

    #[test]
    fn test_update_by_custom_id_key() {
        let model = MemoryModel::new("product");
        let models = registry_with(&model);
        let mut exchange = Exchange::new();

        let mut seeded = model.spawn();
        seeded.set("sku", json!("A")).unwrap();
        seeded.set("price", json!(1)).unwrap();
        seeded.save().unwrap();
        let id = seeded.id().unwrap();

        let mut update = UpdateCommand::default();
        update
            .init(&args(&["UPDATE", "product", "idKey=_id"]), &models, &mut exchange)
            .unwrap();
        update
            .process(
                &record(json!({"_id": id.clone(), "price": 2})),
                None,
                &mut exchange,
            )
            .unwrap();

        assert_eq!(model.record(&id).unwrap()["price"], json!(2));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_update_without_id_is_noop() {
        let model = MemoryModel::new("product");
        let models = registry_with(&model);
        let mut exchange = Exchange::new();

        let mut update = UpdateCommand::default();
        update
            .init(&args(&["UPDATE", "product"]), &models, &mut exchange)
            .unwrap();
        let output = update
            .process(&record(json!({"price": 2})), None, &mut exchange)
            .unwrap();

        assert!(output.is_some());
        assert!(model.is_empty());
    }

    #[test]
    fn test_delete_removes_record() {
        let model = MemoryModel::new("product");
        let models = registry_with(&model);
        let mut exchange = Exchange::new();

        let mut seeded = model.spawn();
        seeded.set("sku", json!("A")).unwrap();
        seeded.save().unwrap();
        let id = seeded.id().unwrap();

        let mut delete = DeleteCommand::default();
        delete
            .init(&args(&["DELETE", "product"]), &models, &mut exchange)
            .unwrap();
        delete
            .process(&record(json!({"_id": id})), None, &mut exchange)
            .unwrap();

        assert!(model.is_empty());
    }

    #[test]
    fn test_store_object_and_fields() {
        let model = MemoryModel::new("product");
        let models = registry_with(&model);
        let mut exchange = Exchange::new();

        let mut insert = InsertCommand::default();
        insert
            .init(&args(&["INSERT", "product"]), &models, &mut exchange)
            .unwrap();
        let inserted = insert
            .process(&record(json!({"name": "x"})), None, &mut exchange)
            .unwrap();

        let mut store = StoreCommand::default();
        store
            .init(&args(&["STORE", "obj", "label=name"]), &models, &mut exchange)
            .unwrap();
        let output = store
            .process(&record(json!({"name": "x"})), inserted, &mut exchange)
            .unwrap();

        // input passes through unchanged
        assert!(output.is_some());

        match exchange.get("obj") {
            Some(ExchangeValue::Object(shared)) => {
                let guard = shared.lock().unwrap();
                assert_eq!(guard.get("name"), json!("x"));
            }
            _ => panic!("inserted object not stored in exchange"),
        }
        match exchange.get("label") {
            Some(ExchangeValue::Scalar(value)) => assert_eq!(value, &json!("x")),
            _ => panic!("record field not stored in exchange"),
        }
    }

    #[test]
    fn test_store_prefix_key() {
        let models = ModelRegistry::new();
        let mut exchange = Exchange::new();

        let mut store = StoreCommand::default();
        store
            .init(
                &args(&["STORE", "prefixKey=sku", "label=name"]),
                &models,
                &mut exchange,
            )
            .unwrap();
        store
            .process(
                &record(json!({"sku": "A-", "name": "Apple"})),
                None,
                &mut exchange,
            )
            .unwrap();

        assert!(matches!(
            exchange.get("A-label"),
            Some(ExchangeValue::Scalar(Value::String(_)))
        ));
    }

    #[test]
    fn test_alias_publishes_object_attributes() {
        let model = MemoryModel::new("page");
        let models = registry_with(&model);
        let mut exchange = Exchange::new();

        let mut insert = InsertCommand::default();
        insert
            .init(&args(&["INSERT", "page"]), &models, &mut exchange)
            .unwrap();
        let inserted = insert
            .process(&record(json!({"url": "a/b"})), None, &mut exchange)
            .unwrap();

        let mut alias = AliasCommand::default();
        alias
            .init(&args(&["ALIAS", "page_url=url"]), &models, &mut exchange)
            .unwrap();
        alias
            .process(&record(json!({"url": "a/b"})), inserted, &mut exchange)
            .unwrap();

        match exchange.get("alias") {
            Some(ExchangeValue::Scalar(Value::Object(map))) => {
                assert_eq!(map["page_url"], json!("a/b"));
            }
            _ => panic!("alias map missing from exchange"),
        }
    }

    #[test]
    fn test_media_from_file_with_name_dedup() {
        let model = MemoryModel::new("product");
        let models = registry_with(&model);
        let mut exchange = Exchange::new();

        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("photo.png");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"not really a png").unwrap();
        let source = file_path.to_string_lossy().into_owned();

        let mut insert = InsertCommand::default();
        insert
            .init(&args(&["INSERT", "product"]), &models, &mut exchange)
            .unwrap();
        let inserted = insert
            .process(&record(json!({"sku": "A"})), None, &mut exchange)
            .unwrap();

        let mut media = MediaCommand::default();
        media
            .init(&args(&["MEDIA", "image"]), &models, &mut exchange)
            .unwrap();
        media
            .process(
                &record(json!({"image": [source.clone(), source]})),
                inserted,
                &mut exchange,
            )
            .unwrap();

        let info = model.media_info("1");
        assert_eq!(info.len(), 2);
        // basename gives the type by extension; second entry de-duplicated
        assert_eq!(info[0].0, "image");
        assert_eq!(info[0].1, "photo.png");
        assert_eq!(info[1].1, "1_photo.png");
    }

    #[test]
    fn test_media_requires_field_argument() {
        let models = ModelRegistry::new();
        let mut exchange = Exchange::new();
        let mut media = MediaCommand::default();
        assert!(matches!(
            media.init(&args(&["MEDIA"]), &models, &mut exchange),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_attribute_add_defaults_and_overrides() {
        let model = MemoryModel::new("product");
        let models = registry_with(&model);
        let mut exchange = Exchange::new();

        let mut command = AttributeAddCommand::default();
        command
            .init(
                &args(&["ATTRIBUTE_ADD", "product", "rating", "group=Extra"]),
                &models,
                &mut exchange,
            )
            .unwrap();
        command
            .process(&record(json!({})), None, &mut exchange)
            .unwrap();

        let attributes = model.attributes_info();
        assert_eq!(attributes.len(), 1);
        let added = &attributes[0];
        assert_eq!(added.attribute, "rating");
        assert_eq!(added.attribute_type, "text");
        assert_eq!(added.label, "Rating");
        assert_eq!(added.group, "Extra");
        assert_eq!(added.editors, "text");
    }
}
