//! Host-facing model layer.
//!
//! The engine never talks to storage directly. A host registers named
//! [`Model`]s; pipeline commands check the capabilities they need once,
//! when the command chain is built, and then work through [`Instance`]
//! handles. The in-memory backend in [`memory`] backs the CLI, the HTTP
//! server and the tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::record::Record;

pub mod memory;

/// What a model implementation supports. Checked by commands at chain
/// construction, never per record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Instances can be loaded, saved and deleted.
    pub storable: bool,
    /// Instances expose get/set by attribute name.
    pub object: bool,
    /// The model can enumerate its stored records.
    pub listable: bool,
    /// The model accepts runtime attribute definitions.
    pub custom_attributes: bool,
    /// Instances accept attached media content.
    pub media: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Capabilities {
            storable: true,
            object: true,
            listable: true,
            custom_attributes: true,
            media: true,
        }
    }
}

/// Description of one model attribute, as used by schema-aware exports
/// and runtime attribute registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeInfo {
    pub model: String,
    pub collection: String,
    pub attribute: String,
    #[serde(rename = "type")]
    pub attribute_type: String,
    pub is_required: bool,
    pub is_static: bool,
    pub label: String,
    pub group: String,
    pub editors: String,
    pub options: String,
    pub default: String,
    pub validators: String,
    pub is_layered: bool,
}

/// One named entity type the host exposes to the engine.
pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Attribute metadata, in export column order.
    fn attributes_info(&self) -> Vec<AttributeInfo>;

    /// Create a fresh, unsaved instance.
    fn spawn(&self) -> Box<dyn Instance>;

    /// Enumerate stored records. Requires the `listable` capability.
    fn list_records(&self) -> ModelResult<Vec<Record>>;

    /// Register an attribute definition at runtime. Requires the
    /// `custom_attributes` capability.
    fn add_attribute(&self, attribute: AttributeInfo) -> ModelResult<()>;
}

/// A single entity held by a command chain while a record flows through.
pub trait Instance: Send {
    fn set(&mut self, attribute: &str, value: Value) -> ModelResult<()>;

    fn get(&self, attribute: &str) -> Value;

    fn id(&self) -> Option<String>;

    fn set_id(&mut self, id: &str);

    fn load(&mut self, id: &str) -> ModelResult<()>;

    fn save(&mut self) -> ModelResult<()>;

    fn delete(&mut self) -> ModelResult<()>;

    /// Media attachment surface, when the model has the `media`
    /// capability.
    fn as_media(&mut self) -> Option<&mut dyn MediaHolder> {
        None
    }
}

/// Attach named binary content to a stored instance.
pub trait MediaHolder {
    fn add_media(&mut self, media_type: &str, name: &str, content: Vec<u8>) -> ModelResult<()>;
}

/// Thread-safe name -> model lookup shared by commands and the server.
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<dyn Model>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, model: Arc<dyn Model>) {
        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        models.insert(model.name().to_string(), model);
    }

    pub fn unregister(&self, name: &str) -> ModelResult<()> {
        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        match models.remove(name) {
            Some(_) => Ok(()),
            None => Err(ModelError::UnknownModel(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> ModelResult<Arc<dyn Model>> {
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());
        models
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownModel(name.to_string()))
    }

    /// Resolve a model and check the capabilities the caller needs.
    pub fn require(&self, name: &str, needed: Capabilities) -> ModelResult<Arc<dyn Model>> {
        let model = self.get(name)?;
        let have = model.capabilities();

        let checks = [
            (needed.storable, have.storable, "storable"),
            (needed.object, have.object, "object"),
            (needed.listable, have.listable, "listable"),
            (
                needed.custom_attributes,
                have.custom_attributes,
                "custom attributes",
            ),
            (needed.media, have.media, "media"),
        ];
        for (wanted, present, capability) in checks {
            if wanted && !present {
                return Err(ModelError::MissingCapability {
                    model: name.to_string(),
                    capability: capability.to_string(),
                });
            }
        }
        Ok(model)
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = models.keys().cloned().collect();
        names.sort();
        names
    }
}
