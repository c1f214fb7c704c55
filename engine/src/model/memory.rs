//! In-memory model backend.
//!
//! Backs the CLI and HTTP server in standalone runs and the test suite.
//! Records live in a shared store keyed by `_id`; identifiers are
//! assigned sequentially on first save.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::record::Record;

use super::{AttributeInfo, Capabilities, Instance, MediaHolder, Model};

const ID_FIELD: &str = "_id";

#[derive(Default)]
struct Store {
    records: HashMap<String, Record>,
    order: Vec<String>,
    attributes: Vec<AttributeInfo>,
    media: HashMap<String, Vec<MediaEntry>>,
    next_id: u64,
}

struct MediaEntry {
    media_type: String,
    name: String,
    content: Vec<u8>,
}

/// An entity type stored entirely in memory. Cloning shares the store.
#[derive(Clone)]
pub struct MemoryModel {
    name: String,
    store: Arc<Mutex<Store>>,
}

impl MemoryModel {
    pub fn new(name: &str) -> Self {
        MemoryModel {
            name: name.to_string(),
            store: Arc::new(Mutex::new(Store::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Stored record by id, including its `_id` field.
    pub fn record(&self, id: &str) -> Option<Record> {
        self.lock().records.get(id).cloned()
    }

    /// Media attached to a record: `(type, name, size)` triples.
    pub fn media_info(&self, id: &str) -> Vec<(String, String, usize)> {
        self.lock()
            .media
            .get(id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| (e.media_type.clone(), e.name.clone(), e.content.len()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Model for MemoryModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn attributes_info(&self) -> Vec<AttributeInfo> {
        self.lock().attributes.clone()
    }

    fn spawn(&self) -> Box<dyn Instance> {
        Box::new(MemoryInstance {
            data: Record::new(),
            id: None,
            store: Arc::clone(&self.store),
        })
    }

    fn list_records(&self) -> ModelResult<Vec<Record>> {
        let store = self.lock();
        Ok(store
            .order
            .iter()
            .filter_map(|id| store.records.get(id).cloned())
            .collect())
    }

    fn add_attribute(&self, attribute: AttributeInfo) -> ModelResult<()> {
        let mut store = self.lock();
        if store
            .attributes
            .iter()
            .any(|a| a.attribute == attribute.attribute)
        {
            return Err(ModelError::Attribute {
                attribute: attribute.attribute,
                message: "already defined".to_string(),
            });
        }
        store.attributes.push(attribute);
        Ok(())
    }
}

struct MemoryInstance {
    data: Record,
    id: Option<String>,
    store: Arc<Mutex<Store>>,
}

impl MemoryInstance {
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Instance for MemoryInstance {
    fn set(&mut self, attribute: &str, value: Value) -> ModelResult<()> {
        if attribute == ID_FIELD {
            if let Value::String(id) = &value {
                self.id = Some(id.clone());
            }
        }
        self.data.insert(attribute.to_string(), value);
        Ok(())
    }

    fn get(&self, attribute: &str) -> Value {
        if attribute == ID_FIELD {
            return self
                .id
                .as_ref()
                .map(|id| Value::String(id.clone()))
                .unwrap_or(Value::Null);
        }
        self.data.get(attribute).cloned().unwrap_or(Value::Null)
    }

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    fn load(&mut self, id: &str) -> ModelResult<()> {
        let store = self.lock();
        let record = store
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?;
        drop(store);
        self.data = record;
        self.id = Some(id.to_string());
        Ok(())
    }

    fn save(&mut self) -> ModelResult<()> {
        // lock through a local handle so the guard does not borrow self
        let store = Arc::clone(&self.store);
        let mut store = store.lock().unwrap_or_else(|e| e.into_inner());
        let id = match &self.id {
            Some(id) => id.clone(),
            None => {
                store.next_id += 1;
                let id = store.next_id.to_string();
                self.id = Some(id.clone());
                id
            }
        };
        let mut record = self.data.clone();
        record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        if !store.records.contains_key(&id) {
            store.order.push(id.clone());
        }
        store.records.insert(id, record);
        Ok(())
    }

    fn delete(&mut self) -> ModelResult<()> {
        let id = self
            .id
            .clone()
            .ok_or_else(|| ModelError::Storage("delete without id".to_string()))?;
        let mut store = self.lock();
        store.records.remove(&id);
        store.order.retain(|known| known != &id);
        store.media.remove(&id);
        Ok(())
    }

    fn as_media(&mut self) -> Option<&mut dyn MediaHolder> {
        Some(self)
    }
}

impl MediaHolder for MemoryInstance {
    fn add_media(&mut self, media_type: &str, name: &str, content: Vec<u8>) -> ModelResult<()> {
        let id = self
            .id
            .clone()
            .ok_or_else(|| ModelError::Storage("media on unsaved instance".to_string()))?;
        let mut store = self.lock();
        store.media.entry(id).or_default().push(MediaEntry {
            media_type: media_type.to_string(),
            name: name.to_string(),
            content,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_assigns_sequential_ids() {
        let model = MemoryModel::new("product");
        let mut first = model.spawn();
        first.set("sku", json!("A")).unwrap();
        first.save().unwrap();
        let mut second = model.spawn();
        second.set("sku", json!("B")).unwrap();
        second.save().unwrap();

        assert_eq!(first.id().as_deref(), Some("1"));
        assert_eq!(second.id().as_deref(), Some("2"));
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_load_save_delete_cycle() {
        let model = MemoryModel::new("product");
        let mut instance = model.spawn();
        instance.set("sku", json!("A")).unwrap();
        instance.save().unwrap();
        let id = instance.id().unwrap();

        let mut loaded = model.spawn();
        loaded.load(&id).unwrap();
        assert_eq!(loaded.get("sku"), json!("A"));

        loaded.set("sku", json!("A2")).unwrap();
        loaded.save().unwrap();
        assert_eq!(model.record(&id).unwrap()["sku"], json!("A2"));
        assert_eq!(model.len(), 1);

        loaded.delete().unwrap();
        assert!(model.is_empty());
    }

    #[test]
    fn test_load_missing_id() {
        let model = MemoryModel::new("product");
        let mut instance = model.spawn();
        assert!(matches!(
            instance.load("404"),
            Err(ModelError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_preserves_insert_order() {
        let model = MemoryModel::new("product");
        for sku in ["A", "B", "C"] {
            let mut instance = model.spawn();
            instance.set("sku", json!(sku)).unwrap();
            instance.save().unwrap();
        }
        let records = model.list_records().unwrap();
        let skus: Vec<_> = records.iter().map(|r| r["sku"].clone()).collect();
        assert_eq!(skus, vec![json!("A"), json!("B"), json!("C")]);
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let model = MemoryModel::new("product");
        let attribute = AttributeInfo {
            model: "product".into(),
            collection: "product".into(),
            attribute: "rating".into(),
            attribute_type: "int".into(),
            is_required: false,
            is_static: false,
            label: "Rating".into(),
            group: "General".into(),
            editors: "text".into(),
            options: String::new(),
            default: String::new(),
            validators: String::new(),
            is_layered: false,
        };
        model.add_attribute(attribute.clone()).unwrap();
        assert!(model.add_attribute(attribute).is_err());
    }

    #[test]
    fn test_media_requires_saved_instance() {
        let model = MemoryModel::new("product");
        let mut instance = model.spawn();

        let media = instance.as_media().unwrap();
        assert!(media.add_media("image", "a.png", vec![1, 2, 3]).is_err());

        instance.save().unwrap();
        let id = instance.id().unwrap();
        let media = instance.as_media().unwrap();
        media.add_media("image", "a.png", vec![1, 2, 3]).unwrap();

        assert_eq!(
            model.media_info(&id),
            vec![("image".to_string(), "a.png".to_string(), 3)]
        );
    }
}
