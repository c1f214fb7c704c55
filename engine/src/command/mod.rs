//! Pipeline commands.
//!
//! A script line names an ordered chain of commands. Each command is
//! constructed fresh per script line, initialized once from its
//! arguments, then fed every record of the line's data block. Commands
//! hand their output instance to the next stage and share one
//! [`Exchange`] scratch map per script line.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;

use crate::error::{CommandResult, ScriptError, ScriptResult};
use crate::model::{Instance, ModelRegistry};
use crate::record::Record;

pub mod args;
pub mod builtin;

/// An instance handle passed between chain stages and stashed in the
/// exchange by `STORE`.
pub type SharedInstance = Arc<Mutex<Box<dyn Instance>>>;

/// A value living in the exchange scratch map.
pub enum ExchangeValue {
    Scalar(Value),
    Object(SharedInstance),
}

/// Per-script-line scratch map shared by all records of a data block.
pub type Exchange = HashMap<String, ExchangeValue>;

/// One pipeline stage.
pub trait ImportCommand: Send {
    /// Configure from script-line arguments. `args[0]` is the command
    /// name. A failure here aborts the whole script line.
    fn init(
        &mut self,
        args: &[String],
        models: &ModelRegistry,
        exchange: &mut Exchange,
    ) -> CommandResult<()>;

    /// Handle one record. `input` is the previous stage's output.
    fn process(
        &mut self,
        record: &Record,
        input: Option<SharedInstance>,
        exchange: &mut Exchange,
    ) -> CommandResult<Option<SharedInstance>>;
}

type CommandFactory = Box<dyn Fn() -> Box<dyn ImportCommand> + Send + Sync>;

/// Name -> command factory. Chain construction instantiates a fresh
/// command per script line, so no state leaks between lines.
#[derive(Default)]
pub struct CommandRegistry {
    factories: RwLock<HashMap<String, CommandFactory>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in command set.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        let builtins: [(&str, CommandFactory); 7] = [
            ("INSERT", Box::new(|| Box::<builtin::InsertCommand>::default())),
            ("UPDATE", Box::new(|| Box::<builtin::UpdateCommand>::default())),
            ("DELETE", Box::new(|| Box::<builtin::DeleteCommand>::default())),
            ("STORE", Box::new(|| Box::<builtin::StoreCommand>::default())),
            ("ALIAS", Box::new(|| Box::<builtin::AliasCommand>::default())),
            ("MEDIA", Box::new(|| Box::<builtin::MediaCommand>::default())),
            (
                "ATTRIBUTE_ADD",
                Box::new(|| Box::<builtin::AttributeAddCommand>::default()),
            ),
        ];
        for (name, factory) in builtins {
            // fresh registry, names cannot clash
            let _ = registry.register(name, factory);
        }
        registry
    }

    pub fn register(&self, name: &str, factory: CommandFactory) -> ScriptResult<()> {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        if factories.contains_key(name) {
            return Err(ScriptError::DuplicateCommand(name.to_string()));
        }
        factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> ScriptResult<()> {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        match factories.remove(name) {
            Some(_) => Ok(()),
            None => Err(ScriptError::NotRegistered(name.to_string())),
        }
    }

    /// Instantiate a command by name.
    pub fn create(&self, name: &str) -> Option<Box<dyn ImportCommand>> {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.get(name).map(|factory| factory())
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<String> {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = CommandRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["ALIAS", "ATTRIBUTE_ADD", "DELETE", "INSERT", "MEDIA", "STORE", "UPDATE"]
        );
        assert!(registry.create("INSERT").is_some());
        assert!(registry.create("NOPE").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = CommandRegistry::with_builtins();
        let result = registry.register(
            "INSERT",
            Box::new(|| Box::<builtin::InsertCommand>::default()),
        );
        assert!(matches!(result, Err(ScriptError::DuplicateCommand(_))));
    }

    #[test]
    fn test_unregister() {
        let registry = CommandRegistry::with_builtins();
        registry.unregister("MEDIA").unwrap();
        assert!(registry.create("MEDIA").is_none());
        assert!(matches!(
            registry.unregister("MEDIA"),
            Err(ScriptError::NotRegistered(_))
        ));
    }
}
