//! Forwarded-argument payload handed to the child process.
//!
//! The payload is a JSON array mirroring the call shape the entry file
//! expects: every positional value in order, then the options object, then
//! one merged record of everything the command carried.

use serde_json::{Map, Value};

/// Environment variable carrying the serialized payload.
pub const PAYLOAD_ENV: &str = "CLI_EXEC_ARGS";

/// Key of the back-reference to the enclosing command, never forwarded.
const PARENT_KEY: &str = "parent";

/// Prefix of private fields, never forwarded.
const PRIVATE_PREFIX: char = '_';

/// A parsed subcommand invocation, as handed over by the outer CLI layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandInvocation {
    /// Subcommand name, e.g. "init"
    pub name: String,
    /// Named positional arguments, in order
    pub arguments: Vec<(String, Value)>,
    /// Option values, e.g. `force`
    pub options: Map<String, Value>,
    /// The command's own fields; private and linkage fields are dropped when forwarded
    pub fields: Map<String, Value>,
}

impl CommandInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.push((name.into(), value.into()));
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Flat record of fields, positionals and options, later entries winning.
    pub fn forwarded_record(&self) -> Map<String, Value> {
        let mut record: Map<String, Value> = self
            .fields
            .iter()
            .filter(|(key, _)| is_forwarded(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (name, value) in &self.arguments {
            record.insert(name.clone(), value.clone());
        }
        for (name, value) in &self.options {
            record.insert(name.clone(), value.clone());
        }
        record
    }

    /// `[positional..., options, record]`
    pub fn payload(&self) -> Value {
        let mut items: Vec<Value> = self.arguments.iter().map(|(_, v)| v.clone()).collect();
        items.push(Value::Object(self.options.clone()));
        items.push(Value::Object(self.forwarded_record()));
        Value::Array(items)
    }
}

fn is_forwarded(key: &str) -> bool {
    !key.starts_with(PRIVATE_PREFIX) && key != PARENT_KEY
}
