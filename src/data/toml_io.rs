//! TOML authoring format for configuration trees
//!
//! Scalars become attributes, tables become single children and arrays of
//! tables become repeated children. Arrays of scalars collapse into a
//! comma-separated text attribute.

use std::fs;
use std::path::Path;

use toml::{Table, Value};

use crate::core::error::Result;
use crate::data::node::{AttributeValue, ConfigNode};

impl ConfigNode {
    pub fn from_toml_str(content: &str) -> Result<ConfigNode> {
        let table: Table = toml::from_str(content)?;
        Ok(ConfigNode::from_toml_table(&table))
    }

    pub fn from_toml_file(path: &Path) -> Result<ConfigNode> {
        let content = fs::read_to_string(path)?;
        ConfigNode::from_toml_str(&content)
    }

    pub fn from_toml_table(table: &Table) -> ConfigNode {
        let mut node = ConfigNode::new();
        for (key, value) in table {
            match value {
                Value::Table(child) => {
                    node.add_child(key, ConfigNode::from_toml_table(child));
                }
                Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_table) => {
                    for item in items {
                        if let Value::Table(child) = item {
                            node.add_child(key, ConfigNode::from_toml_table(child));
                        }
                    }
                }
                Value::Array(items) => {
                    let joined: Vec<String> = items.iter().map(scalar_text).collect();
                    node.set(key, joined.join(","));
                }
                scalar => {
                    node.set(key, scalar_attribute(scalar));
                }
            }
        }
        node
    }

    pub fn to_toml_table(&self) -> Table {
        let mut table = Table::new();
        for (key, value) in self.attributes() {
            table.insert(key.to_string(), attribute_toml(value));
        }
        for tag in self.child_tags() {
            let items: Vec<Value> = self
                .child_range(tag)
                .map(|child| Value::Table(child.to_toml_table()))
                .collect();
            if table.contains_key(tag) {
                tracing::warn!("Child tag '{}' shadows an attribute of the same name", tag);
            }
            table.insert(tag.to_string(), Value::Array(items));
        }
        table
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(&self.to_toml_table())?)
    }
}

fn scalar_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Boolean(b) => AttributeValue::Bool(*b),
        Value::Integer(i) => AttributeValue::Int(*i),
        Value::Float(f) => AttributeValue::Real(*f),
        Value::String(s) => AttributeValue::Text(s.clone()),
        other => AttributeValue::Text(scalar_text(other)),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn attribute_toml(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Bool(b) => Value::Boolean(*b),
        AttributeValue::Int(i) => Value::Integer(*i),
        AttributeValue::Real(f) => Value::Float(*f),
        AttributeValue::Text(s) => Value::String(s.clone()),
    }
}
