//! Ordered configuration tree
//!
//! A node carries sorted key/value attributes and an ordered list of tagged
//! children. Tags repeat freely (`aspect`, `facet`, ...) and the relative order
//! of children with different tags is preserved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_real(&self) -> Option<f64> {
        match self {
            AttributeValue::Real(v) => Some(*v),
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            AttributeValue::Bool(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            AttributeValue::Int(v) => Some(*v != 0),
            AttributeValue::Text(s) => match s.trim() {
                "yes" | "true" | "on" => Some(true),
                "no" | "false" | "off" => Some(false),
                _ => None,
            },
            AttributeValue::Real(_) => None,
        }
    }

    pub fn as_text(&self) -> String {
        self.to_string()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AttributeValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(true) => write!(f, "yes"),
            AttributeValue::Bool(false) => write!(f, "no"),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Real(v) => write!(f, "{}", v),
            AttributeValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Real(v)
    }
}

/// Ordered, nested key/value node with repeatable named children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigNode {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<(String, ConfigNode)>,
}

impl ConfigNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter
    pub fn with(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style child appender
    pub fn with_child(mut self, tag: &str, child: ConfigNode) -> Self {
        self.children.push((tag.to_string(), child));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    // === ATTRIBUTES ===

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Attribute rendered as text, empty when absent
    pub fn text(&self, key: &str) -> String {
        self.attributes
            .get(key)
            .map(|v| v.as_text())
            .unwrap_or_default()
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of this node without any children
    pub fn attributes_only(&self) -> ConfigNode {
        ConfigNode {
            attributes: self.attributes.clone(),
            children: Vec::new(),
        }
    }

    // === CHILDREN ===

    /// First child with the given tag
    pub fn child(&self, tag: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|(t, _)| t == tag).map(|(_, c)| c)
    }

    pub fn child_range<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.children
            .iter()
            .filter(move |(t, _)| t == tag)
            .map(|(_, c)| c)
    }

    pub fn child_count(&self, tag: &str) -> usize {
        self.children.iter().filter(|(t, _)| t == tag).count()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.children.iter().map(|(t, c)| (t.as_str(), c))
    }

    /// Distinct child tags in first-occurrence order
    pub fn child_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for (tag, _) in &self.children {
            if !tags.contains(&tag.as_str()) {
                tags.push(tag);
            }
        }
        tags
    }

    pub fn add_child(&mut self, tag: &str, child: ConfigNode) -> &mut ConfigNode {
        self.children.push((tag.to_string(), child));
        let last = self.children.len() - 1;
        &mut self.children[last].1
    }

    pub fn clear_children(&mut self, tag: &str) {
        self.children.retain(|(t, _)| t != tag);
    }

    // === MERGING ===

    /// Merge `other` into this node, overwriting attributes.
    ///
    /// Same-tag children at the same index are merged recursively; any extra
    /// children of `other` are appended.
    pub fn merge_with(&mut self, other: &ConfigNode) {
        for (key, value) in &other.attributes {
            self.attributes.insert(key.clone(), value.clone());
        }

        for tag in other.child_tags() {
            let own_positions: Vec<usize> = self
                .children
                .iter()
                .enumerate()
                .filter(|(_, (t, _))| t == tag)
                .map(|(i, _)| i)
                .collect();

            for (index, incoming) in other.child_range(tag).enumerate() {
                match own_positions.get(index) {
                    Some(&pos) => self.children[pos].1.merge_with(incoming),
                    None => self.children.push((tag.to_string(), incoming.clone())),
                }
            }
        }
    }

    /// Overwrite attributes with those of `other` and append all its children
    pub fn append(&mut self, other: &ConfigNode) {
        for (key, value) in &other.attributes {
            self.attributes.insert(key.clone(), value.clone());
        }
        self.children.extend(other.children.iter().cloned());
    }

    /// Fold children of `tag` that share the same `attribute` value into the
    /// first occurrence, appending the later ones onto it.
    pub fn merge_children_by_attribute(&mut self, tag: &str, attribute: &str) {
        if self.child_count(tag) < 2 {
            return;
        }

        let mut merged: Vec<(String, ConfigNode)> = Vec::new();
        for child in self.child_range(tag) {
            let key = child.text(attribute);
            match merged.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => existing.append(child),
                None => merged.push((key, child.clone())),
            }
        }

        self.clear_children(tag);
        for (_, child) in merged {
            self.children.push((tag.to_string(), child));
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "\t".repeat(depth);
        for (key, value) in &self.attributes {
            match value {
                AttributeValue::Text(s) => writeln!(f, "{}{}=\"{}\"", indent, key, s)?,
                other => writeln!(f, "{}{}={}", indent, key, other)?,
            }
        }
        for (tag, child) in &self.children {
            writeln!(f, "{}[{}]", indent, tag)?;
            child.write_indented(f, depth + 1)?;
            writeln!(f, "{}[/{}]", indent, tag)?;
        }
        Ok(())
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
