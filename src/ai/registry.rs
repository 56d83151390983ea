//! Component registry: built-in aspect definitions for a session.
//!
//! A registry is created once when a match starts and handed to the manager
//! and every holder it creates. It knows which aspects exist out of the box,
//! how their facet values are typed, and what value applies when no facet is
//! configured.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{AiError, Result};
use crate::data::{AttributeValue, ConfigNode};

/// How a facet's `value` is interpreted for a given aspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Real,
    Int,
    Bool,
    Text,
    /// Comma-separated list of names
    List,
    /// Nested `[value]` child instead of an attribute
    Config,
}

impl ValueKind {
    /// Parse the value carried by a facet. `Ok(None)` means the facet carries
    /// no value at all.
    pub fn parse_facet(&self, facet: &ConfigNode) -> Result<Option<AspectValue>> {
        if *self == ValueKind::Config {
            return Ok(facet.child("value").cloned().map(AspectValue::Config));
        }

        let Some(raw) = facet.get("value") else {
            return Ok(None);
        };

        let parsed = match self {
            ValueKind::Real => raw.as_real().map(AspectValue::Real),
            ValueKind::Int => raw.as_int().map(AspectValue::Int),
            ValueKind::Bool => raw.as_bool().map(AspectValue::Bool),
            ValueKind::Text => Some(AspectValue::Text(raw.as_text())),
            ValueKind::List => Some(AspectValue::List(split_list(&raw.as_text()))),
            ValueKind::Config => None,
        };

        parsed.map(Some).ok_or_else(|| {
            AiError::Configuration(format!("facet value '{}' is not a valid {:?}", raw, self))
        })
    }

    /// Guess the kind of an aspect the registry does not know about
    pub fn infer(facet: &ConfigNode) -> ValueKind {
        match facet.get("value") {
            Some(AttributeValue::Real(_)) => ValueKind::Real,
            Some(AttributeValue::Int(_)) => ValueKind::Int,
            Some(AttributeValue::Bool(_)) => ValueKind::Bool,
            Some(AttributeValue::Text(_)) => ValueKind::Text,
            None if facet.child("value").is_some() => ValueKind::Config,
            None => ValueKind::Text,
        }
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// A resolved aspect value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AspectValue {
    Real(f64),
    Int(i64),
    Bool(bool),
    Text(String),
    List(Vec<String>),
    Config(ConfigNode),
}

impl AspectValue {
    pub fn as_real(&self) -> Option<f64> {
        match self {
            AspectValue::Real(v) => Some(*v),
            AspectValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AspectValue::Int(v) => Some(*v),
            AspectValue::Real(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AspectValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for AspectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AspectValue::Real(v) => write!(f, "{}", v),
            AspectValue::Int(v) => write!(f, "{}", v),
            AspectValue::Bool(true) => write!(f, "yes"),
            AspectValue::Bool(false) => write!(f, "no"),
            AspectValue::Text(v) => write!(f, "{}", v),
            AspectValue::List(items) => write!(f, "{}", items.join(",")),
            AspectValue::Config(cfg) => write!(f, "{}", cfg),
        }
    }
}

/// A built-in aspect: its id, value kind and fallback value
#[derive(Debug, Clone, PartialEq)]
pub struct AspectDefinition {
    pub id: String,
    pub kind: ValueKind,
    pub default: AspectValue,
}

impl AspectDefinition {
    pub fn new(id: &str, kind: ValueKind, default: AspectValue) -> Self {
        Self {
            id: id.to_string(),
            kind,
            default,
        }
    }
}

/// Registry of known aspects for one match
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    aspects: AHashMap<String, AspectDefinition>,
}

impl ComponentRegistry {
    /// Create a registry with no built-in aspects
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a registry populated with the standard aspect table
    pub fn standard() -> Self {
        use AspectValue as V;
        use ValueKind as K;

        let mut registry = Self::empty();
        let table = [
            ("advancements", K::Text, V::Text(String::new())),
            ("aggression", K::Real, V::Real(0.4)),
            ("attack_depth", K::Int, V::Int(5)),
            ("caution", K::Real, V::Real(0.25)),
            ("grouping", K::Text, V::Text("offensive".to_string())),
            ("leader_aggression", K::Real, V::Real(-4.0)),
            ("leader_ignores_keep", K::Bool, V::Bool(false)),
            ("leader_value", K::Real, V::Real(3.0)),
            ("number_of_possible_recruits_to_force_recruit", K::Real, V::Real(3.1)),
            ("passive_leader", K::Bool, V::Bool(false)),
            ("passive_leader_shares_keep", K::Bool, V::Bool(false)),
            ("recruitment_diversity", K::Real, V::Real(2.0)),
            ("recruitment_ignore_bad_combat", K::Bool, V::Bool(false)),
            ("recruitment_ignore_bad_movement", K::Bool, V::Bool(false)),
            ("recruitment_instructions", K::Config, V::Config(ConfigNode::new())),
            ("recruitment_more", K::List, V::List(Vec::new())),
            ("recruitment_pattern", K::List, V::List(Vec::new())),
            ("recruitment_randomness", K::Int, V::Int(50)),
            ("recruitment_save_gold", K::Config, V::Config(ConfigNode::new())),
            ("scout_village_targeting", K::Real, V::Real(3.0)),
            ("simple_targeting", K::Bool, V::Bool(false)),
            ("support_villages", K::Bool, V::Bool(false)),
            ("village_value", K::Real, V::Real(1.0)),
            ("villages_per_scout", K::Int, V::Int(4)),
        ];

        for (id, kind, default) in table {
            registry.register_aspect(AspectDefinition::new(id, kind, default));
        }
        registry
    }

    /// Register (or replace) an aspect definition
    pub fn register_aspect(&mut self, definition: AspectDefinition) {
        self.aspects.insert(definition.id.clone(), definition);
    }

    pub fn aspect(&self, id: &str) -> Option<&AspectDefinition> {
        self.aspects.get(id)
    }

    pub fn is_known_aspect(&self, id: &str) -> bool {
        self.aspects.contains_key(id)
    }

    /// Known aspect ids in sorted order
    pub fn known_aspect_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.aspects.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }
}
