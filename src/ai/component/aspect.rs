//! Aspects and facets
//!
//! An aspect is a named tunable parameter. Its value comes from an ordered
//! list of facets; how those facets combine is decided by an
//! [`AspectResolver`] supplied from outside the tree.

use std::any::Any;
use std::fmt;

use super::{ChildSlots, Component, SlotSpec};
use crate::ai::registry::{AspectValue, ComponentRegistry, ValueKind};
use crate::core::error::{AiError, Result};
use crate::data::ConfigNode;

const ASPECT_SLOTS: &[SlotSpec] = &[SlotSpec::optionally_keyed("facet", "id")];

/// Strategy that turns an aspect's facets into a single value
pub trait AspectResolver: fmt::Debug {
    /// `None` means the aspect has nothing configured and the built-in
    /// default applies.
    fn resolve(&self, aspect: &AspectComponent) -> Option<AspectValue>;
}

/// The most recently added facet that carries a value wins
#[derive(Debug, Default, Clone, Copy)]
pub struct LastFacetResolver;

impl AspectResolver for LastFacetResolver {
    fn resolve(&self, aspect: &AspectComponent) -> Option<AspectValue> {
        aspect
            .facets()
            .filter_map(|facet| facet.value().cloned())
            .last()
    }
}

// ============================================================================
// Facet
// ============================================================================

#[derive(Debug)]
pub struct FacetComponent {
    cfg: ConfigNode,
    value: Option<AspectValue>,
}

impl FacetComponent {
    pub fn from_config(kind: ValueKind, cfg: &ConfigNode) -> Result<Self> {
        let value = kind.parse_facet(cfg)?;
        Ok(Self {
            cfg: cfg.clone(),
            value,
        })
    }

    pub fn value(&self) -> Option<&AspectValue> {
        self.value.as_ref()
    }
}

impl Component for FacetComponent {
    fn kind(&self) -> &str {
        "facet"
    }

    fn attribute(&self, key: &str) -> Option<String> {
        self.cfg.get(key).map(|v| v.as_text())
    }

    fn describe_self(&self) -> String {
        match &self.value {
            Some(AspectValue::Config(_)) => "[facet] value=<config>".to_string(),
            Some(value) => format!("[facet] value={}", value),
            None => "[facet]".to_string(),
        }
    }

    fn to_config(&self) -> ConfigNode {
        self.cfg.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Aspect
// ============================================================================

#[derive(Debug)]
pub struct AspectComponent {
    id: String,
    kind: ValueKind,
    params: ConfigNode,
    extra: ConfigNode,
    slots: ChildSlots,
}

impl AspectComponent {
    pub fn from_config(cfg: &ConfigNode, registry: &ComponentRegistry) -> Result<Self> {
        let id = cfg.text("id");
        if id.is_empty() {
            return Err(AiError::Configuration("[aspect] without an id".to_string()));
        }

        let kind = match registry.aspect(&id) {
            Some(definition) => definition.kind,
            None => cfg
                .child("facet")
                .map(ValueKind::infer)
                .unwrap_or(ValueKind::Text),
        };

        let mut aspect = Self {
            id,
            kind,
            params: cfg.attributes_only(),
            extra: ConfigNode::new(),
            slots: ChildSlots::new(ASPECT_SLOTS),
        };

        for (tag, child_cfg) in cfg.children() {
            if tag == "facet" {
                aspect
                    .slots
                    .insert(Box::new(FacetComponent::from_config(kind, child_cfg)?))?;
            } else {
                aspect.extra.add_child(tag, child_cfg.clone());
            }
        }

        Ok(aspect)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value_kind(&self) -> ValueKind {
        self.kind
    }

    /// Facets in insertion order
    pub fn facets(&self) -> impl Iterator<Item = &FacetComponent> {
        self.slots
            .iter()
            .filter_map(|child| child.as_any().downcast_ref::<FacetComponent>())
    }

    pub fn facet_count(&self) -> usize {
        self.slots.len()
    }
}

impl Component for AspectComponent {
    fn kind(&self) -> &str {
        "aspect"
    }

    fn attribute(&self, key: &str) -> Option<String> {
        self.params.get(key).map(|v| v.as_text())
    }

    fn describe_self(&self) -> String {
        format!("[aspect] {}", self.id)
    }

    fn to_config(&self) -> ConfigNode {
        let mut cfg = self.params.clone();
        self.slots.write_config(&mut cfg);
        cfg.append(&self.extra);
        cfg
    }

    fn slots(&self) -> &[SlotSpec] {
        ASPECT_SLOTS
    }

    fn children(&self, kind: &str) -> Option<&[Box<dyn Component>]> {
        self.slots.get(kind)
    }

    fn children_mut(&mut self, kind: &str) -> Option<&mut Vec<Box<dyn Component>>> {
        self.slots.get_mut(kind)
    }

    fn create_child(
        &self,
        kind: &str,
        cfg: &ConfigNode,
        _registry: &ComponentRegistry,
    ) -> Result<Box<dyn Component>> {
        if kind != "facet" {
            return Err(AiError::Configuration(format!(
                "[aspect] cannot hold [{}] children",
                kind
            )));
        }
        Ok(Box::new(FacetComponent::from_config(self.kind, cfg)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
