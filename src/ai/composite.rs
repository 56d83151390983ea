//! Composite behavior root
//!
//! The root of a side's component tree. Holds aspects, stages, engines and
//! goals, and answers per-aspect value queries for the decision logic.

use std::any::Any;
use std::sync::Arc;

use crate::ai::component::{
    AspectComponent, AspectResolver, ChildSlots, Component, ConfigComponent, SlotSpec,
};
use crate::ai::context::ContextStack;
use crate::ai::registry::{AspectValue, ComponentRegistry};
use crate::core::error::{AiError, Result};
use crate::data::ConfigNode;

const ROOT_SLOTS: &[SlotSpec] = &[
    SlotSpec::keyed("aspect", "id"),
    SlotSpec::optionally_keyed("stage", "id"),
    SlotSpec::optionally_keyed("engine", "name"),
    SlotSpec::anonymous("goal"),
];

/// Attributes owned by the context layers or the holder, not by the root
const LAYER_KEYS: [&str; 5] = ["side", "id", "description", "ai_algorithm", "version"];

/// Children consumed by the holder before the root is built
const HOLDER_TAGS: [&str; 1] = ["modify_ai"];

#[derive(Debug)]
pub struct CompositeAi {
    params: ConfigNode,
    extra: ConfigNode,
    slots: ChildSlots,
    registry: Arc<ComponentRegistry>,
    resolver: Arc<dyn AspectResolver>,
}

impl CompositeAi {
    /// Build the root on top of a complete context stack
    pub fn new(stack: &ContextStack, cfg: &ConfigNode) -> Result<Self> {
        stack.default_ai()?;
        let readonly = stack.readonly()?;
        Ok(Self::from_config(
            cfg,
            Arc::clone(readonly.registry()),
            Arc::clone(readonly.resolver()),
        ))
    }

    /// Build a root from configuration alone.
    ///
    /// Children that fail to build are logged and skipped; aspects sharing
    /// an id are folded together first.
    pub fn from_config(
        cfg: &ConfigNode,
        registry: Arc<ComponentRegistry>,
        resolver: Arc<dyn AspectResolver>,
    ) -> Self {
        let mut folded = cfg.clone();
        folded.merge_children_by_attribute("aspect", "id");

        let mut params = folded.attributes_only();
        for key in LAYER_KEYS {
            params.remove(key);
        }

        let mut root = Self {
            params,
            extra: ConfigNode::new(),
            slots: ChildSlots::new(ROOT_SLOTS),
            registry,
            resolver,
        };

        for (tag, child_cfg) in folded.children() {
            if HOLDER_TAGS.contains(&tag) {
                continue;
            }
            if root.slot_spec(tag).is_none() {
                root.extra.add_child(tag, child_cfg.clone());
                continue;
            }

            let built = root
                .create_child(tag, child_cfg, &root.registry)
                .and_then(|child| root.slots.insert(child));
            if let Err(e) = built {
                tracing::warn!("Skipping [{}] while building [composite_ai]: {}", tag, e);
            }
        }

        tracing::debug!("[composite_ai] built with {} components", root.slots.len());
        root
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Configured aspect with the given id
    pub fn aspect(&self, id: &str) -> Option<&AspectComponent> {
        self.slots
            .get("aspect")?
            .iter()
            .filter_map(|child| child.as_any().downcast_ref::<AspectComponent>())
            .find(|aspect| aspect.id() == id)
    }

    pub fn aspects(&self) -> impl Iterator<Item = &AspectComponent> {
        self.slots
            .get("aspect")
            .unwrap_or_default()
            .iter()
            .filter_map(|child| child.as_any().downcast_ref::<AspectComponent>())
    }

    /// Current value of an aspect: what the resolver makes of its facets,
    /// or the built-in default when nothing is configured.
    pub fn aspect_value(&self, id: &str) -> Option<AspectValue> {
        self.aspect(id)
            .and_then(|aspect| self.resolver.resolve(aspect))
            .or_else(|| self.registry.aspect(id).map(|d| d.default.clone()))
    }

    /// Every aspect id worth reporting: built-in ones plus configured ones
    pub fn aspect_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .registry
            .known_aspect_ids()
            .into_iter()
            .map(String::from)
            .collect();
        for aspect in self.aspects() {
            if !self.registry.is_known_aspect(aspect.id()) {
                ids.push(aspect.id().to_string());
            }
        }
        ids.sort();
        ids
    }

    fn real(&self, id: &str) -> f64 {
        self.aspect_value(id)
            .and_then(|v| v.as_real())
            .unwrap_or_default()
    }

    fn boolean(&self, id: &str) -> bool {
        self.aspect_value(id)
            .and_then(|v| v.as_bool())
            .unwrap_or_default()
    }

    pub fn aggression(&self) -> f64 {
        self.real("aggression")
    }

    pub fn caution(&self) -> f64 {
        self.real("caution")
    }

    pub fn leader_aggression(&self) -> f64 {
        self.real("leader_aggression")
    }

    pub fn leader_value(&self) -> f64 {
        self.real("leader_value")
    }

    pub fn village_value(&self) -> f64 {
        self.real("village_value")
    }

    pub fn attack_depth(&self) -> i64 {
        self.aspect_value("attack_depth")
            .and_then(|v| v.as_int())
            .unwrap_or_default()
    }

    pub fn passive_leader(&self) -> bool {
        self.boolean("passive_leader")
    }

    pub fn support_villages(&self) -> bool {
        self.boolean("support_villages")
    }

    pub fn grouping(&self) -> String {
        self.aspect_value("grouping")
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    pub fn recruitment_pattern(&self) -> Vec<String> {
        match self.aspect_value("recruitment_pattern") {
            Some(AspectValue::List(items)) => items,
            _ => Vec::new(),
        }
    }
}

impl Component for CompositeAi {
    fn kind(&self) -> &str {
        "composite_ai"
    }

    fn attribute(&self, key: &str) -> Option<String> {
        self.params.get(key).map(|v| v.as_text())
    }

    fn describe_self(&self) -> String {
        "[composite_ai]".to_string()
    }

    fn to_config(&self) -> ConfigNode {
        let mut cfg = self.params.clone();
        self.slots.write_config(&mut cfg);
        cfg.append(&self.extra);
        cfg
    }

    fn slots(&self) -> &[SlotSpec] {
        ROOT_SLOTS
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
        registry: &ComponentRegistry,
    ) -> Result<Box<dyn Component>> {
        match kind {
            "aspect" => Ok(Box::new(AspectComponent::from_config(cfg, registry)?)),
            "stage" | "engine" | "goal" => Ok(Box::new(ConfigComponent::from_config(kind, cfg)?)),
            _ => Err(AiError::Configuration(format!(
                "[composite_ai] cannot hold [{}] children",
                kind
            ))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
