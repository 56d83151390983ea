//! Config-backed components for stages, engines, goals and candidate actions
//!
//! These nodes carry no behavior of their own in this crate; the decision
//! logic that consumes them lives elsewhere. They keep their attributes and
//! any unrecognised children verbatim so that serialization is lossless.

use std::any::Any;

use super::{ChildSlots, Component, SlotSpec};
use crate::ai::registry::ComponentRegistry;
use crate::core::error::{AiError, Result};
use crate::data::ConfigNode;

const STAGE_SLOTS: &[SlotSpec] = &[SlotSpec::optionally_keyed("candidate_action", "id")];

#[derive(Debug)]
pub struct ConfigComponent {
    kind: String,
    params: ConfigNode,
    /// Children that are not modelled as components
    extra: ConfigNode,
    slots: ChildSlots,
}

impl ConfigComponent {
    pub fn from_config(kind: &str, cfg: &ConfigNode) -> Result<Self> {
        let specs = slots_for(kind);
        let mut component = Self {
            kind: kind.to_string(),
            params: cfg.attributes_only(),
            extra: ConfigNode::new(),
            slots: ChildSlots::new(specs),
        };

        for (tag, child_cfg) in cfg.children() {
            if specs.iter().any(|spec| spec.kind == tag) {
                let child = ConfigComponent::from_config(tag, child_cfg)?;
                component.slots.insert(Box::new(child))?;
            } else {
                component.extra.add_child(tag, child_cfg.clone());
            }
        }

        Ok(component)
    }

    pub fn params(&self) -> &ConfigNode {
        &self.params
    }
}

fn slots_for(kind: &str) -> &'static [SlotSpec] {
    match kind {
        "stage" => STAGE_SLOTS,
        _ => &[],
    }
}

impl Component for ConfigComponent {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn attribute(&self, key: &str) -> Option<String> {
        self.params.get(key).map(|v| v.as_text())
    }

    fn describe_self(&self) -> String {
        let name = self.params.text("name");
        if name.is_empty() {
            format!("[{}]", self.kind)
        } else {
            format!("[{}] {}", self.kind, name)
        }
    }

    fn to_config(&self) -> ConfigNode {
        let mut cfg = self.params.clone();
        self.slots.write_config(&mut cfg);
        cfg.append(&self.extra);
        cfg
    }

    fn slots(&self) -> &[SlotSpec] {
        slots_for(&self.kind)
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
        if self.slot_spec(kind).is_none() {
            return Err(AiError::Configuration(format!(
                "[{}] cannot hold [{}] children",
                self.kind, kind
            )));
        }
        Ok(Box::new(ConfigComponent::from_config(kind, cfg)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
