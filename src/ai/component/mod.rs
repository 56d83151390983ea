//! Path-addressable component tree
//!
//! Every node of an AI's behavior tree implements [`Component`]. Nodes expose
//! their children grouped by kind ("slots"), and know how to build a child of
//! each kind from a configuration payload. [`ComponentManager`] walks the tree
//! by [`ComponentPath`] and performs add/change/delete against it.

pub mod aspect;
pub mod generic;
pub mod manager;
pub mod path;

pub use aspect::{AspectComponent, AspectResolver, FacetComponent, LastFacetResolver};
pub use generic::ConfigComponent;
pub use manager::ComponentManager;
pub use path::{ComponentPath, PathSegment, SegmentFilter};

use std::any::Any;
use std::fmt;

use crate::ai::registry::ComponentRegistry;
use crate::core::error::{AiError, Result};
use crate::data::ConfigNode;

/// Describes one group of children a component can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    /// Child tag, also the path segment name
    pub kind: &'static str,
    /// Attribute that identifies a child among its siblings
    pub identity: Option<&'static str>,
    /// Whether a child without identity is rejected
    pub identity_required: bool,
}

impl SlotSpec {
    pub const fn keyed(kind: &'static str, identity: &'static str) -> Self {
        Self {
            kind,
            identity: Some(identity),
            identity_required: true,
        }
    }

    pub const fn optionally_keyed(kind: &'static str, identity: &'static str) -> Self {
        Self {
            kind,
            identity: Some(identity),
            identity_required: false,
        }
    }

    pub const fn anonymous(kind: &'static str) -> Self {
        Self {
            kind,
            identity: None,
            identity_required: false,
        }
    }

    /// Check that `candidate` may join `siblings` without clashing identities.
    ///
    /// `replacing` is the index of a sibling being replaced, which is exempt.
    pub fn check_identity(
        &self,
        siblings: &[Box<dyn Component>],
        candidate: &dyn Component,
        replacing: Option<usize>,
    ) -> Result<()> {
        let Some(key) = self.identity else {
            return Ok(());
        };

        let identity = candidate.attribute(key).unwrap_or_default();
        if identity.is_empty() {
            if self.identity_required {
                return Err(AiError::Configuration(format!(
                    "[{}] requires a non-empty '{}'",
                    self.kind, key
                )));
            }
            return Ok(());
        }

        let clash = siblings.iter().enumerate().any(|(index, sibling)| {
            Some(index) != replacing && sibling.attribute(key).as_deref() == Some(identity.as_str())
        });
        if clash {
            return Err(AiError::Configuration(format!(
                "a [{}] with {}={} already exists",
                self.kind, key, identity
            )));
        }
        Ok(())
    }
}

/// A node of the behavior tree
pub trait Component: fmt::Debug {
    /// Tag of this component (`aspect`, `facet`, `stage`, ...)
    fn kind(&self) -> &str;

    /// Attribute lookup used by path filters and identity checks
    fn attribute(&self, key: &str) -> Option<String>;

    fn describe_self(&self) -> String;

    fn to_config(&self) -> ConfigNode;

    /// Child groups this component exposes
    fn slots(&self) -> &[SlotSpec] {
        &[]
    }

    fn children(&self, _kind: &str) -> Option<&[Box<dyn Component>]> {
        None
    }

    fn children_mut(&mut self, _kind: &str) -> Option<&mut Vec<Box<dyn Component>>> {
        None
    }

    /// Build a child of `kind` from `cfg` without attaching it
    fn create_child(
        &self,
        kind: &str,
        _cfg: &ConfigNode,
        _registry: &ComponentRegistry,
    ) -> Result<Box<dyn Component>> {
        Err(AiError::Configuration(format!(
            "[{}] cannot hold [{}] children",
            self.kind(),
            kind
        )))
    }

    fn as_any(&self) -> &dyn Any;

    /// Identity string shown by the tree printer
    fn identity(&self) -> String {
        self.attribute("id")
            .filter(|id| !id.is_empty())
            .or_else(|| self.attribute("name"))
            .unwrap_or_default()
    }

    fn slot_spec(&self, kind: &str) -> Option<SlotSpec> {
        self.slots().iter().find(|spec| spec.kind == kind).copied()
    }
}

/// Children of a component, grouped by slot in declaration order
#[derive(Debug, Default)]
pub struct ChildSlots {
    slots: Vec<(SlotSpec, Vec<Box<dyn Component>>)>,
}

impl ChildSlots {
    pub fn new(specs: &[SlotSpec]) -> Self {
        Self {
            slots: specs.iter().map(|spec| (*spec, Vec::new())).collect(),
        }
    }

    pub fn get(&self, kind: &str) -> Option<&[Box<dyn Component>]> {
        self.slots
            .iter()
            .find(|(spec, _)| spec.kind == kind)
            .map(|(_, children)| children.as_slice())
    }

    pub fn get_mut(&mut self, kind: &str) -> Option<&mut Vec<Box<dyn Component>>> {
        self.slots
            .iter_mut()
            .find(|(spec, _)| spec.kind == kind)
            .map(|(_, children)| children)
    }

    /// Attach a child during construction, enforcing slot identity rules
    pub fn insert(&mut self, child: Box<dyn Component>) -> Result<()> {
        let kind = child.kind().to_string();
        let Some((spec, children)) = self.slots.iter_mut().find(|(spec, _)| spec.kind == kind) else {
            return Err(AiError::Configuration(format!("no slot for [{}]", kind)));
        };
        spec.check_identity(children, child.as_ref(), None)?;
        children.push(child);
        Ok(())
    }

    /// Append every child's config to `cfg`, slot by slot
    pub fn write_config(&self, cfg: &mut ConfigNode) {
        for (spec, children) in &self.slots {
            for child in children {
                cfg.add_child(spec.kind, child.to_config());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Box<dyn Component>> {
        self.slots.iter().flat_map(|(_, children)| children.iter())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().map(|(_, children)| children.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(id: &str) -> Box<dyn Component> {
        Box::new(ConfigComponent::from_config("stage", &ConfigNode::new().with("id", id)).unwrap())
    }

    #[test]
    fn test_insert_rejects_duplicate_identity() {
        let mut slots = ChildSlots::new(&[SlotSpec::optionally_keyed("stage", "id")]);
        slots.insert(stage("main")).unwrap();
        assert!(slots.insert(stage("main")).is_err());
        assert!(slots.insert(stage("")).is_ok());
        assert!(slots.insert(stage("")).is_ok());
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn test_required_identity() {
        let spec = SlotSpec::keyed("stage", "id");
        let empty = stage("");
        assert!(spec.check_identity(&[], empty.as_ref(), None).is_err());
    }

    #[test]
    fn test_replacing_is_exempt_from_clash() {
        let spec = SlotSpec::keyed("stage", "id");
        let siblings = vec![stage("main"), stage("other")];
        let candidate = stage("main");
        assert!(spec.check_identity(&siblings, candidate.as_ref(), Some(0)).is_ok());
        assert!(spec.check_identity(&siblings, candidate.as_ref(), Some(1)).is_err());
    }

    #[test]
    fn test_insert_without_slot_fails() {
        let mut slots = ChildSlots::new(&[SlotSpec::anonymous("goal")]);
        assert!(slots.insert(stage("main")).is_err());
    }
}
