//! Path-based operations on a component tree

use std::fmt::Write;

use super::{Component, ComponentPath, PathSegment, SegmentFilter, SlotSpec};
use crate::ai::registry::ComponentRegistry;
use crate::core::error::{AiError, Result};
use crate::data::ConfigNode;

/// Resolves paths and performs add/change/delete against a component tree
///
/// Every operation is all-or-nothing: on error the tree is left exactly as
/// it was.
pub struct ComponentManager;

impl ComponentManager {
    /// Find the component addressed by `path`
    pub fn resolve<'a>(root: &'a dyn Component, path: &ComponentPath) -> Result<&'a dyn Component> {
        let mut node = root;
        for segment in path.segments() {
            let siblings = children_of(node, segment, path)?;
            let index = select_index(siblings, segment, path)?;
            node = siblings[index].as_ref();
        }
        Ok(node)
    }

    /// Add the payload as new children of the component addressed by the
    /// path minus its last segment. The last segment names the child kind.
    ///
    /// Returns the number of children added.
    pub fn add_component(
        root: &mut dyn Component,
        path: &ComponentPath,
        payload: &ConfigNode,
        registry: &ComponentRegistry,
    ) -> Result<usize> {
        let Some((last, parent_segments)) = path.segments().split_last() else {
            return Err(AiError::path(path.to_string(), "cannot add the root"));
        };

        let parent = resolve_mut(root, parent_segments, path)?;
        let spec = slot_of(parent, last, path)?;
        let sibling_count = parent.children(&last.name).map_or(0, |c| c.len());

        let mut position = sibling_count;
        let mut built = Vec::new();
        for mut cfg in payloads(&last.name, payload) {
            match &last.filter {
                None => {}
                Some(SegmentFilter::Index(index)) => {
                    if *index > sibling_count {
                        return Err(AiError::path(
                            path.to_string(),
                            format!("insert position {} is past {} siblings", index, sibling_count),
                        ));
                    }
                    position = *index;
                }
                Some(SegmentFilter::Attribute { key, value }) => {
                    bind_identity(&mut cfg, key, value)?;
                }
                Some(SegmentFilter::Identity(value)) => {
                    bind_identity(&mut cfg, spec.identity.unwrap_or("id"), value)?;
                }
            }
            built.push(parent.create_child(&last.name, &cfg, registry)?);
        }

        let added = built.len();
        let siblings = parent
            .children_mut(&last.name)
            .ok_or_else(|| AiError::path(path.to_string(), "parent lost its slot"))?;

        for (offset, child) in built.into_iter().enumerate() {
            if let Err(e) = spec.check_identity(siblings, child.as_ref(), None) {
                siblings.drain(position..position + offset);
                return Err(e);
            }
            siblings.insert(position + offset, child);
        }

        Ok(added)
    }

    /// Rebuild the addressed component from `payload` in place. Its identity
    /// attribute is kept whatever the payload says.
    pub fn change_component(
        root: &mut dyn Component,
        path: &ComponentPath,
        payload: &ConfigNode,
        registry: &ComponentRegistry,
    ) -> Result<()> {
        let Some((last, parent_segments)) = path.segments().split_last() else {
            return Err(AiError::path(path.to_string(), "the root cannot be changed"));
        };

        let parent = resolve_mut(root, parent_segments, path)?;
        let spec = slot_of(parent, last, path)?;
        let siblings = children_of(parent, last, path)?;
        let index = select_index(siblings, last, path)?;

        let mut cfg = payloads(&last.name, payload)
            .into_iter()
            .next()
            .unwrap_or_default();
        if let Some(key) = spec.identity {
            let identity = siblings[index].attribute(key).unwrap_or_default();
            if !identity.is_empty() {
                if cfg.has_attribute(key) && cfg.text(key) != identity {
                    tracing::debug!("Keeping {}={} on change of \"{}\"", key, identity, path);
                }
                cfg.set(key, identity);
            }
        }

        let child = parent.create_child(&last.name, &cfg, registry)?;
        let siblings = parent
            .children_mut(&last.name)
            .ok_or_else(|| AiError::path(path.to_string(), "parent lost its slot"))?;
        spec.check_identity(siblings, child.as_ref(), Some(index))?;
        siblings[index] = child;
        Ok(())
    }

    /// Remove the addressed component and everything below it
    pub fn delete_component(root: &mut dyn Component, path: &ComponentPath) -> Result<()> {
        let Some((last, parent_segments)) = path.segments().split_last() else {
            return Err(AiError::path(path.to_string(), "the root cannot be deleted"));
        };

        let parent = resolve_mut(root, parent_segments, path)?;
        let index = select_index(children_of(parent, last, path)?, last, path)?;
        let siblings = parent
            .children_mut(&last.name)
            .ok_or_else(|| AiError::path(path.to_string(), "parent lost its slot"))?;
        siblings.remove(index);
        Ok(())
    }

    /// Indented dump of the tree, one line per component
    pub fn print_component_tree(root: &dyn Component) -> String {
        let mut out = String::new();
        write_tree(&mut out, root, 0);
        out
    }
}

fn write_tree(out: &mut String, node: &dyn Component, depth: usize) {
    let identity = node.identity();
    let indent = "  ".repeat(depth);
    let _ = if identity.is_empty() {
        writeln!(out, "{}{}: {}", indent, node.kind(), node.describe_self())
    } else {
        writeln!(out, "{}{}[{}]: {}", indent, node.kind(), identity, node.describe_self())
    };

    for spec in node.slots() {
        for child in node.children(spec.kind).unwrap_or_default() {
            write_tree(out, child.as_ref(), depth + 1);
        }
    }
}

fn resolve_mut<'a>(
    node: &'a mut dyn Component,
    segments: &[PathSegment],
    path: &ComponentPath,
) -> Result<&'a mut dyn Component> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(node);
    };

    let index = select_index(children_of(node, first, path)?, first, path)?;
    let siblings = node
        .children_mut(&first.name)
        .ok_or_else(|| AiError::path(path.to_string(), "slot vanished during lookup"))?;
    resolve_mut(&mut *siblings[index], rest, path)
}

fn children_of<'a>(
    node: &'a dyn Component,
    segment: &PathSegment,
    path: &ComponentPath,
) -> Result<&'a [Box<dyn Component>]> {
    node.children(&segment.name).ok_or_else(|| {
        AiError::path(
            path.to_string(),
            format!("[{}] has no [{}] children", node.kind(), segment.name),
        )
    })
}

fn slot_of(node: &dyn Component, segment: &PathSegment, path: &ComponentPath) -> Result<SlotSpec> {
    node.slot_spec(&segment.name).ok_or_else(|| {
        AiError::path(
            path.to_string(),
            format!("[{}] cannot hold [{}] children", node.kind(), segment.name),
        )
    })
}

/// Pick a sibling for `segment`. Without a filter the first sibling wins.
fn select_index(
    siblings: &[Box<dyn Component>],
    segment: &PathSegment,
    path: &ComponentPath,
) -> Result<usize> {
    let found = match &segment.filter {
        None => (!siblings.is_empty()).then_some(0),
        Some(SegmentFilter::Index(index)) => (*index < siblings.len()).then_some(*index),
        Some(SegmentFilter::Attribute { key, value }) => siblings
            .iter()
            .position(|c| c.attribute(key).as_deref() == Some(value.as_str())),
        Some(SegmentFilter::Identity(value)) => siblings.iter().position(|c| {
            c.attribute("id").as_deref() == Some(value.as_str())
                || c.attribute("name").as_deref() == Some(value.as_str())
        }),
    };

    found.ok_or_else(|| AiError::path(path.to_string(), format!("no match for {}", segment)))
}

/// Children of the payload named after `kind`, or the payload itself
fn payloads(kind: &str, payload: &ConfigNode) -> Vec<ConfigNode> {
    let named: Vec<ConfigNode> = payload.child_range(kind).cloned().collect();
    if named.is_empty() {
        vec![payload.clone()]
    } else {
        named
    }
}

fn bind_identity(cfg: &mut ConfigNode, key: &str, value: &str) -> Result<()> {
    let current = cfg.text(key);
    if current.is_empty() {
        cfg.set(key, value);
        Ok(())
    } else if current == value {
        Ok(())
    } else {
        Err(AiError::Configuration(format!(
            "path selects {}={} but payload carries {}={}",
            key, value, key, current
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::component::{AspectComponent, ConfigComponent};

    fn stage() -> ConfigComponent {
        let cfg = ConfigNode::new()
            .with("id", "main_loop")
            .with_child("candidate_action", ConfigNode::new().with("id", "combat").with("name", "fight"))
            .with_child("candidate_action", ConfigNode::new().with("id", "recruitment"))
            .with_child("candidate_action", ConfigNode::new().with("id", "combat_2").with("name", "fight"));
        ConfigComponent::from_config("stage", &cfg).unwrap()
    }

    fn path(text: &str) -> ComponentPath {
        ComponentPath::parse(text).unwrap()
    }

    fn ids(root: &dyn Component) -> Vec<String> {
        root.children("candidate_action")
            .unwrap()
            .iter()
            .map(|c| c.identity())
            .collect()
    }

    #[test]
    fn test_resolve_by_attribute_identity_and_index() {
        let root = stage();
        let by_attr = ComponentManager::resolve(&root, &path("candidate_action[id=recruitment]")).unwrap();
        assert_eq!(by_attr.identity(), "recruitment");

        let by_index = ComponentManager::resolve(&root, &path("candidate_action[2]")).unwrap();
        assert_eq!(by_index.identity(), "combat_2");

        let by_name = ComponentManager::resolve(&root, &path("candidate_action[recruitment]")).unwrap();
        assert_eq!(by_name.identity(), "recruitment");
    }

    #[test]
    fn test_ambiguous_match_picks_first_sibling() {
        let root = stage();
        let first = ComponentManager::resolve(&root, &path("candidate_action")).unwrap();
        assert_eq!(first.identity(), "combat");

        let by_name = ComponentManager::resolve(&root, &path("candidate_action[name=fight]")).unwrap();
        assert_eq!(by_name.identity(), "combat");
    }

    #[test]
    fn test_resolve_failures() {
        let root = stage();
        for bad in ["candidate_action[id=none]", "candidate_action[9]", "facet", "candidate_action/x"] {
            assert!(
                matches!(
                    ComponentManager::resolve(&root, &path(bad)),
                    Err(AiError::PathResolution { .. })
                ),
                "{} should not resolve",
                bad
            );
        }
    }

    #[test]
    fn test_add_appends_and_inserts() {
        let registry = ComponentRegistry::standard();
        let mut root = stage();

        let added = ComponentManager::add_component(
            &mut root,
            &path("candidate_action"),
            &ConfigNode::new().with("id", "villages"),
            &registry,
        )
        .unwrap();
        assert_eq!(added, 1);

        ComponentManager::add_component(
            &mut root,
            &path("candidate_action[0]"),
            &ConfigNode::new().with("id", "goto"),
            &registry,
        )
        .unwrap();

        assert_eq!(ids(&root), vec!["goto", "combat", "recruitment", "combat_2", "villages"]);
    }

    #[test]
    fn test_add_takes_named_children_from_payload() {
        let registry = ComponentRegistry::standard();
        let mut root = stage();
        let payload = ConfigNode::new()
            .with_child("candidate_action", ConfigNode::new().with("id", "a"))
            .with_child("candidate_action", ConfigNode::new().with("id", "b"));
        let added =
            ComponentManager::add_component(&mut root, &path("candidate_action"), &payload, &registry)
                .unwrap();
        assert_eq!(added, 2);
        assert_eq!(ids(&root).len(), 5);
    }

    #[test]
    fn test_add_duplicate_leaves_tree_unchanged() {
        let registry = ComponentRegistry::standard();
        let mut root = stage();
        let before = root.to_config();

        let payload = ConfigNode::new()
            .with_child("candidate_action", ConfigNode::new().with("id", "fresh"))
            .with_child("candidate_action", ConfigNode::new().with("id", "combat"));
        let result =
            ComponentManager::add_component(&mut root, &path("candidate_action"), &payload, &registry);

        assert!(matches!(result, Err(AiError::Configuration(_))));
        assert_eq!(root.to_config(), before);
    }

    #[test]
    fn test_add_with_id_filter_sets_identity() {
        let registry = ComponentRegistry::standard();
        let mut root = stage();
        ComponentManager::add_component(
            &mut root,
            &path("candidate_action[id=healing]"),
            &ConfigNode::new().with("name", "heal"),
            &registry,
        )
        .unwrap();
        let added = ComponentManager::resolve(&root, &path("candidate_action[id=healing]")).unwrap();
        assert_eq!(added.to_config().text("name"), "heal");

        let conflict = ComponentManager::add_component(
            &mut root,
            &path("candidate_action[id=x]"),
            &ConfigNode::new().with("id", "y"),
            &registry,
        );
        assert!(conflict.is_err());
    }

    #[test]
    fn test_add_facet_under_aspect() {
        let registry = ComponentRegistry::standard();
        let mut aspect =
            AspectComponent::from_config(&ConfigNode::new().with("id", "caution"), &registry).unwrap();
        ComponentManager::add_component(
            &mut aspect,
            &path("facet"),
            &ConfigNode::new().with("value", 0.9),
            &registry,
        )
        .unwrap();
        assert_eq!(aspect.facet_count(), 1);

        let bad = ComponentManager::add_component(
            &mut aspect,
            &path("facet"),
            &ConfigNode::new().with("value", "timid"),
            &registry,
        );
        assert!(bad.is_err());
        assert_eq!(aspect.facet_count(), 1);
    }

    #[test]
    fn test_change_preserves_identity_and_position() {
        let registry = ComponentRegistry::standard();
        let mut root = stage();
        ComponentManager::change_component(
            &mut root,
            &path("candidate_action[id=recruitment]"),
            &ConfigNode::new().with("id", "other").with("max_score", 50),
            &registry,
        )
        .unwrap();

        assert_eq!(ids(&root), vec!["combat", "recruitment", "combat_2"]);
        let changed = ComponentManager::resolve(&root, &path("candidate_action[1]")).unwrap();
        assert_eq!(changed.to_config().text("max_score"), "50");
    }

    #[test]
    fn test_change_and_delete_need_a_target() {
        let registry = ComponentRegistry::standard();
        let mut root = stage();
        assert!(ComponentManager::change_component(
            &mut root,
            &path("candidate_action[id=missing]"),
            &ConfigNode::new(),
            &registry
        )
        .is_err());
        assert!(ComponentManager::delete_component(&mut root, &path("candidate_action[id=missing]")).is_err());
        assert!(ComponentManager::delete_component(&mut root, &ComponentPath::root()).is_err());
    }

    #[test]
    fn test_delete_then_resolve_fails() {
        let mut root = stage();
        let target = path("candidate_action[id=combat]");
        ComponentManager::delete_component(&mut root, &target).unwrap();
        assert!(ComponentManager::resolve(&root, &target).is_err());
        assert_eq!(ids(&root), vec!["recruitment", "combat_2"]);
    }

    #[test]
    fn test_print_component_tree() {
        let root = stage();
        let text = ComponentManager::print_component_tree(&root);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "stage[main_loop]: [stage]");
        assert_eq!(lines[1], "  candidate_action[combat]: [candidate_action] fight");
    }
}
