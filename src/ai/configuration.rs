//! Side AI configuration helpers
//!
//! Turns a side's `[ai]` blocks into the single configuration a holder is
//! built from, upgrading old-style flat aspect parameters on the way.

use std::path::Path;

use crate::ai::registry::ComponentRegistry;
use crate::core::error::Result;
use crate::core::types::{SideNumber, AI_TYPE_DEFAULT};
use crate::data::ConfigNode;

/// Attributes copied from an old-style `[ai]` block onto each generated facet
const FACET_SCOPE_KEYS: [&str; 2] = ["turns", "time_of_day"];

/// Built-in parameters used for a side nobody configured
pub fn default_ai_parameters() -> ConfigNode {
    let mut stage = ConfigNode::new()
        .with("id", "main_loop")
        .with("name", "ca_loop");
    for (id, score) in [
        ("goto", 200_000),
        ("recruitment", 180_000),
        ("move_leader_to_goals", 140_000),
        ("move_leader_to_keep", 120_000),
        ("combat", 100_000),
        ("healing", 80_000),
        ("villages", 60_000),
        ("retreat", 40_000),
        ("move_to_targets", 20_000),
        ("leader_shares_keep", 10_000),
    ] {
        stage.add_child(
            "candidate_action",
            ConfigNode::new()
                .with("id", id)
                .with("engine", "cpp")
                .with("max_score", score),
        );
    }

    ConfigNode::new()
        .with("id", AI_TYPE_DEFAULT)
        .with("description", "Default AI")
        .with_child("stage", stage)
}

/// Rewrite old-style aspect parameters as `[aspect][facet]` children.
///
/// Every attribute named after a known aspect becomes an aspect with one
/// facet carrying the value. `[aspect]` children pass through. Aspects with
/// the same id are folded together.
pub fn upgrade_aspect_configs(params: &ConfigNode, registry: &ComponentRegistry) -> ConfigNode {
    let mut upgraded = ConfigNode::new();

    for (key, value) in params.attributes() {
        if !registry.is_known_aspect(key) {
            continue;
        }
        let mut facet = ConfigNode::new().with("value", value.clone());
        for scope in FACET_SCOPE_KEYS {
            if let Some(scope_value) = params.get(scope) {
                facet.set(scope, scope_value.clone());
            }
        }
        upgraded.add_child("aspect", ConfigNode::new().with("id", key).with_child("facet", facet));
    }

    for aspect in params.child_range("aspect") {
        upgraded.add_child("aspect", aspect.clone());
    }

    upgraded.merge_children_by_attribute("aspect", "id");
    upgraded
}

/// Build a holder configuration from a side's configuration.
///
/// The side's `[ai]` children are merged in order (the side config itself is
/// used when it has none). Known aspect attributes are upgraded to aspects;
/// other attributes and children are kept.
pub fn parse_side_config(
    side: SideNumber,
    cfg: &ConfigNode,
    registry: &ComponentRegistry,
) -> ConfigNode {
    let blocks: Vec<&ConfigNode> = if cfg.child_count("ai") > 0 {
        cfg.child_range("ai").collect()
    } else {
        vec![cfg]
    };

    let mut parsed = ConfigNode::new();
    for block in &blocks {
        for (key, value) in block.attributes() {
            if !registry.is_known_aspect(key) && !FACET_SCOPE_KEYS.contains(&key) {
                parsed.set(key, value.clone());
            }
        }
        for (tag, child) in block.children() {
            if tag != "aspect" && tag != "ai" {
                parsed.add_child(tag, child.clone());
            }
        }
        parsed.append(&upgrade_aspect_configs(block, registry));
    }

    parsed.merge_children_by_attribute("aspect", "id");
    tracing::debug!(
        "side {}: parsed {} [ai] block(s) into {} aspect(s)",
        side,
        blocks.len(),
        parsed.child_count("aspect")
    );
    parsed
}

/// Read a side configuration from a TOML file
pub fn read_side_config_file(path: &Path) -> Result<ConfigNode> {
    let cfg = ConfigNode::from_toml_file(path)?;
    tracing::debug!("read side config from {}", path.display());
    Ok(cfg)
}

/// Configuration for a holder of a given algorithm with nothing else set
pub fn algorithm_parameters(algorithm: &str) -> ConfigNode {
    ConfigNode::new().with("ai_algorithm", algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters_have_main_loop() {
        let cfg = default_ai_parameters();
        assert_eq!(cfg.text("id"), "default");
        let stage = cfg.child("stage").unwrap();
        assert_eq!(stage.text("id"), "main_loop");
        assert_eq!(stage.child_count("candidate_action"), 10);
    }

    #[test]
    fn test_upgrade_flat_parameters() {
        let registry = ComponentRegistry::standard();
        let params = ConfigNode::new()
            .with("aggression", 0.6)
            .with("turns", "1-3")
            .with("unknown_knob", 5);

        let upgraded = upgrade_aspect_configs(&params, &registry);

        assert_eq!(upgraded.child_count("aspect"), 1);
        let aspect = upgraded.child("aspect").unwrap();
        assert_eq!(aspect.text("id"), "aggression");
        let facet = aspect.child("facet").unwrap();
        assert_eq!(facet.text("value"), "0.6");
        assert_eq!(facet.text("turns"), "1-3");
    }

    #[test]
    fn test_upgrade_folds_existing_aspects() {
        let registry = ComponentRegistry::standard();
        let params = ConfigNode::new().with("caution", 0.1).with_child(
            "aspect",
            ConfigNode::new()
                .with("id", "caution")
                .with_child("facet", ConfigNode::new().with("value", 0.9)),
        );

        let upgraded = upgrade_aspect_configs(&params, &registry);
        assert_eq!(upgraded.child_count("aspect"), 1);
        assert_eq!(upgraded.child("aspect").unwrap().child_count("facet"), 2);
    }

    #[test]
    fn test_parse_side_config_merges_ai_blocks() {
        let registry = ComponentRegistry::standard();
        let side = ConfigNode::new()
            .with("side", 2)
            .with_child(
                "ai",
                ConfigNode::new()
                    .with("id", "guardian")
                    .with("caution", 0.5)
                    .with_child("stage", ConfigNode::new().with("id", "main_loop")),
            )
            .with_child("ai", ConfigNode::new().with("caution", 0.7).with("village_value", 2));

        let parsed = parse_side_config(SideNumber(2), &side, &registry);

        assert_eq!(parsed.text("id"), "guardian");
        assert!(!parsed.has_attribute("caution"));
        assert_eq!(parsed.child_count("stage"), 1);
        assert_eq!(parsed.child_count("aspect"), 2);
        let caution = parsed
            .child_range("aspect")
            .find(|a| a.text("id") == "caution")
            .unwrap();
        assert_eq!(caution.child_count("facet"), 2);
    }

    #[test]
    fn test_parse_side_config_without_ai_block() {
        let registry = ComponentRegistry::standard();
        let cfg = ConfigNode::new().with("id", "lone").with("aggression", 0.2);
        let parsed = parse_side_config(SideNumber(1), &cfg, &registry);
        assert_eq!(parsed.text("id"), "lone");
        assert_eq!(parsed.child_count("aspect"), 1);
    }
}
