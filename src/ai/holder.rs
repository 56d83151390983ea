//! Per-side AI holder
//!
//! A holder owns one side's raw configuration, its context stack and, once
//! built, its behavior root. It is the only entry point external code uses.
//! Initialization is lazy: nothing is built until the behavior is first
//! requested or a modification arrives.

use std::sync::Arc;

use crate::ai::component::{
    AspectResolver, Component, ComponentManager, ComponentPath, LastFacetResolver, PathSegment,
    SegmentFilter,
};
use crate::ai::composite::CompositeAi;
use crate::ai::configuration;
use crate::ai::context::{ContextStack, JournalEntry};
use crate::ai::directive::{Directive, ModifyAction};
use crate::ai::interpreter::{BatchReport, ModificationInterpreter};
use crate::ai::registry::{AspectValue, ComponentRegistry};
use crate::core::config::ManagerConfig;
use crate::core::error::AiError;
use crate::core::types::{SideNumber, CONFIG_VERSION};
use crate::data::ConfigNode;

/// Lifecycle state of a holder. Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HolderState {
    Uninitialized,
    /// Context layers exist, the behavior root does not
    PartiallyInitialized,
    Ready,
}

#[derive(Debug)]
pub struct Holder {
    side: SideNumber,
    cfg: ConfigNode,
    // Declared before `stack` so the root is dropped first
    root: Option<CompositeAi>,
    stack: ContextStack,
    registry: Arc<ComponentRegistry>,
    resolver: Arc<dyn AspectResolver>,
    settings: ManagerConfig,
}

impl Holder {
    pub fn new(
        side: SideNumber,
        cfg: ConfigNode,
        registry: Arc<ComponentRegistry>,
        settings: ManagerConfig,
    ) -> Self {
        Self::with_resolver(side, cfg, registry, Arc::new(LastFacetResolver), settings)
    }

    pub fn with_resolver(
        side: SideNumber,
        cfg: ConfigNode,
        registry: Arc<ComponentRegistry>,
        resolver: Arc<dyn AspectResolver>,
        settings: ManagerConfig,
    ) -> Self {
        let holder = Self {
            side,
            cfg,
            root: None,
            stack: ContextStack::new(),
            registry,
            resolver,
            settings,
        };
        tracing::debug!("{}: preparing new AI holder", holder.describe());
        holder
    }

    pub fn side(&self) -> SideNumber {
        self.side
    }

    pub fn state(&self) -> HolderState {
        if self.root.is_some() {
            HolderState::Ready
        } else if !self.stack.is_empty() {
            HolderState::PartiallyInitialized
        } else {
            HolderState::Uninitialized
        }
    }

    /// `id` of the raw configuration
    pub fn identifier(&self) -> String {
        self.cfg.text("id")
    }

    // === LIFECYCLE ===

    /// Bind `side` and build whatever is not built yet.
    ///
    /// Safe to call again on a built holder: only the side binding changes.
    /// Pending `[modify_ai]` children of the raw configuration are applied
    /// once the root exists and are then dropped.
    pub fn initialize(&mut self, side: SideNumber) {
        self.side = side;
        self.stack
            .build(side, &self.cfg, &self.registry, &self.resolver, &self.settings);

        if self.root.is_none() {
            match CompositeAi::new(&self.stack, &self.cfg) {
                Ok(root) => {
                    self.root = Some(root);
                    tracing::info!("{}: behavior root built", self.describe());
                }
                Err(e) => {
                    tracing::error!("{}: AI lazy initialization error: {}", self.describe(), e);
                    return;
                }
            }
        }

        self.apply_pending_modifications();
    }

    fn apply_pending_modifications(&mut self) {
        let pending: Vec<ConfigNode> = self.cfg.child_range("modify_ai").cloned().collect();
        if pending.is_empty() {
            return;
        }
        self.cfg.clear_children("modify_ai");

        tracing::debug!(
            "{}: applying {} [modify_ai] from configuration",
            self.describe(),
            pending.len()
        );
        let side = self.side;
        let report = ModificationInterpreter::apply_batch(self, side, pending);
        tracing::debug!("{}: initial modifications {}", self.describe(), report);
    }

    /// The behavior root, built on first use. Repeated calls return the same
    /// instance.
    pub fn get_behavior(&mut self) -> &CompositeAi {
        self.root_mut()
    }

    /// The behavior root if it has already been built
    pub fn behavior(&self) -> Option<&CompositeAi> {
        self.root.as_ref()
    }

    fn root_mut(&mut self) -> &mut CompositeAi {
        if self.root.is_none() {
            self.initialize(self.side);
        }

        let (cfg, registry, resolver) = (&self.cfg, &self.registry, &self.resolver);
        self.root
            .get_or_insert_with(|| detached_root(cfg, registry, resolver))
    }

    // === MODIFICATION ===

    /// Apply one directive to the behavior root.
    ///
    /// Returns whether it took effect. `try_delete` always reports success.
    /// The tree is left untouched by a failed directive.
    pub fn apply_modification(&mut self, directive: &Directive) -> bool {
        let registry = Arc::clone(&self.registry);
        let side = self.side;
        let root = self.root_mut();

        tracing::info!("side {}        [modify_ai] {}", side, directive);
        tracing::debug!("\n{}", directive.to_config());
        tracing::debug!("side {} before [modify_ai]\n{}", side, root.to_config());

        let outcome = match directive.action {
            ModifyAction::Add => ComponentManager::add_component(
                root,
                &directive.path,
                &directive.payload,
                &registry,
            )
            .map(|_| ()),
            ModifyAction::Change => ComponentManager::change_component(
                root,
                &directive.path,
                &directive.payload,
                &registry,
            ),
            ModifyAction::Delete | ModifyAction::TryDelete => {
                ComponentManager::delete_component(root, &directive.path)
            }
        };

        tracing::debug!("side {}  after [modify_ai] {}\n{}", side, directive.action, root.to_config());

        let success = match outcome {
            Ok(()) => true,
            Err(e) if directive.action == ModifyAction::TryDelete => {
                tracing::info!(
                    "[modify_ai] {} failed, ignoring because it's a try_delete: {}",
                    directive.action,
                    e
                );
                true
            }
            Err(e) => {
                tracing::warn!("[modify_ai] {} \"{}\": {}", directive.action, directive.path, e);
                false
            }
        };

        if success {
            tracing::info!("[modify_ai] {} success", directive.action);
        } else {
            tracing::info!("[modify_ai] {} failed", directive.action);
        }

        self.record(directive, success);
        success
    }

    /// Decode and apply a `[modify_ai]` node. A node that cannot be decoded
    /// is reported and dropped.
    pub fn apply_modification_config(&mut self, cfg: &ConfigNode) -> bool {
        match Directive::from_config(cfg) {
            Ok(directive) => self.apply_modification(&directive),
            Err(e) if Directive::decode_failure_is_success(cfg, &e) => {
                tracing::info!(
                    "side {}: [modify_ai] try_delete ignored, path does not parse: {}",
                    self.side,
                    e
                );
                true
            }
            Err(e) => {
                tracing::error!("side {}: modify_ai tag dropped: {}", self.side, e);
                false
            }
        }
    }

    /// Apply a batch of `[modify_ai]` nodes, best effort
    pub fn apply_batch(&mut self, batch: Vec<ConfigNode>) -> BatchReport {
        let side = self.side;
        ModificationInterpreter::apply_batch(self, side, batch)
    }

    fn record(&mut self, directive: &Directive, success: bool) {
        if !self.stack.is_complete() {
            return;
        }
        if let Ok(journal) = self.stack.readwrite_mut() {
            journal.record_modification(JournalEntry {
                action: directive.action,
                path: directive.path.to_string(),
                success,
            });
        }
    }

    /// Merge old-style aspect parameters (`aggression=0.3` or
    /// `[aspect][facet]` children) into this AI.
    ///
    /// Before the root exists they are folded into the raw configuration;
    /// afterwards every facet is added through the component tree.
    pub fn append_aspect_parameters(&mut self, params: &ConfigNode) {
        let upgraded = configuration::upgrade_aspect_configs(params, &self.registry);
        tracing::debug!(
            "after transforming [ai] parameters into aspects, config contains:\n{}",
            upgraded
        );

        if self.root.is_none() {
            self.cfg.append(&upgraded);
            self.cfg.merge_children_by_attribute("aspect", "id");
            return;
        }

        for aspect in upgraded.child_range("aspect") {
            let id = aspect.text("id");
            let exists = self.get_behavior().aspect(&id).is_some();
            let directive = if exists {
                let path = ComponentPath::from_segments(vec![
                    PathSegment::with_filter(
                        "aspect",
                        SegmentFilter::Attribute {
                            key: "id".to_string(),
                            value: id.clone(),
                        },
                    ),
                    PathSegment::new("facet"),
                ]);
                Directive::new(ModifyAction::Add, path, facets_of(aspect))
            } else {
                Directive::new(
                    ModifyAction::Add,
                    ComponentPath::from_segments(vec![PathSegment::new("aspect")]),
                    aspect.clone(),
                )
            };
            self.apply_modification(&directive);
        }
    }

    // === DIAGNOSTICS ===

    /// Serialize the whole stack. An unbuilt holder returns its raw
    /// configuration unchanged.
    pub fn to_config(&self) -> ConfigNode {
        match &self.root {
            None => self.cfg.clone(),
            Some(root) => {
                let mut cfg = root.to_config();
                cfg.set("version", CONFIG_VERSION);
                cfg.merge_with(&self.stack.to_config());
                cfg
            }
        }
    }

    pub fn describe(&self) -> String {
        match &self.root {
            Some(root) => format!("{} for side {}", root.describe_self(), self.side),
            None => format!(
                "not initialized ai with id=[{}] for side {}",
                self.cfg.text("id"),
                self.side
            ),
        }
    }

    /// One line per aspect with its current value. An unbuilt holder is
    /// previewed from its raw configuration without being initialized.
    pub fn overview(&self) -> String {
        let preview;
        let root = match &self.root {
            Some(root) => root,
            None => {
                preview = CompositeAi::from_config(
                    &self.cfg,
                    Arc::clone(&self.registry),
                    Arc::clone(&self.resolver),
                );
                &preview
            }
        };

        let mut out = String::new();
        for id in root.aspect_ids() {
            match root.aspect_value(&id) {
                Some(AspectValue::Config(cfg)) => {
                    out.push_str(&format!(
                        "{}:  \n----config begin----\n{}-----config end-----\n",
                        id, cfg
                    ));
                }
                Some(value) => out.push_str(&format!("{}:  {}\n", id, value)),
                None => out.push_str(&format!("{}:  \n", id)),
            }
        }
        out
    }

    /// Indented component tree, only when debug diagnostics are enabled
    pub fn structure(&mut self) -> Option<String> {
        if !self.settings.debug {
            tracing::debug!("{}: component tree requested outside debug mode", self.describe());
            return None;
        }
        Some(ComponentManager::print_component_tree(self.get_behavior()))
    }

    /// Component lookup by path, only when debug diagnostics are enabled
    pub fn component(&mut self, path: &str) -> Option<&dyn Component> {
        if !self.settings.debug {
            return None;
        }

        let parsed = match ComponentPath::parse(path) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("component lookup failed: {}", e);
                return None;
            }
        };

        let root: &dyn Component = self.get_behavior();
        match ComponentManager::resolve(root, &parsed) {
            Ok(component) => Some(component),
            Err(e) => {
                tracing::debug!("component lookup failed: {}", e);
                None
            }
        }
    }

    /// Directives applied so far, oldest first
    pub fn journal(&self) -> Vec<JournalEntry> {
        if !self.stack.is_complete() {
            return Vec::new();
        }
        self.stack
            .readwrite()
            .map(|rw| rw.journal().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Algorithm name of the default context layer, once built
    pub fn algorithm(&self) -> Option<String> {
        if !self.stack.is_complete() {
            return None;
        }
        self.stack.default_ai().ok().map(|ctx| ctx.algorithm().to_string())
    }
}

impl Drop for Holder {
    fn drop(&mut self) {
        if self.root.is_some() {
            tracing::info!("{}: managed AI will be deleted", self.describe());
        }
    }
}

fn detached_root(
    cfg: &ConfigNode,
    registry: &Arc<ComponentRegistry>,
    resolver: &Arc<dyn AspectResolver>,
) -> CompositeAi {
    let error = AiError::LifecycleOrder("behavior root");
    debug_assert!(false, "{}", error);
    tracing::error!("{}: using a detached root", error);
    CompositeAi::from_config(cfg, Arc::clone(registry), Arc::clone(resolver))
}

/// A node holding only the `[facet]` children of `aspect`
fn facets_of(aspect: &ConfigNode) -> ConfigNode {
    let mut node = ConfigNode::new();
    for facet in aspect.child_range("facet") {
        node.add_child("facet", facet.clone());
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(side: u32, cfg: ConfigNode) -> Holder {
        Holder::new(
            SideNumber(side),
            cfg,
            Arc::new(ComponentRegistry::standard()),
            ManagerConfig::debug(),
        )
    }

    fn aspect(id: &str, value: f64) -> ConfigNode {
        ConfigNode::new()
            .with("id", id)
            .with_child("facet", ConfigNode::new().with("value", value))
    }

    #[test]
    fn test_lifecycle_states() {
        let mut h = holder(1, ConfigNode::new());
        assert_eq!(h.state(), HolderState::Uninitialized);
        h.get_behavior();
        assert_eq!(h.state(), HolderState::Ready);
        assert_eq!(h.algorithm().as_deref(), Some("default"));
    }

    #[test]
    fn test_get_behavior_is_idempotent() {
        let mut h = holder(1, ConfigNode::new());
        let first: *const CompositeAi = h.get_behavior();
        let second: *const CompositeAi = h.get_behavior();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_unbuilt_holder_serializes_raw_config() {
        let cfg = ConfigNode::new()
            .with("id", "guardian")
            .with_child("aspect", aspect("caution", 0.8));
        let h = holder(2, cfg.clone());
        assert_eq!(h.to_config(), cfg);
        assert_eq!(h.describe(), "not initialized ai with id=[guardian] for side 2");
        assert_eq!(h.state(), HolderState::Uninitialized);
    }

    #[test]
    fn test_built_holder_serializes_layers_and_version() {
        let mut h = holder(2, ConfigNode::new().with("id", "guardian"));
        h.get_behavior();
        let cfg = h.to_config();
        assert_eq!(cfg.text("version"), CONFIG_VERSION);
        assert_eq!(cfg.text("side"), "2");
        assert_eq!(cfg.text("id"), "guardian");
        assert_eq!(cfg.text("ai_algorithm"), "default");
        assert_eq!(h.describe(), "[composite_ai] for side 2");
    }

    #[test]
    fn test_initialize_rebinds_side_without_rebuilding() {
        let mut h = holder(1, ConfigNode::new());
        let before: *const CompositeAi = h.get_behavior();
        h.initialize(SideNumber(5));
        let after: *const CompositeAi = h.get_behavior();
        assert!(std::ptr::eq(before, after));
        assert_eq!(h.side(), SideNumber(5));
        assert_eq!(h.to_config().text("side"), "5");
    }

    #[test]
    fn test_pending_modify_ai_applied_once() {
        let cfg = ConfigNode::new()
            .with_child("aspect", aspect("aggression", 0.2))
            .with_child(
                "modify_ai",
                ConfigNode::new()
                    .with("action", "delete")
                    .with("path", "aspect[id=aggression]"),
            );
        let mut h = holder(1, cfg);
        assert_eq!(h.get_behavior().aggression(), 0.4);
        assert_eq!(h.to_config().child_count("modify_ai"), 0);
        assert_eq!(h.journal().len(), 1);

        h.initialize(SideNumber(1));
        assert_eq!(h.journal().len(), 1);
    }

    #[test]
    fn test_modification_builds_lazily() {
        let mut h = holder(3, ConfigNode::new());
        let directive = Directive::add("aspect", aspect("caution", 0.1)).unwrap();
        assert!(h.apply_modification(&directive));
        assert_eq!(h.state(), HolderState::Ready);
        assert_eq!(h.get_behavior().caution(), 0.1);
    }

    #[test]
    fn test_failed_modification_keeps_tree() {
        let mut h = holder(1, ConfigNode::new().with_child("aspect", aspect("caution", 0.5)));
        h.get_behavior();
        let before = h.to_config();

        let duplicate = Directive::add("aspect", aspect("caution", 0.9)).unwrap();
        assert!(!h.apply_modification(&duplicate));
        let missing = Directive::change("aspect[id=nothing]", ConfigNode::new()).unwrap();
        assert!(!h.apply_modification(&missing));

        assert_eq!(h.to_config(), before);
        let journal = h.journal();
        assert_eq!(journal.len(), 2);
        assert!(journal.iter().all(|entry| !entry.success));
    }

    #[test]
    fn test_unknown_action_is_dropped() {
        let mut h = holder(1, ConfigNode::new());
        let cfg = ConfigNode::new().with("action", "explode").with("path", "aspect");
        assert!(!h.apply_modification_config(&cfg));
    }

    #[test]
    fn test_try_delete_never_fails() {
        let mut h = holder(1, ConfigNode::new());
        for path in ["aspect[id=none]", "stage[3]", "engine/x", ""] {
            let directive = Directive::try_delete(path).unwrap();
            assert!(h.apply_modification(&directive), "{}", path);
        }
    }

    #[test]
    fn test_append_aspect_parameters_before_init() {
        let mut h = holder(1, ConfigNode::new().with_child("aspect", aspect("caution", 0.5)));
        h.append_aspect_parameters(&ConfigNode::new().with("caution", 0.7).with("aggression", 0.1));

        assert_eq!(h.state(), HolderState::Uninitialized);
        let raw = h.to_config();
        assert_eq!(raw.child_count("aspect"), 2);

        let ai = h.get_behavior();
        assert_eq!(ai.caution(), 0.7);
        assert_eq!(ai.aggression(), 0.1);
    }

    #[test]
    fn test_append_aspect_parameters_after_init() {
        let mut h = holder(1, ConfigNode::new().with_child("aspect", aspect("caution", 0.5)));
        h.get_behavior();
        h.append_aspect_parameters(&ConfigNode::new().with("caution", 0.7).with("village_value", 2.5));

        let ai = h.get_behavior();
        assert_eq!(ai.aspect("caution").unwrap().facet_count(), 2);
        assert_eq!(ai.caution(), 0.7);
        assert_eq!(ai.village_value(), 2.5);
    }

    #[test]
    fn test_overview_does_not_initialize() {
        let h = holder(1, ConfigNode::new().with_child("aspect", aspect("caution", 0.3)));
        let text = h.overview();
        assert!(text.contains("caution:  0.3\n"));
        assert!(text.contains("aggression:  0.4\n"));
        assert!(text.contains("recruitment_save_gold:  \n----config begin----\n"));
        assert_eq!(h.state(), HolderState::Uninitialized);
    }

    #[test]
    fn test_debug_gated_diagnostics() {
        let mut h = holder(1, ConfigNode::new().with_child("aspect", aspect("caution", 0.3)));
        let tree = h.structure().unwrap();
        assert!(tree.starts_with("composite_ai: [composite_ai]\n"));
        assert!(tree.contains("  aspect[caution]: [aspect] caution"));
        assert!(h.component("aspect[id=caution]/facet").is_some());
        assert!(h.component("aspect[id=other]").is_none());

        let mut quiet = Holder::new(
            SideNumber(1),
            ConfigNode::new(),
            Arc::new(ComponentRegistry::standard()),
            ManagerConfig::default(),
        );
        assert!(quiet.structure().is_none());
        assert!(quiet.component("").is_none());
    }
}
