//! Layered context stack
//!
//! Four layers are built in a fixed order: Side, ReadOnly, ReadWrite,
//! Default. Each one is constructed from the layer before it and adds a
//! capability, exposed through its own trait so callers can depend on the
//! narrowest tier they need. The stack is torn down in reverse order.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::ai::component::AspectResolver;
use crate::ai::directive::ModifyAction;
use crate::ai::registry::ComponentRegistry;
use crate::core::config::ManagerConfig;
use crate::core::error::{AiError, Result};
use crate::core::types::SideNumber;
use crate::data::ConfigNode;

// ============================================================================
// Capabilities
// ============================================================================

pub trait SideContext {
    fn side(&self) -> SideNumber;
}

pub trait ReadonlyContext {
    /// AI identifier from the `id` attribute, may be empty
    fn identifier(&self) -> &str;
    fn description(&self) -> &str;
    fn registry(&self) -> &Arc<ComponentRegistry>;
    fn resolver(&self) -> &Arc<dyn AspectResolver>;
}

pub trait ReadwriteContext {
    fn record_modification(&mut self, entry: JournalEntry);
    fn journal(&self) -> &VecDeque<JournalEntry>;
}

pub trait DefaultAiContext {
    fn algorithm(&self) -> &str;
}

/// One applied directive, kept for diagnostics only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub action: ModifyAction,
    pub path: String,
    pub success: bool,
}

// ============================================================================
// Layers
// ============================================================================

#[derive(Debug)]
pub struct SideLayer {
    side: SideNumber,
}

impl SideLayer {
    pub fn new(side: SideNumber) -> Self {
        tracing::debug!("side {}: building side context", side);
        Self { side }
    }

    pub fn rebind(&mut self, side: SideNumber) {
        if self.side != side {
            tracing::info!("side {}: context rebound to side {}", self.side, side);
            self.side = side;
        }
    }

    fn to_config(&self) -> ConfigNode {
        ConfigNode::new().with("side", self.side.0)
    }
}

impl SideContext for SideLayer {
    fn side(&self) -> SideNumber {
        self.side
    }
}

#[derive(Debug)]
pub struct ReadonlyLayer {
    identifier: String,
    description: String,
    registry: Arc<ComponentRegistry>,
    resolver: Arc<dyn AspectResolver>,
}

impl ReadonlyLayer {
    pub fn new(
        side: &SideLayer,
        cfg: &ConfigNode,
        registry: Arc<ComponentRegistry>,
        resolver: Arc<dyn AspectResolver>,
    ) -> Self {
        tracing::debug!(
            "side {}: building readonly context ({} known aspects)",
            side.side(),
            registry.len()
        );
        Self {
            identifier: cfg.text("id"),
            description: cfg.text("description"),
            registry,
            resolver,
        }
    }

    fn to_config(&self) -> ConfigNode {
        let mut cfg = ConfigNode::new();
        if !self.identifier.is_empty() {
            cfg.set("id", self.identifier.as_str());
        }
        if !self.description.is_empty() {
            cfg.set("description", self.description.as_str());
        }
        cfg
    }
}

impl ReadonlyContext for ReadonlyLayer {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    fn resolver(&self) -> &Arc<dyn AspectResolver> {
        &self.resolver
    }
}

#[derive(Debug)]
pub struct ReadwriteLayer {
    journal: VecDeque<JournalEntry>,
    capacity: usize,
}

impl ReadwriteLayer {
    pub fn new(readonly: &ReadonlyLayer, capacity: usize) -> Self {
        tracing::debug!(
            "building readwrite context for ai '{}' (journal of {})",
            readonly.identifier(),
            capacity
        );
        Self {
            journal: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// The journal is transient and never serialized
    fn to_config(&self) -> ConfigNode {
        ConfigNode::new()
    }
}

impl ReadwriteContext for ReadwriteLayer {
    fn record_modification(&mut self, entry: JournalEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.journal.len() >= self.capacity {
            self.journal.pop_front();
        }
        self.journal.push_back(entry);
    }

    fn journal(&self) -> &VecDeque<JournalEntry> {
        &self.journal
    }
}

#[derive(Debug)]
pub struct DefaultLayer {
    algorithm: String,
}

impl DefaultLayer {
    pub fn new(_readwrite: &ReadwriteLayer, cfg: &ConfigNode, fallback: &str) -> Self {
        let configured = cfg.text("ai_algorithm");
        let algorithm = if configured.is_empty() {
            fallback.to_string()
        } else {
            configured
        };
        tracing::debug!("building default ai context, algorithm '{}'", algorithm);
        Self { algorithm }
    }

    fn to_config(&self) -> ConfigNode {
        ConfigNode::new().with("ai_algorithm", self.algorithm.as_str())
    }
}

impl DefaultAiContext for DefaultLayer {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }
}

// ============================================================================
// Stack
// ============================================================================

/// All four layers of one holder, built lazily in fixed order
#[derive(Debug, Default)]
pub struct ContextStack {
    side: Option<SideLayer>,
    readonly: Option<ReadonlyLayer>,
    readwrite: Option<ReadwriteLayer>,
    default: Option<DefaultLayer>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `side` and build every layer that does not exist yet.
    ///
    /// Layers that already exist are kept; only the side binding changes.
    pub fn build(
        &mut self,
        side: SideNumber,
        cfg: &ConfigNode,
        registry: &Arc<ComponentRegistry>,
        resolver: &Arc<dyn AspectResolver>,
        settings: &ManagerConfig,
    ) {
        let side_layer = self.side.get_or_insert_with(|| SideLayer::new(side));
        side_layer.rebind(side);

        let readonly = self.readonly.get_or_insert_with(|| {
            ReadonlyLayer::new(side_layer, cfg, Arc::clone(registry), Arc::clone(resolver))
        });

        let readwrite = self
            .readwrite
            .get_or_insert_with(|| ReadwriteLayer::new(readonly, settings.journal_size));

        self.default
            .get_or_insert_with(|| DefaultLayer::new(readwrite, cfg, &settings.default_algorithm));
    }

    /// Number of layers built so far
    pub fn depth(&self) -> usize {
        [
            self.side.is_some(),
            self.readonly.is_some(),
            self.readwrite.is_some(),
            self.default.is_some(),
        ]
        .iter()
        .filter(|built| **built)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.side.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.depth() == 4
    }

    pub fn side(&self) -> Result<&dyn SideContext> {
        match &self.side {
            Some(layer) => Ok(layer),
            None => Err(missing("side context")),
        }
    }

    pub fn readonly(&self) -> Result<&dyn ReadonlyContext> {
        match &self.readonly {
            Some(layer) => Ok(layer),
            None => Err(missing("readonly context")),
        }
    }

    pub fn readwrite(&self) -> Result<&dyn ReadwriteContext> {
        match &self.readwrite {
            Some(layer) => Ok(layer),
            None => Err(missing("readwrite context")),
        }
    }

    pub fn readwrite_mut(&mut self) -> Result<&mut dyn ReadwriteContext> {
        match &mut self.readwrite {
            Some(layer) => Ok(layer),
            None => Err(missing("readwrite context")),
        }
    }

    pub fn default_ai(&self) -> Result<&dyn DefaultAiContext> {
        match &self.default {
            Some(layer) => Ok(layer),
            None => Err(missing("default ai context")),
        }
    }

    /// Merge the contribution of every built layer, in construction order
    pub fn to_config(&self) -> ConfigNode {
        let mut cfg = ConfigNode::new();
        if let Some(layer) = &self.side {
            cfg.merge_with(&layer.to_config());
        }
        if let Some(layer) = &self.readonly {
            cfg.merge_with(&layer.to_config());
        }
        if let Some(layer) = &self.readwrite {
            cfg.merge_with(&layer.to_config());
        }
        if let Some(layer) = &self.default {
            cfg.merge_with(&layer.to_config());
        }
        cfg
    }
}

impl Drop for ContextStack {
    fn drop(&mut self) {
        if self.default.take().is_some() {
            tracing::debug!("default ai context torn down");
        }
        if self.readwrite.take().is_some() {
            tracing::debug!("readwrite context torn down");
        }
        if self.readonly.take().is_some() {
            tracing::debug!("readonly context torn down");
        }
        if let Some(layer) = self.side.take() {
            tracing::debug!("side {}: side context torn down", layer.side);
        }
    }
}

/// Using a layer before it exists is a programming error
fn missing(layer: &'static str) -> AiError {
    debug_assert!(false, "{} used before it was built", layer);
    tracing::error!("{} used before it was built", layer);
    AiError::LifecycleOrder(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::component::LastFacetResolver;

    fn build(stack: &mut ContextStack, side: u32, cfg: &ConfigNode) {
        let registry = Arc::new(ComponentRegistry::standard());
        let resolver: Arc<dyn AspectResolver> = Arc::new(LastFacetResolver);
        stack.build(SideNumber(side), cfg, &registry, &resolver, &ManagerConfig::default());
    }

    #[test]
    fn test_build_creates_all_layers() {
        let mut stack = ContextStack::new();
        assert_eq!(stack.depth(), 0);

        let cfg = ConfigNode::new().with("id", "guardian").with("ai_algorithm", "idle_ai");
        build(&mut stack, 2, &cfg);

        assert!(stack.is_complete());
        assert_eq!(stack.side().unwrap().side(), SideNumber(2));
        assert_eq!(stack.readonly().unwrap().identifier(), "guardian");
        assert_eq!(stack.default_ai().unwrap().algorithm(), "idle_ai");
    }

    #[test]
    fn test_rebuild_only_rebinds_side() {
        let mut stack = ContextStack::new();
        build(&mut stack, 1, &ConfigNode::new().with("id", "first"));
        build(&mut stack, 4, &ConfigNode::new().with("id", "second"));

        assert_eq!(stack.side().unwrap().side(), SideNumber(4));
        assert_eq!(stack.readonly().unwrap().identifier(), "first");
    }

    #[test]
    fn test_to_config_merges_layers() {
        let mut stack = ContextStack::new();
        build(&mut stack, 3, &ConfigNode::new().with("id", "guardian"));

        let cfg = stack.to_config();
        assert_eq!(cfg.text("side"), "3");
        assert_eq!(cfg.text("id"), "guardian");
        assert_eq!(cfg.text("ai_algorithm"), "default");
        assert!(!cfg.has_attribute("description"));
    }

    #[test]
    fn test_journal_is_bounded() {
        let mut stack = ContextStack::new();
        let registry = Arc::new(ComponentRegistry::standard());
        let resolver: Arc<dyn AspectResolver> = Arc::new(LastFacetResolver);
        let settings = ManagerConfig {
            journal_size: 2,
            ..ManagerConfig::default()
        };
        stack.build(SideNumber(1), &ConfigNode::new(), &registry, &resolver, &settings);

        for path in ["a", "b", "c"] {
            stack.readwrite_mut().unwrap().record_modification(JournalEntry {
                action: ModifyAction::Delete,
                path: path.to_string(),
                success: false,
            });
        }

        let journal = stack.readwrite().unwrap().journal();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].path, "b");
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "used before it was built")]
    fn test_missing_layer_asserts_in_debug() {
        let stack = ContextStack::new();
        let _ = stack.readonly();
    }
}
