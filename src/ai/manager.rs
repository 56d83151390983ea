//! Multi-side AI manager
//!
//! Owns at most one holder per side, the session's component registry and
//! the manager settings. Also hosts the debug console with its command
//! history.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use crate::ai::configuration;
use crate::ai::holder::Holder;
use crate::ai::interpreter::{BatchReport, DirectiveTarget, ModificationInterpreter};
use crate::ai::registry::ComponentRegistry;
use crate::core::config::ManagerConfig;
use crate::core::types::SideNumber;
use crate::data::ConfigNode;

const HELP: &str = "known commands:\n\
!    - repeat last command (? and ! do not count)\n\
! NUMBER    - repeat numbered command\n\
?    - show a history list\n\
!add_ai SIDE FILE    - add an AI to a side from a TOML file\n\
!remove_ai SIDE    - remove the AI of a side\n\
!replace_ai SIDE FILE    - replace the AI of a side from a TOML file\n\
!help    - show this help message";

#[derive(Debug, Clone, PartialEq, Eq)]
struct HistoryItem {
    number: u64,
    command: String,
}

#[derive(Debug)]
pub struct AiManager {
    holders: BTreeMap<SideNumber, Holder>,
    registry: Arc<ComponentRegistry>,
    config: ManagerConfig,
    history: VecDeque<HistoryItem>,
    history_counter: u64,
}

impl AiManager {
    /// Create a manager with the standard aspect registry
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_registry(Arc::new(ComponentRegistry::standard()), config)
    }

    pub fn with_registry(registry: Arc<ComponentRegistry>, config: ManagerConfig) -> Self {
        tracing::debug!("AI manager created with {} known aspects", registry.len());
        Self {
            holders: BTreeMap::new(),
            registry,
            config,
            history: VecDeque::new(),
            history_counter: 1,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    // === HOLDERS ===

    /// The holder of `side`, created from the default parameters if missing
    pub fn holder_for_side(&mut self, side: SideNumber) -> &mut Holder {
        let (registry, config) = (&self.registry, &self.config);
        self.holders.entry(side).or_insert_with(|| {
            tracing::debug!("side {}: no AI configured, using default parameters", side);
            Holder::new(
                side,
                configuration::default_ai_parameters(),
                Arc::clone(registry),
                config.clone(),
            )
        })
    }

    pub fn holder(&self, side: SideNumber) -> Option<&Holder> {
        self.holders.get(&side)
    }

    pub fn has_ai_for_side(&self, side: SideNumber) -> bool {
        self.holders.contains_key(&side)
    }

    pub fn sides(&self) -> Vec<SideNumber> {
        self.holders.keys().copied().collect()
    }

    /// Install an AI built from a side configuration. Without `replace`, a
    /// side that already has an AI keeps it and `false` is returned.
    pub fn add_ai_for_side_from_config(
        &mut self,
        side: SideNumber,
        cfg: &ConfigNode,
        replace: bool,
    ) -> bool {
        let parsed = configuration::parse_side_config(side, cfg, &self.registry);
        self.install(side, parsed, replace)
    }

    pub fn add_ai_for_side_from_file(&mut self, side: SideNumber, path: &Path, replace: bool) -> bool {
        match configuration::read_side_config_file(path) {
            Ok(cfg) => self.add_ai_for_side_from_config(side, &cfg, replace),
            Err(e) => {
                tracing::error!(
                    "unable to read side config for side {} from file [{}]: {}",
                    side,
                    path.display(),
                    e
                );
                false
            }
        }
    }

    /// Install an AI that only names its algorithm
    pub fn add_ai_for_side(&mut self, side: SideNumber, algorithm: &str, replace: bool) -> bool {
        self.install(side, configuration::algorithm_parameters(algorithm), replace)
    }

    fn install(&mut self, side: SideNumber, cfg: ConfigNode, replace: bool) -> bool {
        if !side.is_valid() {
            tracing::error!("cannot add an AI for side {}", side);
            return false;
        }
        if self.holders.contains_key(&side) && !replace {
            tracing::warn!("side {} already has an AI; use replace to swap it", side);
            return false;
        }

        let holder = Holder::new(side, cfg, Arc::clone(&self.registry), self.config.clone());
        if self.holders.insert(side, holder).is_some() {
            tracing::info!("side {}: previous AI replaced", side);
        }
        true
    }

    pub fn remove_ai_for_side(&mut self, side: SideNumber) -> bool {
        self.holders.remove(&side).is_some()
    }

    pub fn clear_ais(&mut self) {
        tracing::debug!("clearing {} AI holder(s)", self.holders.len());
        self.holders.clear();
    }

    /// Move the holder of `from` to the empty slot `to` and rebind it
    pub fn reassign_side(&mut self, from: SideNumber, to: SideNumber) -> bool {
        if !to.is_valid() || self.holders.contains_key(&to) {
            tracing::warn!("cannot move the AI of side {} to side {}", from, to);
            return false;
        }
        let Some(mut holder) = self.holders.remove(&from) else {
            return false;
        };
        holder.initialize(to);
        self.holders.insert(to, holder);
        tracing::info!("AI of side {} now controls side {}", from, to);
        true
    }

    // === MODIFICATION ===

    pub fn modify_active_ai_for_side(&mut self, side: SideNumber, cfg: &ConfigNode) -> bool {
        self.holder_for_side(side).apply_modification_config(cfg)
    }

    /// Apply a batch; each directive goes to the holder of its own side
    pub fn apply_directive_batch(
        &mut self,
        current_side: SideNumber,
        batch: Vec<ConfigNode>,
    ) -> BatchReport {
        ModificationInterpreter::apply_batch(self, current_side, batch)
    }

    pub fn append_aspect_parameters_for_side(&mut self, side: SideNumber, params: &ConfigNode) {
        self.holder_for_side(side).append_aspect_parameters(params);
    }

    // === QUERIES ===

    pub fn overview_for_side(&mut self, side: SideNumber) -> String {
        self.holder_for_side(side).overview()
    }

    pub fn structure_for_side(&mut self, side: SideNumber) -> Option<String> {
        self.holder_for_side(side).structure()
    }

    pub fn identifier_for_side(&mut self, side: SideNumber) -> String {
        self.holder_for_side(side).identifier()
    }

    pub fn describe_for_side(&mut self, side: SideNumber) -> String {
        self.holder_for_side(side).describe()
    }

    pub fn to_config(&mut self, side: SideNumber) -> ConfigNode {
        self.holder_for_side(side).to_config()
    }

    // === CONSOLE ===

    /// Evaluate a console line for `side` and return the text to show
    pub fn evaluate_command(&mut self, side: SideNumber, text: &str) -> String {
        self.history.push_back(HistoryItem {
            number: self.history_counter,
            command: text.to_string(),
        });
        self.history_counter += 1;

        if self.history.len() > self.config.history_size {
            let pruned = (self.config.history_size / 2).max(1);
            self.history.drain(..pruned);
            tracing::info!("AI mgr: pruned history");
        }

        if !should_intercept(text) {
            return "AI mgr: nothing to do".to_string();
        }
        self.internal_evaluate_command(side, text)
    }

    /// Drop the entry just recorded for a `!`/`?` command
    fn forget_last(&mut self) {
        if self.history.pop_back().is_some() {
            self.history_counter -= 1;
        }
    }

    fn internal_evaluate_command(&mut self, side: SideNumber, text: &str) -> String {
        if text == "!" {
            self.forget_last();
            return match self.history.back() {
                Some(last) => {
                    let command = last.command.clone();
                    self.evaluate_command(side, &command)
                }
                None => "AI mgr: empty history".to_string(),
            };
        }

        if text == "?" {
            self.forget_last();
            if self.history.is_empty() {
                return "AI mgr: History is empty".to_string();
            }
            let shown = self.config.history_visible.min(self.history.len());
            let mut out = format!("AI mgr: History - last {} commands:\n", shown);
            for item in self.history.iter().rev().take(shown) {
                out.push_str(&format!("{}    :{}\n", item.number, item.command));
            }
            return out;
        }

        let words = split_command(text);
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words.as_slice() {
            [cmd @ ("!add_ai" | "!replace_ai"), side_text, file] => {
                let Some(target) = parse_side(side_text) else {
                    return format!("AI mgr: invalid side '{}'", side_text);
                };
                let replace = *cmd == "!replace_ai";
                if self.add_ai_for_side_from_file(target, Path::new(file), replace) {
                    format!(
                        "AI mgr: added [{}] AI for side {} from file {}",
                        self.identifier_for_side(target),
                        target,
                        file
                    )
                } else {
                    format!("AI mgr: failed attempt to add AI for side {} from file {}", target, file)
                }
            }
            ["!remove_ai", side_text] => match parse_side(side_text) {
                Some(target) => {
                    self.remove_ai_for_side(target);
                    format!("AI mgr: made an attempt to remove AI for side {}", target)
                }
                None => format!("AI mgr: invalid side '{}'", side_text),
            },
            ["!", number] => {
                self.forget_last();
                let Ok(number) = number.parse::<u64>() else {
                    return "AI mgr: no command with requested number found".to_string();
                };
                let found = self
                    .history
                    .iter()
                    .rev()
                    .find(|item| item.number == number)
                    .map(|item| item.command.clone());
                match found {
                    Some(command) => self.evaluate_command(side, &command),
                    None => "AI mgr: no command with requested number found".to_string(),
                }
            }
            ["!help"] => HELP.to_string(),
            _ => "AI mgr: nothing to do".to_string(),
        }
    }
}

impl DirectiveTarget for AiManager {
    fn holder_for_side(&mut self, side: SideNumber) -> &mut Holder {
        AiManager::holder_for_side(self, side)
    }
}

impl Drop for AiManager {
    fn drop(&mut self) {
        if !self.holders.is_empty() {
            tracing::debug!("AI manager shutting down {} holder(s)", self.holders.len());
        }
    }
}

fn should_intercept(text: &str) -> bool {
    text.starts_with('!') || text.starts_with('?')
}

fn parse_side(text: &str) -> Option<SideNumber> {
    text.parse::<u32>().ok().map(SideNumber).filter(SideNumber::is_valid)
}

/// Split on spaces, keeping `'quoted words'` together
fn split_command(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '\'' => quoted = !quoted,
            ' ' if !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
