//! Modification directives (`[modify_ai]`)
//!
//! Directives arrive as configuration nodes carrying `action`, `path` and an
//! optional `side`. They are decoded once into a [`Directive`]; everything
//! downstream matches on [`ModifyAction`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ai::component::ComponentPath;
use crate::core::error::{AiError, Result};
use crate::core::types::SideNumber;
use crate::data::ConfigNode;

/// Attributes consumed by the directive envelope, never part of the payload
const ENVELOPE_KEYS: [&str; 3] = ["action", "path", "side"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifyAction {
    Add,
    Change,
    Delete,
    /// Delete that never reports failure
    TryDelete,
}

impl ModifyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifyAction::Add => "add",
            ModifyAction::Change => "change",
            ModifyAction::Delete => "delete",
            ModifyAction::TryDelete => "try_delete",
        }
    }
}

impl FromStr for ModifyAction {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "add" => Ok(ModifyAction::Add),
            "change" => Ok(ModifyAction::Change),
            "delete" => Ok(ModifyAction::Delete),
            "try_delete" => Ok(ModifyAction::TryDelete),
            other => Err(AiError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for ModifyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One decoded add/change/delete/try_delete instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub action: ModifyAction,
    pub path: ComponentPath,
    /// Target side; `None` means the side currently being processed
    pub side: Option<SideNumber>,
    pub payload: ConfigNode,
}

impl Directive {
    pub fn new(action: ModifyAction, path: ComponentPath, payload: ConfigNode) -> Self {
        Self {
            action,
            path,
            side: None,
            payload,
        }
    }

    pub fn add(path: &str, payload: ConfigNode) -> Result<Self> {
        Ok(Self::new(ModifyAction::Add, ComponentPath::parse(path)?, payload))
    }

    pub fn change(path: &str, payload: ConfigNode) -> Result<Self> {
        Ok(Self::new(ModifyAction::Change, ComponentPath::parse(path)?, payload))
    }

    pub fn delete(path: &str) -> Result<Self> {
        Ok(Self::new(ModifyAction::Delete, ComponentPath::parse(path)?, ConfigNode::new()))
    }

    pub fn try_delete(path: &str) -> Result<Self> {
        Ok(Self::new(ModifyAction::TryDelete, ComponentPath::parse(path)?, ConfigNode::new()))
    }

    pub fn with_side(mut self, side: SideNumber) -> Self {
        self.side = Some(side);
        self
    }

    /// Decode a `[modify_ai]` node
    pub fn from_config(cfg: &ConfigNode) -> Result<Self> {
        let action: ModifyAction = cfg.text("action").parse()?;
        let path = ComponentPath::parse(&cfg.text("path"))?;

        let side = match cfg.get("side") {
            None => None,
            Some(value) if value.is_empty() => None,
            Some(value) => {
                let side = value
                    .as_int()
                    .and_then(|n| u32::try_from(n).ok())
                    .map(SideNumber)
                    .filter(SideNumber::is_valid)
                    .ok_or_else(|| {
                        AiError::Configuration(format!("[modify_ai] has invalid side '{}'", value))
                    })?;
                Some(side)
            }
        };

        let mut payload = cfg.clone();
        for key in ENVELOPE_KEYS {
            payload.remove(key);
        }

        Ok(Self {
            action,
            path,
            side,
            payload,
        })
    }

    /// Whether a node that failed to decode with `error` still counts as
    /// applied. A `try_delete` whose path does not parse deletes nothing and
    /// never reports failure.
    pub fn decode_failure_is_success(cfg: &ConfigNode, error: &AiError) -> bool {
        matches!(error, AiError::PathResolution { .. })
            && cfg.text("action").parse::<ModifyAction>().ok() == Some(ModifyAction::TryDelete)
    }

    /// Encode back into `[modify_ai]` form
    pub fn to_config(&self) -> ConfigNode {
        let mut cfg = self.payload.clone();
        cfg.set("action", self.action.as_str());
        cfg.set("path", self.path.to_string());
        if let Some(side) = self.side {
            cfg.set("side", side.0);
        }
        cfg
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.action, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_keywords() {
        assert_eq!("try_delete".parse::<ModifyAction>().unwrap(), ModifyAction::TryDelete);
        assert_eq!(ModifyAction::Change.to_string(), "change");
        assert!(matches!(
            "replace".parse::<ModifyAction>(),
            Err(AiError::UnknownAction(ref a)) if a == "replace"
        ));
    }

    #[test]
    fn test_from_config_strips_envelope() {
        let cfg = ConfigNode::new()
            .with("action", "add")
            .with("path", "aspect")
            .with("side", 3)
            .with("id", "aggression")
            .with_child("facet", ConfigNode::new().with("value", 0.5));

        let directive = Directive::from_config(&cfg).unwrap();
        assert_eq!(directive.action, ModifyAction::Add);
        assert_eq!(directive.side, Some(SideNumber(3)));
        assert!(!directive.payload.has_attribute("action"));
        assert_eq!(directive.payload.text("id"), "aggression");
        assert_eq!(directive.payload.child_count("facet"), 1);
        assert_eq!(directive.to_config(), cfg);
    }

    #[test]
    fn test_missing_side_is_none() {
        let cfg = ConfigNode::new()
            .with("action", "delete")
            .with("path", "aspect[id=caution]");
        assert_eq!(Directive::from_config(&cfg).unwrap().side, None);
    }

    #[test]
    fn test_decode_failures() {
        let unknown = ConfigNode::new().with("action", "rename").with("path", "aspect");
        assert!(matches!(Directive::from_config(&unknown), Err(AiError::UnknownAction(_))));

        let bad_path = ConfigNode::new().with("action", "delete").with("path", "aspect[");
        assert!(matches!(
            Directive::from_config(&bad_path),
            Err(AiError::PathResolution { .. })
        ));

        let bad_side = ConfigNode::new()
            .with("action", "delete")
            .with("path", "aspect")
            .with("side", 0);
        assert!(Directive::from_config(&bad_side).is_err());
    }

    #[test]
    fn test_only_try_delete_tolerates_bad_paths() {
        let try_delete = ConfigNode::new().with("action", "try_delete").with("path", "/aspect");
        let error = Directive::from_config(&try_delete).unwrap_err();
        assert!(Directive::decode_failure_is_success(&try_delete, &error));

        let delete = ConfigNode::new().with("action", "delete").with("path", "/aspect");
        let error = Directive::from_config(&delete).unwrap_err();
        assert!(!Directive::decode_failure_is_success(&delete, &error));

        let bad_side = try_delete.clone().with("path", "aspect").with("side", 0);
        let error = Directive::from_config(&bad_side).unwrap_err();
        assert!(!Directive::decode_failure_is_success(&bad_side, &error));
    }
}
