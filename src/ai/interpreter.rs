//! Modification command interpreter
//!
//! Applies batches of `[modify_ai]` directives. Each directive is routed to
//! the holder of its side (the current side when unset) and applied on its
//! own: a failing directive never stops the rest of the batch.

use serde::Serialize;
use std::fmt;

use crate::ai::directive::Directive;
use crate::ai::holder::Holder;
use crate::core::types::SideNumber;
use crate::data::ConfigNode;

/// Outcome counts of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub applied: usize,
    pub failed: usize,
    /// Directives dropped before dispatch (unknown action, malformed path).
    /// A `try_delete` with a malformed path counts as applied.
    pub skipped: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.applied + self.failed + self.skipped
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} failed, {} skipped",
            self.applied, self.failed, self.skipped
        )
    }
}

/// Anything that can hand out the holder for a side
pub trait DirectiveTarget {
    fn holder_for_side(&mut self, side: SideNumber) -> &mut Holder;
}

impl DirectiveTarget for Holder {
    /// A lone holder takes every directive, whatever side it names
    fn holder_for_side(&mut self, side: SideNumber) -> &mut Holder {
        if side != self.side() {
            tracing::debug!(
                "directive for side {} applied to the holder of side {}",
                side,
                self.side()
            );
        }
        self
    }
}

pub struct ModificationInterpreter;

impl ModificationInterpreter {
    /// Decode and apply every node of `batch`. The batch is consumed.
    pub fn apply_batch<T: DirectiveTarget + ?Sized>(
        target: &mut T,
        current_side: SideNumber,
        batch: Vec<ConfigNode>,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, cfg) in batch.into_iter().enumerate() {
            match Directive::from_config(&cfg) {
                Ok(directive) => Self::dispatch(target, current_side, &directive, &mut report),
                Err(e) if Directive::decode_failure_is_success(&cfg, &e) => {
                    tracing::info!("[modify_ai] #{} try_delete ignored: {}", index, e);
                    report.applied += 1;
                }
                Err(e) => {
                    tracing::error!("[modify_ai] #{} dropped: {}", index, e);
                    report.skipped += 1;
                }
            }
        }

        tracing::debug!("[modify_ai] batch for side {}: {}", current_side, report);
        report
    }

    /// Apply already decoded directives
    pub fn apply_directives<T: DirectiveTarget + ?Sized>(
        target: &mut T,
        current_side: SideNumber,
        directives: Vec<Directive>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for directive in &directives {
            Self::dispatch(target, current_side, directive, &mut report);
        }
        report
    }

    fn dispatch<T: DirectiveTarget + ?Sized>(
        target: &mut T,
        current_side: SideNumber,
        directive: &Directive,
        report: &mut BatchReport,
    ) {
        let side = directive.side.unwrap_or(current_side);
        if target.holder_for_side(side).apply_modification(directive) {
            report.applied += 1;
        } else {
            report.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::registry::ComponentRegistry;
    use crate::core::config::ManagerConfig;
    use std::sync::Arc;

    fn holder() -> Holder {
        Holder::new(
            SideNumber(2),
            ConfigNode::new(),
            Arc::new(ComponentRegistry::standard()),
            ManagerConfig::default(),
        )
    }

    fn modify(action: &str, path: &str) -> ConfigNode {
        ConfigNode::new().with("action", action).with("path", path)
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let mut holder = holder();
        let batch = vec![
            modify("delete", "aspect[id=missing]"),
            modify("add", "aspect")
                .with("id", "caution")
                .with_child("facet", ConfigNode::new().with("value", 0.6)),
        ];

        let report = ModificationInterpreter::apply_batch(&mut holder, SideNumber(2), batch);

        assert_eq!(report, BatchReport { applied: 1, failed: 1, skipped: 0 });
        assert_eq!(holder.get_behavior().caution(), 0.6);
    }

    #[test]
    fn test_undecodable_directives_are_skipped() {
        let mut holder = holder();
        let batch = vec![
            modify("rename", "aspect"),
            modify("delete", "aspect[["),
            modify("try_delete", "aspect[id=nothing]"),
        ];

        let report = ModificationInterpreter::apply_batch(&mut holder, SideNumber(2), batch);

        assert_eq!(report.skipped, 2);
        assert_eq!(report.applied, 1);
        assert_eq!(report.total(), 3);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_try_delete_with_malformed_path_is_applied() {
        let mut holder = holder();
        let batch = vec![
            modify("try_delete", "aspect[["),
            modify("try_delete", "/aspect"),
            modify("delete", "aspect[["),
            modify("explode", "aspect[["),
        ];

        let report = ModificationInterpreter::apply_batch(&mut holder, SideNumber(2), batch);

        assert_eq!(report, BatchReport { applied: 2, failed: 0, skipped: 2 });
        assert!(!report.is_clean());
    }

    #[test]
    fn test_decoded_directives() {
        let mut holder = holder();
        let directives = vec![
            Directive::add("stage", ConfigNode::new().with("id", "main_loop")).unwrap(),
            Directive::delete("stage[id=main_loop]").unwrap(),
        ];
        let report = ModificationInterpreter::apply_directives(&mut holder, SideNumber(2), directives);
        assert!(report.is_clean());
        assert_eq!(report.applied, 2);
    }
}
