//! Termination evaluation between turns.

use rondo_core::{History, MessageKind, TerminationCondition, UsageLedger};

/// Decides after each completed turn whether the run should stop.
///
/// Conditions combine with logical OR and are checked in configuration
/// order; the first satisfied one is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationEvaluator {
    conditions: Vec<TerminationCondition>,
}

impl TerminationEvaluator {
    pub fn new(conditions: Vec<TerminationCondition>) -> Self {
        Self { conditions }
    }

    pub fn conditions(&self) -> &[TerminationCondition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The first satisfied condition, if any.
    pub fn should_stop(&self, history: &History, ledger: &UsageLedger) -> Option<&TerminationCondition> {
        self.conditions
            .iter()
            .find(|condition| is_satisfied(condition, history, ledger))
    }
}

fn is_satisfied(condition: &TerminationCondition, history: &History, ledger: &UsageLedger) -> bool {
    match condition {
        // The seeded task is never evaluated for markers.
        TerminationCondition::TextMention { marker } => history
            .last()
            .is_some_and(|m| m.kind == MessageKind::Turn && m.mentions(marker)),
        TerminationCondition::MaxTurns { turns } => history.turn_count() >= *turns as usize,
        TerminationCondition::LedgerExceeded => ledger.has_exceeded(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rondo_core::{UsageDimension, UsageLimits};

    fn ledger() -> UsageLedger {
        UsageLedger::new(UsageLimits::unbounded())
    }

    #[test]
    fn test_text_mention_checks_latest_message_only() {
        let evaluator = TerminationEvaluator::new(vec![TerminationCondition::text_mention("APPROVE")]);
        let mut history = History::new();
        history.append_turn("assistant", "Draft. APPROVE?");
        history.append_turn("user_proxy", "not yet");
        assert!(evaluator.should_stop(&history, &ledger()).is_none());

        history.append_turn("assistant", "Revised draft");
        history.append_turn("user_proxy", "APPROVE");
        assert_eq!(
            evaluator.should_stop(&history, &ledger()),
            Some(&TerminationCondition::text_mention("APPROVE"))
        );
    }

    #[test]
    fn test_text_mention_is_case_sensitive() {
        let evaluator = TerminationEvaluator::new(vec![TerminationCondition::text_mention("APPROVE")]);
        let mut history = History::new();
        history.append_turn("user_proxy", "I approve");
        assert!(evaluator.should_stop(&history, &ledger()).is_none());
    }

    #[test]
    fn test_task_is_not_evaluated() {
        let evaluator = TerminationEvaluator::new(vec![
            TerminationCondition::text_mention("ALL_DONE"),
            TerminationCondition::max_turns(1),
        ]);
        let mut history = History::new();
        history.seed_task("Reply ALL_DONE when finished");
        assert!(evaluator.should_stop(&history, &ledger()).is_none());
    }

    #[test]
    fn test_max_turns_counts_turns() {
        let evaluator = TerminationEvaluator::new(vec![TerminationCondition::max_turns(2)]);
        let mut history = History::new();
        history.seed_task("task");
        history.append_turn("A", "one");
        assert!(evaluator.should_stop(&history, &ledger()).is_none());
        history.append_turn("B", "two");
        assert_eq!(
            evaluator.should_stop(&history, &ledger()),
            Some(&TerminationCondition::max_turns(2))
        );
    }

    #[test]
    fn test_ledger_exceeded() {
        let evaluator = TerminationEvaluator::new(vec![TerminationCondition::LedgerExceeded]);
        let history = History::new();
        let mut ledger = UsageLedger::new(UsageLimits::unbounded().with_request_limit(1));
        ledger.check_and_reserve(UsageDimension::Requests, 1).unwrap();
        assert!(evaluator.should_stop(&history, &ledger).is_none());

        let _ = ledger.check_and_reserve(UsageDimension::Requests, 1);
        assert!(evaluator.should_stop(&history, &ledger).is_some());
    }

    #[test]
    fn test_first_condition_in_order_wins() {
        let evaluator = TerminationEvaluator::new(vec![
            TerminationCondition::max_turns(1),
            TerminationCondition::text_mention("DONE"),
        ]);
        let mut history = History::new();
        history.append_turn("A", "DONE");
        assert_eq!(
            evaluator.should_stop(&history, &ledger()),
            Some(&TerminationCondition::max_turns(1))
        );
    }

    #[test]
    fn test_no_conditions_never_stop() {
        let evaluator = TerminationEvaluator::default();
        let mut history = History::new();
        history.append_turn("A", "anything");
        assert!(evaluator.is_empty());
        assert!(evaluator.should_stop(&history, &ledger()).is_none());
    }
}
