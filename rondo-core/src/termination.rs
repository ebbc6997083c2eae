//! Termination conditions for a run.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A condition that ends a run once satisfied.
///
/// A run may carry several; they combine with logical OR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationCondition {
    /// The latest message contains `marker` (case-sensitive substring)
    TextMention { marker: String },
    /// At least `turns` messages have been appended by turns
    MaxTurns { turns: u32 },
    /// A ledger reservation in this run has been refused.
    ///
    /// A refused reservation already aborts the turn that made it, so a run
    /// that hits a limit ends ABORTED with a usage-limit stop reason. This
    /// condition never produces a COMPLETED run on its own.
    LedgerExceeded,
}

impl TerminationCondition {
    pub fn text_mention(marker: impl Into<String>) -> Self {
        Self::TextMention {
            marker: marker.into(),
        }
    }

    pub fn max_turns(turns: u32) -> Self {
        Self::MaxTurns { turns }
    }

    /// Validate a single condition in isolation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::TextMention { marker } if marker.is_empty() => Err(ConfigError::InvalidValue {
                field: "termination.text_mention.marker".to_string(),
                value: String::new(),
                reason: "marker must not be empty".to_string(),
            }),
            Self::MaxTurns { turns: 0 } => Err(ConfigError::InvalidValue {
                field: "termination.max_turns.turns".to_string(),
                value: "0".to_string(),
                reason: "turns must be greater than 0".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Validate a set of conditions: each must be valid, none may repeat, and
    /// at most one turn ceiling may be given.
    pub fn validate_all(conditions: &[TerminationCondition]) -> Result<(), ConfigError> {
        let mut max_turns: Option<u32> = None;
        for (idx, condition) in conditions.iter().enumerate() {
            condition.validate()?;

            if conditions[..idx].contains(condition) {
                return Err(ConfigError::Duplicate {
                    field: "termination condition".to_string(),
                    name: condition.to_string(),
                });
            }

            if let Self::MaxTurns { turns } = condition {
                if let Some(existing) = max_turns {
                    return Err(ConfigError::IncompatibleOptions {
                        option_a: Self::max_turns(existing).to_string(),
                        option_b: condition.to_string(),
                    });
                }
                max_turns = Some(*turns);
            }
        }
        Ok(())
    }
}

impl fmt::Display for TerminationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextMention { marker } => write!(f, "TextMention({})", marker),
            Self::MaxTurns { turns } => write!(f, "MaxTurns({})", turns),
            Self::LedgerExceeded => f.write_str("LedgerExceeded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_marker_rejected() {
        assert!(TerminationCondition::text_mention("").validate().is_err());
        assert!(TerminationCondition::text_mention("APPROVE").validate().is_ok());
    }

    #[test]
    fn test_zero_turns_rejected() {
        assert!(TerminationCondition::max_turns(0).validate().is_err());
    }

    #[test]
    fn test_conflicting_turn_ceilings_rejected() {
        let err = TerminationCondition::validate_all(&[
            TerminationCondition::max_turns(4),
            TerminationCondition::text_mention("DONE"),
            TerminationCondition::max_turns(8),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::IncompatibleOptions { .. }));
    }

    #[test]
    fn test_duplicate_condition_rejected() {
        let err = TerminationCondition::validate_all(&[
            TerminationCondition::text_mention("DONE"),
            TerminationCondition::text_mention("DONE"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate { .. }));
    }

    #[test]
    fn test_several_markers_are_compatible() {
        TerminationCondition::validate_all(&[
            TerminationCondition::text_mention("APPROVE"),
            TerminationCondition::text_mention("FINAL_ANSWER"),
            TerminationCondition::LedgerExceeded,
        ])
        .unwrap();
    }

    #[test]
    fn test_serde_tagged_form() {
        let json = serde_json::to_value(TerminationCondition::max_turns(3)).unwrap();
        assert_eq!(json["kind"], "max_turns");
        assert_eq!(json["turns"], 3);

        let parsed: TerminationCondition =
            serde_json::from_str(r#"{"kind":"text_mention","marker":"ALL_DONE"}"#).unwrap();
        assert_eq!(parsed, TerminationCondition::text_mention("ALL_DONE"));
    }
}
