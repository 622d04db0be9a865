// rules.rs — Declarative input and transition checks.
//
// Aggregates validate by accumulating violations into a `Checks` collector
// and converting the result at the end. A command either passes every
// check and emits its event, or fails with the full violation list — no
// partial state mutation either way.

use std::fmt;

use crate::error::DomainError;
use crate::goal::GoalStatus;

/// One failed check: the offending field and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

/// The full set of violations from one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|v| v.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Accumulates violations across a command's input checks.
#[derive(Debug, Default)]
pub struct Checks {
    violations: Vec<Violation>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation unless `condition` holds.
    pub fn expect(&mut self, condition: bool, field: &'static str, message: impl Into<String>) {
        if !condition {
            self.violations.push(Violation {
                field,
                message: message.into(),
            });
        }
    }

    /// Text must not exceed `max` characters.
    pub fn max_len(&mut self, field: &'static str, label: &str, value: &str, max: usize) {
        self.expect(
            value.chars().count() <= max,
            field,
            format!("{label} must be at most {max} characters"),
        );
    }

    /// List must not exceed `max` entries.
    pub fn max_items(&mut self, field: &'static str, label: &str, len: usize, max: usize) {
        self.expect(
            len <= max,
            field,
            format!("{label} must have at most {max} entries"),
        );
    }

    /// Every entry in a list must fit within `max` characters.
    pub fn each_max_len(&mut self, field: &'static str, label: &str, values: &[String], max: usize) {
        self.expect(
            values.iter().all(|v| v.chars().count() <= max),
            field,
            format!("each {label} entry must be at most {max} characters"),
        );
    }

    /// Convert into a command result: `Ok(())` when every check passed.
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InvalidInput(Violations(self.violations)))
        }
    }
}

/// Standard transition guard: the command is only legal from `allowed`
/// statuses. The error message names the action and the current status.
pub fn transition(
    action: &str,
    current: GoalStatus,
    allowed: &[GoalStatus],
) -> Result<(), DomainError> {
    if allowed.contains(&current) {
        Ok(())
    } else {
        Err(invalid_transition(action, current))
    }
}

/// Build the standard transition error for `action` from `current`.
pub fn invalid_transition(action: &str, current: GoalStatus) -> DomainError {
    DomainError::InvalidStateTransition(format!(
        "Cannot {action} a goal in status {current}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_checks_pass() {
        assert!(Checks::new().into_result().is_ok());
    }

    #[test]
    fn violations_join_messages() {
        let mut checks = Checks::new();
        checks.expect(false, "objective", "Objective is required");
        checks.max_len("note", "Note", &"x".repeat(501), 500);
        let err = checks.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Objective is required; Note must be at most 500 characters"
        );
    }

    #[test]
    fn max_len_counts_characters_not_bytes() {
        let mut checks = Checks::new();
        checks.max_len("note", "Note", &"é".repeat(500), 500);
        assert!(checks.into_result().is_ok());
    }

    #[test]
    fn transition_allows_listed_statuses() {
        assert!(transition("start", GoalStatus::ToDo, &[GoalStatus::ToDo]).is_ok());
        let err = transition("start", GoalStatus::Paused, &[GoalStatus::ToDo]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot start a goal in status paused"
        );
    }
}
